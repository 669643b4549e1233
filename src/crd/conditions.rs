//! Status condition bookkeeping
//!
//! Keeps at most one condition per type. The transition timestamp only moves
//! when the condition's status changes; reason and message are refreshed on
//! every write.

use super::types::{Condition, ConditionStatus};

/// Set `new` in `conditions`, replacing any condition of the same type
///
/// Returns true if the list changed.
pub fn set_status_condition(conditions: &mut Vec<Condition>, new: Condition) -> bool {
    let Some(existing) = conditions.iter_mut().find(|c| c.type_ == new.type_) else {
        conditions.push(new);
        return true;
    };

    let mut changed = false;
    if existing.status != new.status {
        existing.status = new.status;
        existing.last_transition_time = new.last_transition_time;
        changed = true;
    }
    if existing.reason != new.reason {
        existing.reason = new.reason;
        changed = true;
    }
    if existing.message != new.message {
        existing.message = new.message;
        changed = true;
    }
    if existing.observed_generation != new.observed_generation {
        existing.observed_generation = new.observed_generation;
        changed = true;
    }
    changed
}

/// Find the condition with the given type
pub fn find_status_condition<'a>(
    conditions: &'a [Condition],
    condition_type: &str,
) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == condition_type)
}

/// True if the condition with the given type exists and is `True`
pub fn is_status_condition_true(conditions: &[Condition], condition_type: &str) -> bool {
    find_status_condition(conditions, condition_type)
        .map(|c| c.status == ConditionStatus::True)
        .unwrap_or(false)
}
