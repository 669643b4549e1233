//! Create-or-patch for operand objects
//!
//! Creates the object when absent. When present, applies a mutation to a copy
//! of the live object and sends only the difference as a JSON merge patch
//! (RFC 7386). Fields the mutation does not touch are never written, so values
//! set by other actors survive.

use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::controller::store::{OperandKind, ResourceStore};
use crate::Error;

/// What create-or-patch did to the object
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationResult {
    /// The object did not exist and was created
    Created,
    /// The object existed and was patched
    Updated,
    /// The object already matched; nothing was written
    Unchanged,
}

impl std::fmt::Display for OperationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Ensure the object identified by `desired` exists and carries `mutate`'s fields
///
/// On create, `mutate` runs on `desired` and the result is sent in full. On
/// update, `mutate` runs on the live object; the patch holds the live
/// `resourceVersion` so a concurrent writer turns it into a conflict.
pub async fn create_or_patch<K, F>(
    store: &dyn ResourceStore,
    kind: OperandKind,
    desired: K,
    mutate: F,
) -> Result<OperationResult, Error>
where
    K: Resource + Serialize + DeserializeOwned + Clone,
    F: FnOnce(&mut K) -> Result<(), Error>,
{
    let name = desired.name_any();
    let namespace = desired
        .namespace()
        .ok_or_else(|| Error::validation(format!("{kind} {name} has no namespace")))?;

    let Some(live) = store.get_operand(kind, &namespace, &name).await? else {
        let mut object = desired;
        mutate(&mut object)?;
        let body = to_json(&object)?;
        store.create_operand(kind, &namespace, &body).await?;
        info!(kind = %kind, name = %name, namespace = %namespace, "created operand");
        return Ok(OperationResult::Created);
    };

    let current: K =
        serde_json::from_value(live).map_err(|e| Error::serialization(e.to_string()))?;
    let resource_version = current.resource_version();
    let before = to_json(&current)?;

    let mut object = current;
    mutate(&mut object)?;
    let after = to_json(&object)?;

    let mut patch = merge_patch(&before, &after);
    if is_empty_patch(&patch) {
        debug!(kind = %kind, name = %name, "operand up to date");
        return Ok(OperationResult::Unchanged);
    }

    if let (Some(version), Some(fields)) = (resource_version, patch.as_object_mut()) {
        let metadata = fields
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(metadata) = metadata.as_object_mut() {
            metadata.insert("resourceVersion".to_string(), Value::String(version));
        }
    }

    store.patch_operand(kind, &namespace, &name, &patch).await?;
    info!(kind = %kind, name = %name, namespace = %namespace, "patched operand");
    Ok(OperationResult::Updated)
}

fn to_json<K: Serialize>(object: &K) -> Result<Value, Error> {
    serde_json::to_value(object).map_err(|e| Error::serialization(e.to_string()))
}

/// Compute the JSON merge patch turning `before` into `after`
///
/// Objects are diffed key by key, removed keys become `null`, and any other
/// value (arrays included) is replaced whole.
pub fn merge_patch(before: &Value, after: &Value) -> Value {
    match (before, after) {
        (Value::Object(old), Value::Object(new)) => {
            let mut patch = Map::new();
            for (key, new_value) in new {
                match old.get(key) {
                    Some(old_value) if old_value == new_value => {}
                    Some(old_value) => {
                        patch.insert(key.clone(), merge_patch(old_value, new_value));
                    }
                    None => {
                        patch.insert(key.clone(), new_value.clone());
                    }
                }
            }
            for key in old.keys() {
                if !new.contains_key(key) {
                    patch.insert(key.clone(), Value::Null);
                }
            }
            Value::Object(patch)
        }
        _ => after.clone(),
    }
}

fn is_empty_patch(patch: &Value) -> bool {
    patch.as_object().is_some_and(Map::is_empty)
}
