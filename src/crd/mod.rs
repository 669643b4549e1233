//! Custom Resource Definitions for the Minio operator

pub mod conditions;
mod minio;
mod types;

pub use conditions::{find_status_condition, is_status_condition_true, set_status_condition};
pub use minio::{Minio, MinioSpec, MinioStatus, RedeployToken};
pub use types::{
    Condition, ConditionStatus, CONDITION_READY, REASON_CR_NOT_AVAILABLE,
    REASON_OPERAND_DEPLOYMENT_FAILED, REASON_SUCCEEDED,
};
