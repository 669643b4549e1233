//! Minio Custom Resource Definition
//!
//! A `Minio` resource declares a single Minio deployment. The operator owns the
//! resulting Deployment and Service and never writes to `spec`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::conditions::find_status_condition;
use super::types::{Condition, ConditionStatus, CONDITION_READY};

/// Specification for a Minio instance
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "operator.heureso.com",
    version = "v1alpha1",
    kind = "Minio",
    plural = "minios",
    status = "MinioStatus",
    namespaced,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].message"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MinioSpec {
    /// User needed to log in to the Minio UI
    #[schemars(length(min = 1))]
    pub user: String,

    /// Password for the Minio UI user
    #[schemars(length(min = 1))]
    pub password: String,

    /// Any value; changing it asks the operator to redeploy the operand
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_redeploy: Option<RedeployToken>,
}

/// Opaque change token
///
/// Only equality is meaningful. The content is never interpreted.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub struct RedeployToken(String);

impl RedeployToken {
    /// Wrap a raw token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

/// Observed state of a Minio instance
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MinioStatus {
    /// Conditions, at most one per type
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl MinioStatus {
    /// The `Ready` condition, if recorded
    pub fn ready_condition(&self) -> Option<&Condition> {
        find_status_condition(&self.conditions, CONDITION_READY)
    }
}

impl Minio {
    /// Status of the `Ready` condition, `Unknown` when nothing was recorded yet
    pub fn ready_status(&self) -> ConditionStatus {
        self.status
            .as_ref()
            .and_then(MinioStatus::ready_condition)
            .map(|c| c.status)
            .unwrap_or_default()
    }

    /// Message of the `Ready` condition, empty when nothing was recorded yet
    pub fn ready_message(&self) -> &str {
        self.status
            .as_ref()
            .and_then(MinioStatus::ready_condition)
            .map(|c| c.message.as_str())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::types::REASON_SUCCEEDED;
    use kube::core::ObjectMeta;
    use kube::CustomResourceExt;
    use serde_json::json;

    fn sample_minio() -> Minio {
        Minio {
            metadata: ObjectMeta {
                name: Some("test".to_string()),
                namespace: Some("storage".to_string()),
                ..Default::default()
            },
            spec: MinioSpec {
                user: "admin".to_string(),
                password: "supersecret1234".to_string(),
                force_redeploy: None,
            },
            status: None,
        }
    }

    #[test]
    fn spec_uses_camel_case_field_names() {
        let spec = MinioSpec {
            user: "admin".to_string(),
            password: "secret".to_string(),
            force_redeploy: Some(RedeployToken::new("2023-05-01")),
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(
            value,
            json!({"user": "admin", "password": "secret", "forceRedeploy": "2023-05-01"})
        );
    }

    #[test]
    fn force_redeploy_is_optional() {
        let spec: MinioSpec =
            serde_json::from_value(json!({"user": "admin", "password": "secret"})).unwrap();
        assert!(spec.force_redeploy.is_none());
        assert!(serde_json::to_value(&spec)
            .unwrap()
            .get("forceRedeploy")
            .is_none());
    }

    #[test]
    fn sample_manifest_parses() {
        let minio: Minio =
            serde_yaml::from_str(include_str!("../../deploy/minio-sample.yaml")).unwrap();
        assert_eq!(minio.metadata.name.as_deref(), Some("test"));
        assert_eq!(minio.spec, sample_minio().spec);
        assert!(minio.status.is_none());
    }

    #[test]
    fn redeploy_tokens_compare_by_value() {
        assert_eq!(RedeployToken::new("a"), RedeployToken::new("a"));
        assert_ne!(RedeployToken::new("a"), RedeployToken::new("b"));
    }

    #[test]
    fn crd_declares_group_status_and_columns() {
        let crd = Minio::crd();
        assert_eq!(crd.spec.group, "operator.heureso.com");
        assert_eq!(crd.spec.names.kind, "Minio");
        assert_eq!(crd.spec.names.plural, "minios");
        assert_eq!(crd.spec.scope, "Namespaced");

        let version = &crd.spec.versions[0];
        assert_eq!(version.name, "v1alpha1");
        assert!(version
            .subresources
            .as_ref()
            .and_then(|s| s.status.as_ref())
            .is_some());

        let columns: Vec<&str> = version
            .additional_printer_columns
            .as_ref()
            .unwrap()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(columns, vec!["Age", "Ready", "Status"]);
    }

    #[test]
    fn ready_accessors_default_when_status_missing() {
        let minio = sample_minio();
        assert_eq!(minio.ready_status(), ConditionStatus::Unknown);
        assert_eq!(minio.ready_message(), "");
    }

    #[test]
    fn ready_accessors_read_the_ready_condition() {
        let mut minio = sample_minio();
        minio.status = Some(MinioStatus {
            conditions: vec![Condition::new(
                CONDITION_READY,
                ConditionStatus::True,
                REASON_SUCCEEDED,
                "operator successfully reconciling",
            )],
        });
        assert_eq!(minio.ready_status(), ConditionStatus::True);
        assert_eq!(minio.ready_message(), "operator successfully reconciling");
    }
}
