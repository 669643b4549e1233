//! Desired-state projection
//!
//! Pure functions from a [`MinioSpec`] and the [`BaselineTemplate`] to the
//! Deployment and Service the operator wants to exist. Nothing here talks to
//! the API server.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{EnvVar, Service};

use crate::assets::{BaselineTemplate, PASSWORD_ENV_SLOT, USER_ENV_SLOT};
use crate::crd::MinioSpec;
use crate::Error;

/// Label identifying which Minio an operand belongs to
pub const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";

/// Label marking objects created by this operator
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Value of [`MANAGED_BY_LABEL`]
pub const MANAGED_BY: &str = "minio-operator";

/// Pod selector for the operand of the Minio named `name`
///
/// The template's own match labels plus the instance label, so two Minio
/// resources in one namespace never select each other's pods.
pub fn selector_labels(template: &BaselineTemplate, name: &str) -> BTreeMap<String, String> {
    let mut labels = template
        .deployment()
        .spec
        .as_ref()
        .and_then(|s| s.selector.match_labels.clone())
        .unwrap_or_default();
    labels.insert(INSTANCE_LABEL.to_string(), name.to_string());
    labels
}

/// Build the desired Deployment for one Minio
pub fn project_deployment(
    template: &BaselineTemplate,
    namespace: &str,
    name: &str,
    spec: &MinioSpec,
) -> Deployment {
    let mut deployment = template.deployment().clone();
    let selector = selector_labels(template, name);

    deployment.metadata.namespace = Some(namespace.to_string());
    deployment.metadata.name = Some(name.to_string());
    let labels = deployment.metadata.labels.get_or_insert_with(BTreeMap::new);
    labels.extend(selector.clone());
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string());

    if let Some(dspec) = deployment.spec.as_mut() {
        dspec
            .selector
            .match_labels
            .get_or_insert_with(BTreeMap::new)
            .extend(selector.clone());
        dspec
            .template
            .metadata
            .get_or_insert_with(Default::default)
            .labels
            .get_or_insert_with(BTreeMap::new)
            .extend(selector);
    }

    if let Some(env) = first_container_env(&mut deployment) {
        set_env_value(env, USER_ENV_SLOT, &spec.user);
        set_env_value(env, PASSWORD_ENV_SLOT, &spec.password);
    }
    deployment
}

/// Write the credentials from `spec` into the first container's env slots
///
/// Slots missing from the object are restored from the baseline's entries
/// before the write. Empty values keep whatever the slot then holds. This is
/// the only part of the pod spec the operator writes on an existing
/// Deployment. Fails when the object has no container to carry the env.
pub fn apply_credentials(
    deployment: &mut Deployment,
    spec: &MinioSpec,
    template: &BaselineTemplate,
) -> Result<(), Error> {
    let name = deployment.metadata.name.clone().unwrap_or_default();
    let env = first_container_env(deployment).ok_or_else(|| {
        Error::validation(format!(
            "Deployment {name} has no container to carry credentials"
        ))
    })?;

    restore_env_slots(env, baseline_env(template))?;
    set_env_value(env, USER_ENV_SLOT, &spec.user);
    set_env_value(env, PASSWORD_ENV_SLOT, &spec.password);
    Ok(())
}

fn first_container_env(deployment: &mut Deployment) -> Option<&mut Vec<EnvVar>> {
    let container = deployment
        .spec
        .as_mut()?
        .template
        .spec
        .as_mut()?
        .containers
        .first_mut()?;
    Some(container.env.get_or_insert_with(Vec::new))
}

fn baseline_env(template: &BaselineTemplate) -> &[EnvVar] {
    template
        .deployment()
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .and_then(|pod| pod.containers.first())
        .and_then(|c| c.env.as_deref())
        .unwrap_or_default()
}

fn restore_env_slots(env: &mut Vec<EnvVar>, baseline: &[EnvVar]) -> Result<(), Error> {
    let required = USER_ENV_SLOT.max(PASSWORD_ENV_SLOT) + 1;
    while env.len() < required {
        let entry = baseline.get(env.len()).ok_or_else(|| {
            Error::template(format!("baseline has no env entry for slot {}", env.len()))
        })?;
        env.push(entry.clone());
    }
    Ok(())
}

fn set_env_value(env: &mut [EnvVar], slot: usize, value: &str) {
    if value.is_empty() {
        return;
    }
    if let Some(var) = env.get_mut(slot) {
        var.value = Some(value.to_string());
        var.value_from = None;
    }
}

/// Build the desired Service for one Minio, paired with its Deployment
pub fn project_service(template: &BaselineTemplate, namespace: &str, name: &str) -> Service {
    let mut service = template.service().clone();
    let selector = selector_labels(template, name);

    service.metadata.namespace = Some(namespace.to_string());
    service.metadata.name = Some(name.to_string());
    let labels = service.metadata.labels.get_or_insert_with(BTreeMap::new);
    labels.insert(INSTANCE_LABEL.to_string(), name.to_string());
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string());

    let spec = service.spec.get_or_insert_with(Default::default);
    spec.selector = Some(selector);
    // A baseline pinning a cluster IP would collide across instances
    spec.cluster_ip = None;
    spec.cluster_ips = None;
    service
}
