//! Baseline manifests for the Minio operand
//!
//! The Deployment and Service manifests are embedded at compile time. They are
//! parsed and validated once at startup into a [`BaselineTemplate`], which is
//! then shared read-only between reconciles. A malformed manifest is a startup
//! error, never a per-reconcile failure.

use std::path::Path;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use tracing::debug;

use crate::Error;

/// File name of the operand Deployment manifest
pub const DEPLOYMENT_MANIFEST: &str = "minio-deployment.yaml";

/// File name of the operand Service manifest
pub const SERVICE_MANIFEST: &str = "minio-service.yaml";

/// Env slot of the first container that receives `spec.user`
pub const USER_ENV_SLOT: usize = 0;

/// Env slot of the first container that receives `spec.password`
pub const PASSWORD_ENV_SLOT: usize = 1;

const EMBEDDED_DEPLOYMENT: &str = include_str!("../../manifests/minio-deployment.yaml");
const EMBEDDED_SERVICE: &str = include_str!("../../manifests/minio-service.yaml");

/// Immutable baseline for the managed workload
#[derive(Clone, Debug, PartialEq)]
pub struct BaselineTemplate {
    deployment: Deployment,
    service: Service,
}

impl BaselineTemplate {
    /// Load the manifests compiled into the binary
    pub fn embedded() -> Result<Self, Error> {
        Self::from_yaml(EMBEDDED_DEPLOYMENT, EMBEDDED_SERVICE)
    }

    /// Load `minio-deployment.yaml` and `minio-service.yaml` from a directory
    pub fn from_dir(dir: &Path) -> Result<Self, Error> {
        let read = |file: &str| {
            let path = dir.join(file);
            std::fs::read_to_string(&path)
                .map_err(|e| Error::template(format!("reading {}: {e}", path.display())))
        };
        Self::from_yaml(&read(DEPLOYMENT_MANIFEST)?, &read(SERVICE_MANIFEST)?)
    }

    /// Parse and validate the two manifests
    pub fn from_yaml(deployment_yaml: &str, service_yaml: &str) -> Result<Self, Error> {
        let deployment: Deployment = serde_yaml::from_str(deployment_yaml)
            .map_err(|e| Error::template(format!("{DEPLOYMENT_MANIFEST}: {e}")))?;
        let service: Service = serde_yaml::from_str(service_yaml)
            .map_err(|e| Error::template(format!("{SERVICE_MANIFEST}: {e}")))?;

        validate_deployment(&deployment)?;
        validate_service(&service)?;

        debug!(
            image = deployment_image(&deployment).unwrap_or_default(),
            "loaded baseline template"
        );
        Ok(Self {
            deployment,
            service,
        })
    }

    /// The baseline Deployment
    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    /// The baseline Service
    pub fn service(&self) -> &Service {
        &self.service
    }
}

fn deployment_image(deployment: &Deployment) -> Option<&str> {
    deployment
        .spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers
        .first()?
        .image
        .as_deref()
}

fn validate_deployment(deployment: &Deployment) -> Result<(), Error> {
    let spec = deployment
        .spec
        .as_ref()
        .ok_or_else(|| Error::template("deployment has no spec"))?;

    if spec
        .selector
        .match_labels
        .as_ref()
        .map_or(true, |labels| labels.is_empty())
    {
        return Err(Error::template("deployment selector has no matchLabels"));
    }

    let container = spec
        .template
        .spec
        .as_ref()
        .and_then(|pod| pod.containers.first())
        .ok_or_else(|| Error::template("deployment has no containers"))?;

    let env_len = container.env.as_ref().map_or(0, Vec::len);
    let required = USER_ENV_SLOT.max(PASSWORD_ENV_SLOT) + 1;
    if env_len < required {
        return Err(Error::template(format!(
            "container '{}' needs at least {required} env entries for credentials, found {env_len}",
            container.name
        )));
    }
    Ok(())
}

fn validate_service(service: &Service) -> Result<(), Error> {
    let has_ports = service
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_ref())
        .is_some_and(|ports| !ports.is_empty());
    if !has_ports {
        return Err(Error::template("service has no ports"));
    }
    Ok(())
}
