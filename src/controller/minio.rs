//! Minio reconciliation controller
//!
//! Drives the Deployment and Service of each `Minio` toward its spec and
//! reports the outcome on the `Ready` condition. Every invocation starts from
//! a fresh read of the resource; nothing is carried between invocations.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use super::store::{DeadlineStore, KubeResourceStore, OperandKind, ResourceStore};
use crate::apply::{create_or_patch, OperationResult};
use crate::assets::BaselineTemplate;
use crate::crd::{
    set_status_condition, Condition, ConditionStatus, Minio, MinioStatus, CONDITION_READY,
    REASON_CR_NOT_AVAILABLE, REASON_OPERAND_DEPLOYMENT_FAILED, REASON_SUCCEEDED,
};
use crate::error::with_secondary;
use crate::owner::{controller_reference, set_controller_reference};
use crate::projector::{apply_credentials, project_deployment, project_service};
use crate::Error;

/// Message recorded on the `Ready` condition after a successful pass
pub const MESSAGE_SUCCEEDED: &str = "operator successfully reconciling";

/// Default bound on the store calls of one reconcile
pub const DEFAULT_RECONCILE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default delay before retrying a failed reconcile
pub const DEFAULT_ERROR_REQUEUE: Duration = Duration::from_secs(30);

// =============================================================================
// Controller context
// =============================================================================

/// Shared state handed to every reconcile
pub struct Context {
    /// Access to Minio resources and their operands
    pub store: Arc<dyn ResourceStore>,
    /// Baseline the operands are projected from
    pub template: Arc<BaselineTemplate>,
    /// Deadline shared by all store calls of one reconcile
    pub reconcile_timeout: Duration,
    /// Delay before retrying a retryable failure
    pub error_requeue: Duration,
}

impl Context {
    /// Create a context with the given dependencies and default timings
    pub fn new(store: Arc<dyn ResourceStore>, template: Arc<BaselineTemplate>) -> Self {
        Self {
            store,
            template,
            reconcile_timeout: DEFAULT_RECONCILE_TIMEOUT,
            error_requeue: DEFAULT_ERROR_REQUEUE,
        }
    }

    /// Create a context talking to the API server through `client`
    pub fn from_client(
        client: Client,
        field_manager: &str,
        template: Arc<BaselineTemplate>,
    ) -> Self {
        Self::new(
            Arc::new(KubeResourceStore::new(client, field_manager)),
            template,
        )
    }

    /// Override the per-reconcile deadline
    pub fn with_reconcile_timeout(mut self, timeout: Duration) -> Self {
        self.reconcile_timeout = timeout;
        self
    }

    /// Override the retry delay for failed reconciles
    pub fn with_error_requeue(mut self, delay: Duration) -> Self {
        self.error_requeue = delay;
        self
    }

    /// Create a context for testing with a mock store and the embedded manifests
    #[cfg(test)]
    pub fn for_testing(store: Arc<dyn ResourceStore>) -> Self {
        let template = BaselineTemplate::embedded().expect("embedded manifests are valid");
        Self::new(store, Arc::new(template))
    }
}

/// Namespace and name of a `Minio`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    /// Namespace of the resource
    pub namespace: String,
    /// Name of the resource
    pub name: String,
}

impl ObjectKey {
    /// Build a key from its parts
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of a namespaced resource
    pub fn for_resource(minio: &Minio) -> Result<Self, Error> {
        let name = minio.name_any();
        let namespace = minio
            .namespace()
            .ok_or_else(|| Error::validation(format!("Minio {name} has no namespace")))?;
        Ok(Self::new(namespace, name))
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Reconcile a Minio resource
///
/// Entry point for the controller runtime. The object it hands over is only
/// used for its key; the resource is read again through the store.
pub async fn reconcile(minio: Arc<Minio>, ctx: Arc<Context>) -> Result<Action, Error> {
    let key = ObjectKey::for_resource(&minio)?;
    reconcile_key(&key, &ctx).await
}

/// Reconcile the Minio identified by `key`
///
/// Fetches the resource, projects and applies its operands, then records the
/// result on the `Ready` condition. A resource that no longer exists is not
/// an error. Returns the aggregate of the primary failure and any failure to
/// write status.
#[instrument(skip(key, ctx), fields(minio = %key.name, namespace = %key.namespace))]
pub async fn reconcile_key(key: &ObjectKey, ctx: &Context) -> Result<Action, Error> {
    let store = DeadlineStore::new(ctx.store.as_ref(), ctx.reconcile_timeout);

    let minio = match store.get_minio(&key.namespace, &key.name).await {
        Ok(Some(minio)) => minio,
        Ok(None) => {
            info!("Minio resource not found, ignoring since object must be deleted");
            return Ok(Action::await_change());
        }
        Err(e) => {
            error!(error = %e, "failed to get Minio resource");
            let condition = Condition::new(
                CONDITION_READY,
                ConditionStatus::False,
                REASON_CR_NOT_AVAILABLE,
                format!("unable to get operator custom resource: {e}"),
            );
            let mut status = MinioStatus::default();
            set_status_condition(&mut status.conditions, condition);
            let write = write_status(&store, key, &status).await.err();
            return Err(with_secondary(e, write));
        }
    };

    info!("reconciling Minio");
    let generation = minio.metadata.generation;
    let mut status = minio.status.clone().unwrap_or_default();

    match apply_operands(&store, &minio, &ctx.template).await {
        Ok((deployment, service)) => {
            debug!(%deployment, %service, "operands applied");
            let condition = Condition::new(
                CONDITION_READY,
                ConditionStatus::True,
                REASON_SUCCEEDED,
                MESSAGE_SUCCEEDED,
            )
            .observed_generation(generation);
            set_status_condition(&mut status.conditions, condition);
            write_status(&store, key, &status).await?;
            info!("Minio reconciled");
            Ok(Action::await_change())
        }
        Err(e) => {
            error!(error = %e, "failed to apply operands");
            let condition = Condition::new(
                CONDITION_READY,
                ConditionStatus::False,
                REASON_OPERAND_DEPLOYMENT_FAILED,
                format!("unable to update operand deployment: {e}"),
            )
            .observed_generation(generation);
            set_status_condition(&mut status.conditions, condition);
            let write = write_status(&store, key, &status).await.err();
            Err(with_secondary(e, write))
        }
    }
}

/// Create or patch the Deployment, then the Service
async fn apply_operands(
    store: &dyn ResourceStore,
    minio: &Minio,
    template: &BaselineTemplate,
) -> Result<(OperationResult, OperationResult), Error> {
    let owner = controller_reference(minio)?;
    let namespace = minio.namespace().unwrap_or_default();
    let name = minio.name_any();

    let desired = project_deployment(template, &namespace, &name, &minio.spec);
    let deployment = create_or_patch(
        store,
        OperandKind::Deployment,
        desired,
        |deployment: &mut Deployment| {
            apply_credentials(deployment, &minio.spec, template)?;
            set_controller_reference(&owner, &mut deployment.metadata, "Deployment")
        },
    )
    .await?;

    let desired = project_service(template, &namespace, &name);
    let service = create_or_patch(
        store,
        OperandKind::Service,
        desired,
        |service: &mut Service| {
            set_controller_reference(&owner, &mut service.metadata, "Service")
        },
    )
    .await?;

    Ok((deployment, service))
}

async fn write_status(
    store: &dyn ResourceStore,
    key: &ObjectKey,
    status: &MinioStatus,
) -> Result<(), Error> {
    store
        .update_minio_status(&key.namespace, &key.name, status)
        .await
        .inspect_err(|e| warn!(error = %e, "failed to update Minio status"))
}

/// Decide what to do after a failed reconcile
pub fn error_policy(minio: Arc<Minio>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        minio = %minio.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(ctx.error_requeue)
    } else {
        Action::await_change()
    }
}
