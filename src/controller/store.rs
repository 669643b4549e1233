//! Resource store used by the reconciler
//!
//! The reconciler only ever talks to the API server through [`ResourceStore`],
//! which keeps it testable without a cluster. Operands are passed around as
//! JSON so create-or-patch can diff them generically.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource};
#[cfg(test)]
use mockall::automock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::crd::{Minio, MinioStatus};
use crate::Error;

/// Kinds of dependent objects the operator manages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperandKind {
    /// The Minio workload
    Deployment,
    /// Network exposure for the workload
    Service,
}

impl OperandKind {
    /// Kubernetes kind name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployment => "Deployment",
            Self::Service => "Service",
        }
    }
}

impl std::fmt::Display for OperandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Trait for dependency injection and testability
// =============================================================================

/// Typed access to Minio resources and their operands
///
/// Implementations map "not found" to `None` rather than an error. Patches are
/// JSON merge patches; when one carries `metadata.resourceVersion` the write
/// must fail with a conflict if the stored object has moved on.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Get a Minio by namespace and name
    async fn get_minio(&self, namespace: &str, name: &str) -> Result<Option<Minio>, Error>;

    /// List Minios in one namespace, or in all namespaces when `None`
    async fn list_minios(&self, namespace: Option<String>) -> Result<Vec<Minio>, Error>;

    /// Replace the status of a Minio through the status subresource
    async fn update_minio_status(
        &self,
        namespace: &str,
        name: &str,
        status: &MinioStatus,
    ) -> Result<(), Error>;

    /// Get an operand as JSON
    async fn get_operand(
        &self,
        kind: OperandKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Value>, Error>;

    /// Create an operand
    async fn create_operand(
        &self,
        kind: OperandKind,
        namespace: &str,
        object: &Value,
    ) -> Result<(), Error>;

    /// Apply a JSON merge patch to an operand
    async fn patch_operand(
        &self,
        kind: OperandKind,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<(), Error>;
}

// =============================================================================
// Kubernetes implementation
// =============================================================================

/// [`ResourceStore`] backed by the Kubernetes API server
pub struct KubeResourceStore {
    client: Client,
    field_manager: String,
}

impl KubeResourceStore {
    /// Create a store writing with the given field manager name
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn params(&self) -> PatchParams {
        PatchParams::apply(&self.field_manager)
    }

    async fn get_typed<K>(&self, namespace: &str, name: &str) -> Result<Option<Value>, Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + DeserializeOwned
            + Serialize,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(obj) => serde_json::to_value(obj)
                .map(Some)
                .map_err(|e| Error::serialization(e.to_string())),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_typed<K>(&self, namespace: &str, object: &Value) -> Result<(), Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + DeserializeOwned
            + Serialize,
    {
        let obj: K = serde_json::from_value(object.clone())
            .map_err(|e| Error::serialization(e.to_string()))?;
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let params = PostParams {
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        };
        api.create(&params, &obj).await?;
        Ok(())
    }

    async fn patch_typed<K>(&self, namespace: &str, name: &str, patch: &Value) -> Result<(), Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + DeserializeOwned,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.patch(name, &self.params(), &Patch::Merge(patch)).await?;
        Ok(())
    }
}

#[async_trait]
impl ResourceStore for KubeResourceStore {
    async fn get_minio(&self, namespace: &str, name: &str) -> Result<Option<Minio>, Error> {
        let api: Api<Minio> = Api::namespaced(self.client.clone(), namespace);
        match api.get(name).await {
            Ok(minio) => Ok(Some(minio)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_minios(&self, namespace: Option<String>) -> Result<Vec<Minio>, Error> {
        let api: Api<Minio> = match namespace.as_deref() {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let list = api.list(&ListParams::default()).await?;
        Ok(list.items)
    }

    async fn update_minio_status(
        &self,
        namespace: &str,
        name: &str,
        status: &MinioStatus,
    ) -> Result<(), Error> {
        let api: Api<Minio> = Api::namespaced(self.client.clone(), namespace);
        let status_patch = serde_json::json!({ "status": status });

        api.patch_status(name, &self.params(), &Patch::Merge(&status_patch))
            .await?;

        debug!(minio = %name, namespace = %namespace, "updated status");
        Ok(())
    }

    async fn get_operand(
        &self,
        kind: OperandKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Value>, Error> {
        match kind {
            OperandKind::Deployment => self.get_typed::<Deployment>(namespace, name).await,
            OperandKind::Service => self.get_typed::<Service>(namespace, name).await,
        }
    }

    async fn create_operand(
        &self,
        kind: OperandKind,
        namespace: &str,
        object: &Value,
    ) -> Result<(), Error> {
        match kind {
            OperandKind::Deployment => self.create_typed::<Deployment>(namespace, object).await,
            OperandKind::Service => self.create_typed::<Service>(namespace, object).await,
        }
    }

    async fn patch_operand(
        &self,
        kind: OperandKind,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<(), Error> {
        match kind {
            OperandKind::Deployment => {
                self.patch_typed::<Deployment>(namespace, name, patch).await
            }
            OperandKind::Service => self.patch_typed::<Service>(namespace, name, patch).await,
        }
    }
}

// =============================================================================
// Deadline-bounded view
// =============================================================================

/// A view of a store where every call shares one deadline
///
/// Calls still running when the deadline passes fail with
/// [`Error::DeadlineExceeded`], and no call is issued once it has passed.
pub struct DeadlineStore<'a> {
    inner: &'a dyn ResourceStore,
    deadline: Instant,
}

impl<'a> DeadlineStore<'a> {
    /// Bound `inner` by a deadline `timeout` from now
    pub fn new(inner: &'a dyn ResourceStore, timeout: Duration) -> Self {
        Self {
            inner,
            deadline: Instant::now() + timeout,
        }
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, Error>> + Send,
    ) -> Result<T, Error> {
        if Instant::now() >= self.deadline {
            return Err(Error::deadline_exceeded(operation));
        }
        tokio::time::timeout_at(self.deadline, call)
            .await
            .map_err(|_| Error::deadline_exceeded(operation))?
    }
}

#[async_trait]
impl ResourceStore for DeadlineStore<'_> {
    async fn get_minio(&self, namespace: &str, name: &str) -> Result<Option<Minio>, Error> {
        self.bounded("get minio", self.inner.get_minio(namespace, name))
            .await
    }

    async fn list_minios(&self, namespace: Option<String>) -> Result<Vec<Minio>, Error> {
        self.bounded("list minios", self.inner.list_minios(namespace))
            .await
    }

    async fn update_minio_status(
        &self,
        namespace: &str,
        name: &str,
        status: &MinioStatus,
    ) -> Result<(), Error> {
        self.bounded(
            "update minio status",
            self.inner.update_minio_status(namespace, name, status),
        )
        .await
    }

    async fn get_operand(
        &self,
        kind: OperandKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Value>, Error> {
        self.bounded(
            &format!("get {kind}"),
            self.inner.get_operand(kind, namespace, name),
        )
        .await
    }

    async fn create_operand(
        &self,
        kind: OperandKind,
        namespace: &str,
        object: &Value,
    ) -> Result<(), Error> {
        self.bounded(
            &format!("create {kind}"),
            self.inner.create_operand(kind, namespace, object),
        )
        .await
    }

    async fn patch_operand(
        &self,
        kind: OperandKind,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<(), Error> {
        self.bounded(
            &format!("patch {kind}"),
            self.inner.patch_operand(kind, namespace, name, patch),
        )
        .await
    }
}
