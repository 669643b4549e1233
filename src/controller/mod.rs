//! Controller implementation for the Minio CRD
//!
//! [`minio`] holds the reconciliation logic, [`store`] the API access it goes
//! through. [`run`] wires both into a `kube` runtime controller that watches
//! `Minio` resources and the Deployments and Services they own.

pub mod minio;
pub mod store;

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::controller::{Action, Config as ControllerConfig};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};
use tracing::{debug, info, warn};

pub use minio::{error_policy, reconcile, reconcile_key, Context, ObjectKey, MESSAGE_SUCCEEDED};
pub use store::{DeadlineStore, KubeResourceStore, OperandKind, ResourceStore};

use crate::crd::Minio;

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Run the Minio controller until a shutdown signal arrives
///
/// Watches one namespace when `namespace` is set, all namespaces otherwise.
/// `concurrency` bounds parallel reconciles of distinct resources; 0 means
/// unbounded. A single resource is never reconciled concurrently with itself.
pub async fn run(client: Client, namespace: Option<&str>, concurrency: u16, ctx: Arc<Context>) {
    let (minios, deployments, services): (Api<Minio>, Api<Deployment>, Api<Service>) =
        match namespace {
            Some(ns) => (
                Api::namespaced(client.clone(), ns),
                Api::namespaced(client.clone(), ns),
                Api::namespaced(client, ns),
            ),
            None => (
                Api::all(client.clone()),
                Api::all(client.clone()),
                Api::all(client),
            ),
        };

    info!(
        namespace = namespace.unwrap_or("<all>"),
        concurrency, "starting Minio controller"
    );

    let watcher = || WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS);
    Controller::new(minios, watcher())
        .owns(deployments, watcher())
        .owns(services, watcher())
        .with_config(ControllerConfig::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(log_reconcile_result)
        .await;

    info!("Minio controller stopped");
}

fn log_reconcile_result<E: std::fmt::Debug>(
    result: Result<(ObjectRef<Minio>, Action), E>,
) -> std::future::Ready<()> {
    match result {
        Ok((object, action)) => debug!(
            minio = %object.name,
            namespace = object.namespace.as_deref().unwrap_or_default(),
            ?action,
            "reconciliation completed"
        ),
        Err(e) => warn!(error = ?e, "reconciliation error"),
    }
    std::future::ready(())
}
