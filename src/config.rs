//! Operator configuration
//!
//! Every setting is a command line flag that can also be supplied through the
//! environment, which is how the operator is usually configured in-cluster.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::assets::BaselineTemplate;
use crate::telemetry::LogFormat;
use crate::Error;

/// Default field manager name for writes to the API server
pub const DEFAULT_FIELD_MANAGER: &str = "minio-operator";

/// Settings shared by all subcommands
#[derive(Args, Clone, Debug)]
pub struct OperatorConfig {
    /// Only watch Minio resources in this namespace (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE", global = true)]
    pub namespace: Option<String>,

    /// Field manager name recorded on every write
    #[arg(long, env = "FIELD_MANAGER", default_value = DEFAULT_FIELD_MANAGER)]
    pub field_manager: String,

    /// Seconds all API calls of one reconcile may take together
    #[arg(long, env = "RECONCILE_TIMEOUT_SECS", default_value_t = 30)]
    pub reconcile_timeout_secs: u64,

    /// Seconds to wait before retrying a failed reconcile
    #[arg(long, env = "ERROR_REQUEUE_SECS", default_value_t = 30)]
    pub error_requeue_secs: u64,

    /// Maximum reconciles running at once across resources (0 = unbounded)
    #[arg(long, env = "RECONCILE_CONCURRENCY", default_value_t = 0)]
    pub concurrency: u16,

    /// Directory holding minio-deployment.yaml and minio-service.yaml
    /// (the manifests built into the binary when unset)
    #[arg(long, env = "MANIFESTS_DIR")]
    pub manifests_dir: Option<PathBuf>,

    /// Install or update the Minio CRD on startup
    #[arg(long, env = "INSTALL_CRDS")]
    pub install_crds: bool,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,
}

impl OperatorConfig {
    /// Deadline for the API calls of one reconcile
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    /// Delay before a failed reconcile is retried
    pub fn error_requeue(&self) -> Duration {
        Duration::from_secs(self.error_requeue_secs)
    }

    /// Load the baseline manifests this configuration points at
    pub fn load_template(&self) -> Result<BaselineTemplate, Error> {
        match &self.manifests_dir {
            Some(dir) => BaselineTemplate::from_dir(dir),
            None => BaselineTemplate::embedded(),
        }
    }
}
