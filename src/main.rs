//! Minio Operator - keeps Minio deployments in line with their custom resources

use std::sync::Arc;

use clap::{Parser, Subcommand};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, CustomResourceExt};

use minio_operator::config::OperatorConfig;
use minio_operator::controller::{self, Context, KubeResourceStore};
use minio_operator::crd::Minio;
use minio_operator::list::list_table;
use minio_operator::telemetry::init_logging;

/// Minio Operator - reconciles Minio custom resources into a managed Minio deployment
#[derive(Parser, Debug)]
#[command(name = "minio-operator", version, about, long_about = None)]
struct Cli {
    /// Print the CRD manifest and exit
    #[arg(long)]
    crd: bool,

    #[command(flatten)]
    config: OperatorConfig,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Watches Minio resources and the Deployments and Services they own, and
    /// reconciles each resource whenever one of them changes.
    Controller,

    /// List Minio resources with their readiness
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&Minio::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    init_logging(cli.config.log_format)?;

    match cli.command {
        Some(Commands::Controller) | None => run_controller(cli.config).await,
        Some(Commands::List) => run_list(cli.config).await,
    }
}

/// Ensure the Minio CRD is installed
///
/// Uses server-side apply so the installed CRD always matches this binary.
async fn ensure_crds_installed(client: &Client, field_manager: &str) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(field_manager).force();

    tracing::info!("Installing Minio CRD...");
    crds.patch("minios.operator.heureso.com", &params, &Patch::Apply(&Minio::crd()))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to install Minio CRD: {}", e))?;

    Ok(())
}

async fn run_controller(config: OperatorConfig) -> anyhow::Result<()> {
    // The manifests are checked before touching the cluster
    let template = config
        .load_template()
        .map_err(|e| anyhow::anyhow!("Invalid baseline manifests: {}", e))?;

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    if config.install_crds {
        ensure_crds_installed(&client, &config.field_manager).await?;
    }

    let ctx = Context::from_client(client.clone(), &config.field_manager, Arc::new(template))
        .with_reconcile_timeout(config.reconcile_timeout())
        .with_error_requeue(config.error_requeue());

    controller::run(
        client,
        config.namespace.as_deref(),
        config.concurrency,
        Arc::new(ctx),
    )
    .await;

    tracing::info!("Shutting down");
    Ok(())
}

async fn run_list(config: OperatorConfig) -> anyhow::Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;
    let store = KubeResourceStore::new(client, &config.field_manager);

    let table = list_table(&store, config.namespace, chrono::Utc::now()).await?;
    println!("{table}");
    Ok(())
}
