//! Retail sync CLI
//!
//! Extracts one tenant's data through the proxy and loads it into Postgres.
//! Configuration comes from the environment (see `SyncConfig::from_env`).

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use proxy_client::ProxyClient;
use retail_sync::{
    ArtifactStore, Catalog, MemoryLoader, Orchestrator, PostgresLoader, RunReport, SyncConfig,
    TracingSink,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "retail-sync")]
#[command(about = "Extract retail backend data and load it into Postgres")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Restrict the run to these resources (repeatable)
    #[arg(long, global = true)]
    only: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every resource, write artifacts, and load them in one transaction
    Run {
        /// Load into memory instead of Postgres
        #[arg(long)]
        dry_run: bool,
    },

    /// Extract and write artifacts only
    Extract,

    /// Load previously written artifacts
    Load,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,retail_sync=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let cli = Cli::parse();
    let config = SyncConfig::from_env().context("Failed to load configuration")?;

    let standard = Catalog::standard();
    standard.validate().context("Standard catalog is inconsistent")?;
    let catalog = standard.select(&cli.only)?;

    tracing::info!(
        tenant = %config.tenant_id,
        resources = catalog.len(),
        output = %config.output_dir.display(),
        "Starting retail sync"
    );

    let report = match cli.command {
        Commands::Run { dry_run: true } => {
            let orchestrator = orchestrator(config.clone(), catalog)?;
            let mut loader = MemoryLoader::new(&config.tenant_id)
                .with_reference_policy(config.load.reference_policy);
            orchestrator.run(&mut loader).await?
        }
        Commands::Run { dry_run: false } => {
            let mut loader = postgres_loader(&config).await?;
            orchestrator(config, catalog)?.run(&mut loader).await?
        }
        Commands::Extract => orchestrator(config, catalog)?.extract_only().await?,
        Commands::Load => {
            let mut loader = postgres_loader(&config).await?;
            // The proxy is never called when loading from disk
            let store = ArtifactStore::new(&config.output_dir);
            Orchestrator::new(config, catalog, Offline, Arc::new(TracingSink))
                .with_artifacts(store)
                .load_from_artifacts(&mut loader)
                .await?
        }
    };

    print_report(&report);
    Ok(())
}

fn orchestrator(config: SyncConfig, catalog: Catalog) -> Result<Orchestrator<ProxyClient>> {
    let gateway = ProxyClient::new(config.proxy()?).context("Failed to build proxy client")?;
    let store = ArtifactStore::new(&config.output_dir);
    Ok(Orchestrator::new(config, catalog, gateway, Arc::new(TracingSink)).with_artifacts(store))
}

async fn postgres_loader(config: &SyncConfig) -> Result<PostgresLoader> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set")?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;
    Ok(PostgresLoader::new(pool, config.load.clone(), &config.tenant_id))
}

/// Gateway for runs that never touch the network.
struct Offline;

#[async_trait::async_trait]
impl proxy_client::Gateway for Offline {
    async fn call(&self, _request: &proxy_client::ApiRequest) -> proxy_client::Outcome {
        proxy_client::Outcome::SoftFail(proxy_client::SoftFailure::Connect(
            "offline: loading from artifacts".to_string(),
        ))
    }
}

fn print_report(report: &RunReport) {
    for resource in &report.resources {
        let loaded = resource
            .loaded
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        tracing::info!(
            resource = %resource.name,
            tier = resource.tier,
            extracted = resource.extracted,
            loaded = %loaded,
            duplicates = resource.stats.duplicates,
            degraded = resource.stats.is_degraded(),
            "Resource summary"
        );
    }
    tracing::info!(
        records = report.total_extracted(),
        committed = report.committed,
        "Done"
    );
}
