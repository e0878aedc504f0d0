use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use cti_catalog::content::MemorySecurityAnalytics;
use cti_catalog::store::SqliteStore;
use cti_catalog::sync::{HttpCatalogClient, HttpSnapshotFetcher};
use cti_catalog::{Backends, CatalogService, JobOutcome, Settings};

#[derive(Parser, Debug)]
#[command(name = "cti-catalog-sync")]
#[command(about = "Sync local content indices with the CTI catalog", long_about = None)]
struct Cli {
    /// Settings file (TOML). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sync every consumer on a fixed interval until interrupted
    Run,
    /// Sync every consumer once and exit
    Once,
    /// Print a consumer's checkpoint as JSON
    Status { context: String, consumer: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    };
    let service = build_service(&settings)?;

    match cli.command {
        Commands::Run => run(&service, &settings).await,
        Commands::Once => once(&service).await,
        Commands::Status { context, consumer } => {
            let status = service
                .status(&context, &consumer)
                .await
                .with_context(|| format!("reading checkpoint of {}/{}", context, consumer))?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn build_service(settings: &Settings) -> Result<CatalogService> {
    let store = SqliteStore::open(&settings.store.path)
        .with_context(|| format!("opening store at {}", settings.store.path.display()))?;
    let http = reqwest::Client::builder()
        .build()
        .context("building HTTP client")?;

    let backends = Backends {
        store: Arc::new(store),
        client: Arc::new(HttpCatalogClient::new(
            http.clone(),
            settings.cti.base_uri.clone(),
            settings.client_timeout(),
        )),
        fetcher: Arc::new(HttpSnapshotFetcher::new(http, settings.snapshot_timeout())),
        sink: Arc::new(MemorySecurityAnalytics::new()),
    };
    Ok(CatalogService::from_settings(settings, backends)?)
}

async fn run(service: &CatalogService, settings: &Settings) -> Result<()> {
    let mut ticker = tokio::time::interval(settings.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(interval_secs = settings.sync.interval_secs, "Scheduler started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let job = Arc::clone(service.job());
                let run_id = Uuid::new_v4().to_string();
                tokio::spawn(async move {
                    job.execute(&run_id).await;
                });
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!(error = %e, "Failed to listen for shutdown signal");
                }
                info!("Shutting down");
                return Ok(());
            }
        }
    }
}

async fn once(service: &CatalogService) -> Result<()> {
    let outcome = service.sync_now().await;
    let JobOutcome::Completed(reports) = &outcome else {
        bail!("a sync run is already in progress");
    };

    let mut failed = 0;
    for report in reports {
        match &report.result {
            Ok(result) => println!(
                "{} ({}): updated={} offset={}",
                report.profile, report.key, result.updated, result.new_offset
            ),
            Err(e) => {
                failed += 1;
                println!("{} ({}): failed: {}", report.profile, report.key, e);
            }
        }
    }
    if failed > 0 {
        bail!("{} consumer(s) failed", failed);
    }
    Ok(())
}
