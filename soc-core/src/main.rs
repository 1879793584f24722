//! Process entry point: parses CLI arguments, loads configuration, wires an
//! `AppState`, and either serves the thin ambient HTTP surface or validates
//! a config file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use soc_core::adapters::edr::HttpCollectionAdapter;
use soc_core::adapters::executor::{AuditStore, ResponseActionStore};
use soc_core::adapters::soar::HttpSoarAdapter;
use soc_core::adapters::{Adapter, AdapterConfig, CollectionAdapter, SoarAdapter};
use soc_core::audit::InMemoryAuditStore;
use soc_core::config::AppConfig;
use soc_core::detection::scheduler::{run_scheduler, SchedulerDeps};
use soc_core::enrichment::provider::EnrichmentProvider;
use soc_core::error::Result;
use soc_core::models::response::ResponseAction;
use soc_core::notify::LogNotificationChannel;
use soc_core::search::{HttpSearchService, InMemorySearchService, SearchService};
use soc_core::state::AppState;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "soc-core", author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML). Falls back to environment variables alone when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log format (json, pretty)
    #[arg(long, default_value = "pretty")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the detection scheduler, job workers, and health/metrics surface
    Serve {
        /// Directory polled for evidence bytes referenced by pending jobs
        #[arg(long, default_value = "./evidence", env = "SOC_EVIDENCE_DIR")]
        evidence_dir: PathBuf,
    },
    /// Validate a configuration file and print a summary
    Validate {
        #[arg(value_name = "FILE")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    info!("starting {} v{}", soc_core::NAME, soc_core::VERSION);

    match cli.command {
        Commands::Validate { config } => {
            let cfg = AppConfig::load(&config)?;
            println!("configuration is valid");
            println!("  server: {}:{}", cfg.server.host, cfg.server.port);
            println!("  scheduler tick: {}s", cfg.scheduler.tick_interval_secs);
            println!("  job worker pool: {}", cfg.jobs.worker_pool_size);
            Ok(())
        }
        Commands::Serve { evidence_dir } => {
            let config = match &cli.config {
                Some(path) => AppConfig::load(path)?,
                None => AppConfig::from_env_only()?,
            };
            run_serve(config, evidence_dir).await
        }
    }
}

fn init_logging(level: &str, format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        "json" => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        _ => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
    }
}

/// Builds the search backend from `SOC_SEARCH_URL`: an external search
/// cluster when set, an in-memory service (single-process / demo mode)
/// otherwise.
fn build_search_service(config: &AppConfig) -> Result<Arc<dyn SearchService>> {
    match std::env::var("SOC_SEARCH_URL") {
        Ok(url) => {
            let timeout = Duration::from_secs(config.adapters.request_timeout_secs);
            let service = HttpSearchService::new(url, config.adapters.http_pool_size, timeout)?;
            Ok(Arc::new(service))
        }
        Err(_) => {
            warn!("SOC_SEARCH_URL not set, running against an in-memory search service");
            Ok(Arc::new(InMemorySearchService::new()))
        }
    }
}

/// Builds the EDR collection adapter from `SOC_EDR_URL`/`SOC_EDR_API_KEY`
/// when present; response actions fall back to `manual_action_required`
/// otherwise (spec §4.6).
fn build_collection_adapter(config: &AppConfig) -> Option<Arc<dyn CollectionAdapter>> {
    let url = std::env::var("SOC_EDR_URL").ok()?;
    let adapter_config = AdapterConfig {
        url: Some(url),
        api_key: std::env::var("SOC_EDR_API_KEY").ok(),
        timeout_s: config.adapters.request_timeout_secs,
        ..Default::default()
    };
    Some(Arc::new(HttpCollectionAdapter::new("edr", adapter_config)))
}

/// Builds the SOAR workflow adapter from `SOC_SOAR_URL`/`SOC_SOAR_API_KEY`;
/// response actions with no direct EDR call (e.g. `block_ip`) fall back to
/// `manual_action_required` when it's absent (spec §4.6).
fn build_soar_adapter(config: &AppConfig) -> Option<Arc<dyn SoarAdapter>> {
    let url = std::env::var("SOC_SOAR_URL").ok()?;
    let adapter_config = AdapterConfig {
        url: Some(url),
        api_key: std::env::var("SOC_SOAR_API_KEY").ok(),
        timeout_s: config.adapters.request_timeout_secs,
        ..Default::default()
    };
    Some(Arc::new(HttpSoarAdapter::new("shuffle", adapter_config)))
}

/// Builds enrichment providers from `SOC_THREAT_INTEL_URL`; without it, the
/// enrichment pipeline runs with no configured providers and every lookup
/// resolves to `Unknown`.
fn build_enrichment_providers(config: &AppConfig) -> Vec<Arc<dyn EnrichmentProvider>> {
    use soc_core::enrichment::provider::HttpJsonProvider;
    match std::env::var("SOC_THREAT_INTEL_URL") {
        Ok(url) => {
            let timeout = Duration::from_secs(config.enrichment.request_timeout_secs);
            let api_key = std::env::var("SOC_THREAT_INTEL_API_KEY").ok();
            vec![Arc::new(HttpJsonProvider::new("threat-intel", url, api_key, timeout))]
        }
        Err(_) => Vec::new(),
    }
}

async fn run_serve(config: AppConfig, evidence_dir: PathBuf) -> Result<()> {
    let search = build_search_service(&config)?;
    let collection_adapter = build_collection_adapter(&config);
    if let Some(adapter) = &collection_adapter {
        let health = adapter.health_check().await;
        if health.status == soc_core::adapters::AdapterStatus::Connected {
            info!(status = ?health.status, "collection adapter ready");
        } else {
            warn!(status = ?health.status, message = ?health.message, "collection adapter health check failed");
        }
    }
    let enrichment_providers = build_enrichment_providers(&config);
    let soar_adapter = build_soar_adapter(&config);

    let audit: Arc<dyn AuditStore> = Arc::new(InMemoryAuditStore::new());
    let response_actions: Arc<dyn ResponseActionStore> = Arc::new(InMemoryResponseActionStore::default());
    let notifications = Arc::new(LogNotificationChannel::new());

    let state = AppState::new(config.clone(), search, enrichment_providers, collection_adapter, soar_adapter, audit, response_actions, notifications);

    let scheduler_deps = Arc::new(SchedulerDeps {
        search: state.search.clone(),
        rules: state.rules.clone(),
        alerts: state.alerts.clone(),
        config: config.scheduler.clone(),
    });
    tokio::spawn(run_scheduler(scheduler_deps));

    let jobs = state.jobs.clone();
    std::fs::create_dir_all(&evidence_dir).ok();
    tokio::spawn(async move {
        loop {
            let dir = evidence_dir.clone();
            jobs.run_workers(move |evidence_id| std::fs::read(dir.join(evidence_id)).ok()).await;
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    });

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", state.config.server.host, state.config.server.port))
        .await
        .map_err(|e| soc_core::error::SocError::internal(format!("failed to bind listener: {e}")))?;
    info!(host = %state.config.server.host, port = state.config.server.port, "listening");

    let app = soc_core::router::create_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| soc_core::error::SocError::internal(format!("server error: {e}")))
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    info!("shutdown signal received");
}

/// In-memory `ResponseActionStore`, sufficient until a durable implementation
/// is wired in (spec §4.6 only requires the write to land somewhere auditable).
#[derive(Default)]
struct InMemoryResponseActionStore {
    actions: std::sync::Mutex<Vec<ResponseAction>>,
}

#[async_trait::async_trait]
impl ResponseActionStore for InMemoryResponseActionStore {
    async fn save(&self, action: ResponseAction) {
        self.actions.lock().unwrap().push(action);
    }
}
