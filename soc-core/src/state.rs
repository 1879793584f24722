use std::sync::Arc;

use crate::adapters::executor::{AuditStore, ResponseActionStore, ResponseExecutor};
use crate::adapters::{CollectionAdapter, SoarAdapter};
use crate::config::AppConfig;
use crate::detection::scheduler::{InMemoryRuleStore, RuleStore};
use crate::detection::{AlertStore, InMemoryAlertStore};
use crate::enrichment::cache::EnrichmentCache;
use crate::enrichment::provider::EnrichmentProvider;
use crate::enrichment::EnrichmentPipeline;
use crate::jobs::{InMemoryJobStore, JobOrchestrator, JobStore};
use crate::notify::NotificationChannel;
use crate::parsers::ParserRegistry;
use crate::search::SearchService;

/// Shared, `Arc`-wrapped handles every HTTP handler and background task
/// consumes. Constructed once at process startup (spec §4.0 ambient stack).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub search: Arc<dyn SearchService>,
    pub parsers: Arc<ParserRegistry>,
    pub rules: Arc<dyn RuleStore>,
    pub alerts: Arc<dyn AlertStore>,
    pub jobs: Arc<JobOrchestrator>,
    pub enrichment: Arc<EnrichmentPipeline>,
    pub executor: Arc<ResponseExecutor>,
    pub notifications: Arc<dyn NotificationChannel>,
}

impl AppState {
    /// Assembles an `AppState` over an in-memory rule/alert/job store and
    /// whatever search backend and enrichment providers the caller supplies.
    /// A production deployment swaps the `*Store` implementations for
    /// durable ones without touching this wiring shape.
    pub fn new(
        config: AppConfig,
        search: Arc<dyn SearchService>,
        enrichment_providers: Vec<Arc<dyn EnrichmentProvider>>,
        collection_adapter: Option<Arc<dyn CollectionAdapter>>,
        soar_adapter: Option<Arc<dyn SoarAdapter>>,
        audit: Arc<dyn AuditStore>,
        response_actions: Arc<dyn ResponseActionStore>,
        notifications: Arc<dyn NotificationChannel>,
    ) -> Self {
        let parsers = Arc::new(ParserRegistry::with_builtins());
        let rules: Arc<dyn RuleStore> = Arc::new(InMemoryRuleStore::new());
        let alerts: Arc<dyn AlertStore> = Arc::new(InMemoryAlertStore::new());
        let job_store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
        let jobs = Arc::new(JobOrchestrator::new(job_store, parsers.clone(), search.clone(), config.jobs.clone()));

        let cache = Arc::new(EnrichmentCache::new(
            std::time::Duration::from_secs(config.enrichment.cache_ttl_secs.max(0) as u64),
            std::time::Duration::from_secs(config.enrichment.cache_negative_ttl_secs.max(0) as u64),
        ));
        let enrichment = Arc::new(EnrichmentPipeline::new(enrichment_providers, cache, config.enrichment.max_concurrent));
        let mut executor = ResponseExecutor::new(collection_adapter, response_actions, audit);
        if let Some(soar) = soar_adapter {
            executor = executor.with_soar(soar);
        }
        let executor = Arc::new(executor);

        AppState { config: Arc::new(config), search, parsers, rules, alerts, jobs, enrichment, executor, notifications }
    }
}
