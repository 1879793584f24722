//! SOC ingestion-to-alert backbone.
//!
//! Normalizes heterogeneous evidence into ECS-shaped documents, evaluates
//! detection and correlation rules against them, deduplicates the results
//! into alerts, enriches indicators of compromise against threat-intel
//! providers, and dispatches response actions through pluggable adapters.
//!
//! # Modules
//!
//! - [`parsers`] — evidence parsers (EVTX, Linux auth log, JSON Lines, CSV) and registry
//! - [`normalize`] — ECS normalization
//! - [`detection`] — rule scheduler, execution, and alert dedup
//! - [`correlation`] — sequence/temporal-join/aggregation/spike pattern evaluators
//! - [`enrichment`] — IOC extraction, provider lookups, and caching
//! - [`jobs`] — parsing job queue and worker orchestration
//! - [`adapters`] — EDR/storage integrations and the response executor
//! - [`notify`] — outbound notification channels
//! - [`kql`] — KQL-lite query parsing and translation to search DSL
//! - [`search`] — the external search service façade
//! - [`models`] — shared data model
//! - [`config`] — process configuration
//! - [`error`] — error taxonomy

pub mod adapters;
pub mod audit;
pub mod config;
pub mod correlation;
pub mod detection;
pub mod enrichment;
pub mod error;
pub mod jobs;
pub mod kql;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod notify;
pub mod parsers;
pub mod router;
pub mod search;
pub mod state;
pub mod util;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Re-exports for the common case of wiring an `AppState` and its router.
pub mod prelude {
    pub use crate::config::AppConfig;
    pub use crate::error::{Result, SocError};
    pub use crate::router::create_router;
    pub use crate::state::AppState;
}
