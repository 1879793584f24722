use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, SocError};

/// Top-level process configuration for the ingestion-to-alert backbone.
///
/// Loaded from a TOML file with `SOC_`-prefixed environment variable
/// overrides applied on top, mirroring the layered config the pipeline
/// this crate is descended from uses for its own settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
    pub jobs: JobsConfig,
    pub enrichment: EnrichmentConfig,
    pub adapters: AdaptersConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Detection/correlation scheduling knobs (spec §4.3, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    pub tick_interval_secs: u64,
    pub rule_worker_pool_size: usize,
    pub rule_timeout_secs: u64,
    pub max_alerts_per_run: usize,
    pub alert_dedup_window_secs: i64,
    pub max_consecutive_failures: u32,
}

impl SchedulerConfig {
    fn default_pool_size() -> usize {
        (num_cpus::get() * 2).max(2)
    }
}

/// Parsing job orchestrator knobs (spec §4.4, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JobsConfig {
    pub worker_pool_size: usize,
    pub index_batch_size: usize,
    pub low_priority_starvation_threshold: u32,
    pub parser_error_cap: u32,
}

/// Enrichment pipeline knobs (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EnrichmentConfig {
    pub max_concurrent: usize,
    pub cache_ttl_secs: i64,
    pub cache_negative_ttl_secs: i64,
    pub request_timeout_secs: u64,
}

/// Per-adapter HTTP client pool sizing (spec §5 — clients reused, never
/// created per call).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AdaptersConfig {
    pub http_pool_size: usize,
    pub request_timeout_secs: u64,
}

/// Exponential backoff parameters (spec §7: base 1s, factor 2, cap 30s, 3 attempts).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub factor: u32,
    pub cap_ms: u64,
    pub max_attempts: u8,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server: ServerConfig { host: "0.0.0.0".to_string(), port: 8090 },
            scheduler: SchedulerConfig {
                tick_interval_secs: 1,
                rule_worker_pool_size: SchedulerConfig::default_pool_size(),
                rule_timeout_secs: 60,
                max_alerts_per_run: 1000,
                alert_dedup_window_secs: 3600,
                max_consecutive_failures: 5,
            },
            jobs: JobsConfig {
                worker_pool_size: 4,
                index_batch_size: 1000,
                low_priority_starvation_threshold: 100,
                parser_error_cap: 100,
            },
            enrichment: EnrichmentConfig {
                max_concurrent: 10,
                cache_ttl_secs: 3600,
                cache_negative_ttl_secs: 300,
                request_timeout_secs: 10,
            },
            adapters: AdaptersConfig { http_pool_size: 8, request_timeout_secs: 15 },
            retry: RetryConfig { base_delay_ms: 1000, factor: 2, cap_ms: 30_000, max_attempts: 3 },
        }
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SocError::validation(format!("failed to read config file: {e}")))?;
        let mut config: AppConfig = toml::from_str(&content)
            .map_err(|e| SocError::validation(format!("failed to parse config: {e}")))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_env_only() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("SOC_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("SOC_SERVER_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(v) = std::env::var("SOC_SCHEDULER_TICK_SECS") {
            if let Ok(v) = v.parse() {
                self.scheduler.tick_interval_secs = v;
            }
        }
        if let Ok(v) = std::env::var("SOC_ENRICHMENT_MAX_CONCURRENT") {
            if let Ok(v) = v.parse() {
                self.enrichment.max_concurrent = v;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.scheduler.rule_worker_pool_size == 0 {
            return Err(SocError::validation("scheduler.rule_worker_pool_size must be > 0"));
        }
        if self.jobs.worker_pool_size == 0 {
            return Err(SocError::validation("jobs.worker_pool_size must be > 0"));
        }
        if self.enrichment.max_concurrent == 0 {
            return Err(SocError::validation("enrichment.max_concurrent must be > 0"));
        }
        Ok(())
    }
}
