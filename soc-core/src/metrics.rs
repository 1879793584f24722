use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static RULES_RUN_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("soc_rules_run_total", "Rule executions by rule and outcome"),
        &["rule_id", "tenant_id", "outcome"],
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static ALERTS_EMITTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("soc_alerts_emitted_total", "Alerts emitted by rule and severity"),
        &["rule_id", "severity"],
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static RULE_EXEC_SECS: Lazy<HistogramVec> = Lazy::new(|| {
    let h = HistogramVec::new(
        HistogramOpts::new("soc_rule_exec_seconds", "Rule evaluation latency"),
        &["rule_id"],
    )
    .unwrap();
    REGISTRY.register(Box::new(h.clone())).ok();
    h
});

static JOBS_PROCESSED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("soc_jobs_processed_total", "Parsing jobs processed by priority and outcome"),
        &["priority", "outcome"],
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static JOBS_QUEUED: Lazy<IntGaugeVec> = Lazy::new(|| {
    let g = IntGaugeVec::new(
        Opts::new("soc_jobs_queued", "Jobs currently queued by priority"),
        &["priority"],
    )
    .unwrap();
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

static ENRICHMENT_CACHE_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("soc_enrichment_cache_total", "Enrichment cache lookups by result"),
        &["result"],
    )
    .unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static ADAPTER_CALL_SECS: Lazy<HistogramVec> = Lazy::new(|| {
    let h = HistogramVec::new(
        HistogramOpts::new("soc_adapter_call_seconds", "Adapter call latency by adapter and outcome"),
        &["adapter", "outcome"],
    )
    .unwrap();
    REGISTRY.register(Box::new(h.clone())).ok();
    h
});

pub fn inc_rule_run(rule_id: &str, tenant_id: &str, outcome: &str) {
    RULES_RUN_TOTAL.with_label_values(&[rule_id, tenant_id, outcome]).inc();
}

pub fn inc_alert(rule_id: &str, severity: &str) {
    ALERTS_EMITTED_TOTAL.with_label_values(&[rule_id, severity]).inc();
}

pub fn observe_rule_exec(rule_id: &str, secs: f64) {
    RULE_EXEC_SECS.with_label_values(&[rule_id]).observe(secs);
}

pub fn inc_job_processed(priority: &str, outcome: &str) {
    JOBS_PROCESSED_TOTAL.with_label_values(&[priority, outcome]).inc();
}

pub fn set_jobs_queued(priority: &str, count: i64) {
    JOBS_QUEUED.with_label_values(&[priority]).set(count);
}

pub fn inc_enrichment_cache(result: &str) {
    ENRICHMENT_CACHE_TOTAL.with_label_values(&[result]).inc();
}

pub fn observe_adapter_call(adapter: &str, outcome: &str, secs: f64) {
    ADAPTER_CALL_SECS.with_label_values(&[adapter, outcome]).observe(secs);
}

/// Renders the registry in Prometheus text exposition format for the `/metrics` endpoint.
pub fn render() -> String {
    let metric_families = REGISTRY.gather();
    let mut buf = Vec::new();
    TextEncoder::new().encode(&metric_families, &mut buf).ok();
    String::from_utf8(buf).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_registered_families() {
        inc_rule_run("r1", "t1", "matched");
        let text = render();
        assert!(text.contains("soc_rules_run_total"));
    }
}
