pub mod dedup;
pub mod scheduler;
pub mod threshold;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::correlation;
use crate::error::SocError;
use crate::metrics;
use crate::models::alert::AlertSeverity;
use crate::models::rule::{DetectionRule, RuleExecution, RuleExecutionStatus, RuleType};
use crate::models::Alert;
use crate::search::SearchService;
use crate::util::keylock;

/// Persists alerts keyed by fingerprint; the scheduler owns the concrete
/// backing store (database, in-memory map, ...).
#[async_trait::async_trait]
pub trait AlertStore: Send + Sync {
    async fn find_open(&self, fingerprint: &str) -> Option<Alert>;
    async fn save(&self, alert: Alert);
}

/// In-memory `AlertStore` for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryAlertStore {
    alerts: parking_lot::Mutex<std::collections::HashMap<String, Alert>>,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        InMemoryAlertStore::default()
    }

    pub fn all(&self) -> Vec<Alert> {
        self.alerts.lock().values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn find_open(&self, fingerprint: &str) -> Option<Alert> {
        self.alerts.lock().get(fingerprint).cloned()
    }

    async fn save(&self, alert: Alert) {
        self.alerts.lock().insert(alert.fingerprint.clone(), alert);
    }
}

pub struct RunOutcome {
    pub execution: RuleExecution,
    pub alerts_emitted: usize,
}

struct RawHit {
    entity_tuple: Vec<String>,
    event_refs: Vec<String>,
}

/// Maps a rule's 0-100 severity score onto the alert severity scale.
fn severity_from_score(score: u8) -> AlertSeverity {
    match score {
        0..=19 => AlertSeverity::Informational,
        20..=39 => AlertSeverity::Low,
        40..=59 => AlertSeverity::Medium,
        60..=79 => AlertSeverity::High,
        _ => AlertSeverity::Critical,
    }
}

fn severity_label(s: AlertSeverity) -> &'static str {
    match s {
        AlertSeverity::Informational => "informational",
        AlertSeverity::Low => "low",
        AlertSeverity::Medium => "medium",
        AlertSeverity::High => "high",
        AlertSeverity::Critical => "critical",
    }
}

/// Runs one rule to completion against `search`, deduping/merging alerts
/// through `store`, and failing the run (rather than silently truncating)
/// once `max_alerts_per_run` hits have been produced (spec §4.3).
pub async fn run_rule(
    rule: &DetectionRule,
    search: &dyn SearchService,
    store: &dyn AlertStore,
    now: DateTime<Utc>,
    dedup_window_secs: i64,
    max_alerts_per_run: usize,
) -> RunOutcome {
    let execution_id = Uuid::new_v4();
    let severity = severity_from_score(rule.severity);

    let hits_result: Result<Vec<RawHit>, SocError> = match rule.rule_type {
        RuleType::Correlation => match &rule.correlation_config {
            Some(cfg) => correlation::evaluate(search, &rule.indices, cfg, rule.lookback_secs as i64, now)
                .await
                .map(|hits| hits.into_iter().map(|h| RawHit { entity_tuple: h.entity, event_refs: h.event_refs }).collect()),
            None => Err(SocError::validation("correlation rule missing correlation_config")),
        },
        RuleType::Ml => Ok(Vec::new()),
        RuleType::Threshold | RuleType::Scheduled | RuleType::Static => threshold::evaluate(search, rule).await.map(|hits| {
            hits.into_iter()
                .map(|h| RawHit { entity_tuple: h.group_value.into_iter().collect(), event_refs: h.event_refs })
                .collect()
        }),
    };

    let mut execution = RuleExecution {
        id: execution_id,
        rule_id: rule.id,
        started_at: now,
        ended_at: None,
        hit_count: 0,
        status: RuleExecutionStatus::Success,
        error: None,
    };

    let hits = match hits_result {
        Ok(h) => h,
        Err(e) => {
            execution.status = RuleExecutionStatus::Failure;
            execution.error = Some(e.to_string());
            execution.ended_at = Some(Utc::now());
            metrics::inc_rule_run(&rule.id.to_string(), &rule.tenant_id, "failure");
            return RunOutcome { execution, alerts_emitted: 0 };
        }
    };

    execution.hit_count = hits.len() as u64;
    let truncated = hits.len() > max_alerts_per_run;

    let mut emitted = 0;
    for hit in hits.into_iter().take(max_alerts_per_run) {
        let fp = dedup::fingerprint(rule.id, &hit.entity_tuple.iter().map(String::as_str).collect::<Vec<_>>());
        let _guard = keylock::lock_key(&fp).await;
        let alert = match store.find_open(&fp).await {
            Some(mut existing) if now - existing.last_seen_at <= chrono::Duration::seconds(dedup_window_secs) => {
                existing.merge_hit(now, severity, hit.event_refs, Vec::new(), Vec::new(), Vec::new());
                existing
            }
            _ => {
                let mut a = Alert::new(Some(rule.id), &rule.name, &rule.name, severity, &fp, now);
                a.events = hit.event_refs;
                a.mitre_tactics = rule.mitre_tactics.clone();
                a.mitre_techniques = rule.mitre_techniques.clone();
                a
            }
        };
        store.save(alert).await;
        drop(_guard);
        emitted += 1;
        metrics::inc_alert(&rule.id.to_string(), severity_label(severity));
    }

    if truncated {
        execution.status = RuleExecutionStatus::Failure;
        execution.error =
            Some(format!("rule produced {} hits, exceeding max_alerts_per_run={max_alerts_per_run}", execution.hit_count));
    }

    execution.ended_at = Some(Utc::now());
    let outcome_label = if execution.status == RuleExecutionStatus::Success { "success" } else { "failure" };
    metrics::inc_rule_run(&rule.id.to_string(), &rule.tenant_id, outcome_label);

    RunOutcome { execution, alerts_emitted: emitted }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rule::RuleStatus;
    use crate::models::EcsDocument;
    use crate::search::{BulkAction, InMemorySearchService};
    use std::sync::Mutex;
    use uuid::Uuid;

    fn doc_with_user(id: &str, user: &str) -> EcsDocument {
        let mut fields = serde_json::Map::new();
        fields.insert("user".into(), serde_json::json!({"name": user}));
        EcsDocument { id: id.into(), fields }
    }

    struct MapStore(Mutex<std::collections::HashMap<String, Alert>>);

    #[async_trait::async_trait]
    impl AlertStore for MapStore {
        async fn find_open(&self, fingerprint: &str) -> Option<Alert> {
            self.0.lock().unwrap().get(fingerprint).cloned()
        }
        async fn save(&self, alert: Alert) {
            self.0.lock().unwrap().insert(alert.fingerprint.clone(), alert);
        }
    }

    fn threshold_rule() -> DetectionRule {
        DetectionRule {
            id: Uuid::new_v4(),
            tenant_id: "t1".into(),
            name: "many-failed-logins".into(),
            description: None,
            rule_type: RuleType::Threshold,
            severity: 70,
            query: "*".into(),
            indices: vec!["events".into()],
            schedule_interval_secs: 60,
            lookback_secs: 300,
            threshold_count: Some(3),
            threshold_field: Some("user.name".into()),
            correlation_config: None,
            mitre_tactics: vec![],
            mitre_techniques: vec![],
            tags: vec![],
            status: RuleStatus::Enabled,
            hit_count: 0,
            last_run_at: None,
            last_hit_at: None,
            consecutive_failures: 0,
        }
    }

    #[tokio::test]
    async fn threshold_rule_run_emits_one_high_severity_alert() {
        let search = InMemorySearchService::new();
        let mut actions = Vec::new();
        for i in 0..4 {
            actions.push(BulkAction { index: "events".into(), doc: doc_with_user(&format!("e{i}"), "baduser") });
        }
        search.bulk(actions).await.unwrap();

        let store = MapStore(Mutex::new(std::collections::HashMap::new()));
        let rule = threshold_rule();
        let outcome = run_rule(&rule, &search, &store, Utc::now(), 3600, 1000).await;

        assert_eq!(outcome.execution.status, RuleExecutionStatus::Success);
        assert_eq!(outcome.alerts_emitted, 1);
        let alerts = store.0.lock().unwrap();
        let alert = alerts.values().next().unwrap();
        assert_eq!(alert.severity, AlertSeverity::High);
    }
}
