use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashSet;
use tokio::sync::Semaphore;
use uuid::Uuid;

use super::{run_rule, AlertStore};
use crate::config::SchedulerConfig;
use crate::metrics;
use crate::models::rule::{DetectionRule, RuleExecutionStatus, RuleStatus};
use crate::search::SearchService;

/// Loads/persists rule definitions; the scheduler never owns storage itself.
#[async_trait::async_trait]
pub trait RuleStore: Send + Sync {
    async fn list_enabled(&self) -> Vec<DetectionRule>;
    async fn save_rule(&self, rule: DetectionRule);
}

/// In-memory `RuleStore` for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryRuleStore {
    rules: std::sync::Mutex<std::collections::HashMap<Uuid, DetectionRule>>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        InMemoryRuleStore::default()
    }

    pub fn insert(&self, rule: DetectionRule) {
        self.rules.lock().unwrap().insert(rule.id, rule);
    }
}

#[async_trait::async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn list_enabled(&self) -> Vec<DetectionRule> {
        self.rules.lock().unwrap().values().filter(|r| r.status == RuleStatus::Enabled).cloned().collect()
    }

    async fn save_rule(&self, rule: DetectionRule) {
        self.rules.lock().unwrap().insert(rule.id, rule);
    }
}

pub struct SchedulerDeps {
    pub search: Arc<dyn SearchService>,
    pub rules: Arc<dyn RuleStore>,
    pub alerts: Arc<dyn AlertStore>,
    pub config: SchedulerConfig,
}

/// Background rule scheduler (spec §4.3, §5): ticks once per
/// `config.tick_interval_secs`, fans each due rule out onto a worker bounded
/// by `config.rule_worker_pool_size`, skips (never queues) a rule that is
/// still in flight from a previous tick, and enforces `config.rule_timeout_secs`
/// by converting an overrun into a `Timeout` execution rather than letting it
/// run unbounded.
pub async fn run_scheduler(deps: Arc<SchedulerDeps>) {
    let semaphore = Arc::new(Semaphore::new(deps.config.rule_worker_pool_size.max(1)));
    let in_flight: Arc<DashSet<Uuid>> = Arc::new(DashSet::new());

    loop {
        let now = Utc::now();
        for rule in deps.rules.list_enabled().await {
            if rule.status != RuleStatus::Enabled {
                continue;
            }
            let due = rule
                .last_run_at
                .map(|t| (now - t).num_seconds() as u64 >= rule.schedule_interval_secs)
                .unwrap_or(true);
            if !due || in_flight.contains(&rule.id) {
                continue;
            }
            let Ok(permit) = semaphore.clone().try_acquire_owned() else { continue };

            in_flight.insert(rule.id);
            let deps = deps.clone();
            let in_flight = in_flight.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let timeout_dur = Duration::from_secs(deps.config.rule_timeout_secs);
                let start = Instant::now();

                let mut rule = rule;
                let mut execution = match tokio::time::timeout(
                    timeout_dur,
                    run_rule(&rule, deps.search.as_ref(), deps.alerts.as_ref(), Utc::now(), deps.config.alert_dedup_window_secs, deps.config.max_alerts_per_run),
                )
                .await
                {
                    Ok(outcome) => outcome.execution,
                    Err(_) => {
                        metrics::inc_rule_run(&rule.id.to_string(), &rule.tenant_id, "timeout");
                        crate::models::rule::RuleExecution {
                            id: Uuid::new_v4(),
                            rule_id: rule.id,
                            started_at: Utc::now(),
                            ended_at: Some(Utc::now()),
                            hit_count: 0,
                            status: RuleExecutionStatus::Timeout,
                            error: Some(format!("rule execution exceeded {}s timeout", deps.config.rule_timeout_secs)),
                        }
                    }
                };

                metrics::observe_rule_exec(&rule.id.to_string(), start.elapsed().as_secs_f64());

                if execution.status == RuleExecutionStatus::Success {
                    rule.consecutive_failures = 0;
                    rule.last_hit_at = if execution.hit_count > 0 { execution.ended_at } else { rule.last_hit_at };
                } else {
                    rule.consecutive_failures += 1;
                }
                rule.record_run(execution.ended_at.unwrap_or_else(Utc::now));
                if rule.consecutive_failures >= deps.config.max_consecutive_failures {
                    rule.status = RuleStatus::Disabled;
                }

                execution.ended_at.get_or_insert_with(Utc::now);
                deps.rules.save_rule(rule).await;
                in_flight.remove(&execution.rule_id);
            });
        }

        tokio::time::sleep(Duration::from_secs(deps.config.tick_interval_secs)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Alert;
    use crate::search::InMemorySearchService;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    struct OneShotRules {
        rule: Mutex<Option<DetectionRule>>,
        saved: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl RuleStore for OneShotRules {
        async fn list_enabled(&self) -> Vec<DetectionRule> {
            self.rule.lock().unwrap().clone().into_iter().collect()
        }
        async fn save_rule(&self, rule: DetectionRule) {
            *self.rule.lock().unwrap() = Some(rule.clone());
            if rule.status == RuleStatus::Disabled {
                self.saved.notify_one();
            }
        }
    }

    struct NullAlerts;
    #[async_trait::async_trait]
    impl AlertStore for NullAlerts {
        async fn find_open(&self, _fingerprint: &str) -> Option<Alert> {
            None
        }
        async fn save(&self, _alert: Alert) {}
    }

    fn failing_rule() -> DetectionRule {
        DetectionRule {
            id: Uuid::new_v4(),
            tenant_id: "t1".into(),
            name: "correlation-missing-config".into(),
            description: None,
            rule_type: crate::models::rule::RuleType::Correlation,
            severity: 50,
            query: "*".into(),
            indices: vec![],
            schedule_interval_secs: 0,
            lookback_secs: 60,
            threshold_count: None,
            threshold_field: None,
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

    #[tokio::test(start_paused = true)]
    async fn rule_auto_disables_after_consecutive_failures() {
        let saved = Arc::new(Notify::new());
        let deps = Arc::new(SchedulerDeps {
            search: Arc::new(InMemorySearchService::new()),
            rules: Arc::new(OneShotRules { rule: Mutex::new(Some(failing_rule())), saved: saved.clone() }),
            alerts: Arc::new(NullAlerts),
            config: SchedulerConfig {
                tick_interval_secs: 1,
                rule_worker_pool_size: 2,
                rule_timeout_secs: 5,
                max_alerts_per_run: 100,
                alert_dedup_window_secs: 3600,
                max_consecutive_failures: 2,
            },
        });

        let handle = tokio::spawn(run_scheduler(deps));
        tokio::time::timeout(Duration::from_secs(30), saved.notified()).await.expect("rule should auto-disable");
        handle.abort();
    }
}
