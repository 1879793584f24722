use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Scheduled,
    Threshold,
    Correlation,
    Ml,
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Draft,
    Enabled,
    Disabled,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Sequence,
    TemporalJoin,
    Aggregation,
    Spike,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQuery {
    pub id: String,
    pub query: String,
    #[serde(default)]
    pub indices: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Gte,
    Gt,
    Lte,
    Lt,
    Eq,
}

impl ComparisonOperator {
    pub fn parse(op: &str) -> Option<Self> {
        match op {
            ">=" => Some(Self::Gte),
            ">" => Some(Self::Gt),
            "<=" => Some(Self::Lte),
            "<" => Some(Self::Lt),
            "==" => Some(Self::Eq),
            _ => None,
        }
    }

    pub fn apply(&self, lhs: i64, rhs: i64) -> bool {
        match self {
            Self::Gte => lhs >= rhs,
            Self::Gt => lhs > rhs,
            Self::Lte => lhs <= rhs,
            Self::Lt => lhs < rhs,
            Self::Eq => lhs == rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    pub event: String,
    /// `"<op> <n>"`, e.g. `">= 5"`.
    pub count: String,
}

impl Threshold {
    pub fn parsed(&self) -> Option<(ComparisonOperator, i64)> {
        let mut parts = self.count.trim().splitn(2, char::is_whitespace);
        let op = ComparisonOperator::parse(parts.next()?)?;
        let n: i64 = parts.next()?.trim().parse().ok()?;
        Some((op, n))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinField {
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceConfig {
    pub order: Vec<String>,
    #[serde(default)]
    pub strict_order: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalJoinConfig {
    pub require_all: Vec<String>,
    pub max_span: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationConfig {
    pub group_by: Vec<String>,
    pub having: Vec<Threshold>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpikeConfig {
    pub field: String,
    pub baseline_window: String,
    pub spike_window: String,
    pub spike_threshold: String,
    pub min_baseline: i64,
}

/// Multi-event pattern configuration (spec §4.3). `window` is a duration
/// string matching `^(\d+)[smhdw]$`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationConfig {
    pub pattern_type: PatternType,
    pub window: String,
    pub events: Vec<EventQuery>,
    #[serde(default)]
    pub join_on: Vec<JoinField>,
    #[serde(default)]
    pub thresholds: Vec<Threshold>,
    pub sequence: Option<SequenceConfig>,
    pub temporal_join: Option<TemporalJoinConfig>,
    pub aggregation: Option<AggregationConfig>,
    pub spike: Option<SpikeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionRule {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub rule_type: RuleType,
    pub severity: u8,
    pub query: String,
    pub indices: Vec<String>,
    pub schedule_interval_secs: u64,
    pub lookback_secs: u64,
    pub threshold_count: Option<i64>,
    pub threshold_field: Option<String>,
    pub correlation_config: Option<CorrelationConfig>,
    pub mitre_tactics: Vec<String>,
    pub mitre_techniques: Vec<String>,
    pub tags: Vec<String>,
    pub status: RuleStatus,
    pub hit_count: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_hit_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

impl DetectionRule {
    /// Enabled rule must have a non-empty query; `correlation` rules must
    /// carry a `correlation_config` (spec §3 invariants).
    pub fn validate(&self) -> Result<(), String> {
        if self.status == RuleStatus::Enabled && self.query.trim().is_empty() {
            return Err("enabled rule must have a non-empty query".into());
        }
        if self.rule_type == RuleType::Correlation && self.correlation_config.is_none() {
            return Err("correlation rule requires correlation_config".into());
        }
        Ok(())
    }

    /// Advances `last_run_at`, rejecting any regression (spec §8 invariant:
    /// monotonically non-decreasing).
    pub fn record_run(&mut self, at: DateTime<Utc>) {
        if self.last_run_at.map(|prev| at >= prev).unwrap_or(true) {
            self.last_run_at = Some(at);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleExecutionStatus {
    Success,
    Failure,
    Timeout,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleExecution {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub hit_count: u64,
    pub status: RuleExecutionStatus,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_parses_operator_and_count() {
        let t = Threshold { event: "e1".into(), count: ">= 5".into() };
        assert_eq!(t.parsed(), Some((ComparisonOperator::Gte, 5)));
    }

    #[test]
    fn rule_run_timestamp_never_regresses() {
        let mut rule = sample_rule();
        let t1 = Utc::now();
        rule.record_run(t1);
        rule.record_run(t1 - chrono::Duration::seconds(10));
        assert_eq!(rule.last_run_at, Some(t1));
    }

    fn sample_rule() -> DetectionRule {
        DetectionRule {
            id: Uuid::new_v4(),
            tenant_id: "t1".into(),
            name: "r".into(),
            description: None,
            rule_type: RuleType::Threshold,
            severity: 50,
            query: "*".into(),
            indices: vec![],
            schedule_interval_secs: 60,
            lookback_secs: 300,
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
}
