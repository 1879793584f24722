use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Informational,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    InProgress,
    Closed,
    Suppressed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityFacets {
    pub hosts: Vec<String>,
    pub users: Vec<String>,
    pub ips: Vec<String>,
}

/// Persistent alert row (spec §3), grounded field-for-field on the
/// reference backend's SQLAlchemy model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub rule_id: Option<Uuid>,
    pub rule_name: String,
    pub title: String,
    pub description: Option<String>,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub hit_count: u64,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub mitre_tactics: Vec<String>,
    pub mitre_techniques: Vec<String>,
    pub tags: Vec<String>,
    pub events: Vec<String>,
    pub entities: EntityFacets,
    pub case_id: Option<Uuid>,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub closed_by: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
    pub resolution: Option<String>,
    pub is_false_positive: bool,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        rule_id: Option<Uuid>,
        rule_name: impl Into<String>,
        title: impl Into<String>,
        severity: AlertSeverity,
        fingerprint: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        Alert {
            id: Uuid::new_v4(),
            rule_id,
            rule_name: rule_name.into(),
            title: title.into(),
            description: None,
            severity,
            status: AlertStatus::Open,
            hit_count: 1,
            first_seen_at: at,
            last_seen_at: at,
            mitre_tactics: Vec::new(),
            mitre_techniques: Vec::new(),
            tags: Vec::new(),
            events: Vec::new(),
            entities: EntityFacets::default(),
            case_id: None,
            acknowledged_by: None,
            acknowledged_at: None,
            closed_by: None,
            closed_at: None,
            resolution: None,
            is_false_positive: false,
            fingerprint: fingerprint.into(),
            created_at: at,
            updated_at: at,
        }
    }

    /// Merges a repeat hit within the dedup window: bumps `hit_count`,
    /// extends the seen window, unions entities/events, and bumps severity
    /// monotonically — it is never downgraded (spec §4.3, §9 Open Question
    /// resolved in favor of "never downgrade").
    pub fn merge_hit(
        &mut self,
        at: DateTime<Utc>,
        incoming_severity: AlertSeverity,
        event_refs: impl IntoIterator<Item = String>,
        hosts: impl IntoIterator<Item = String>,
        users: impl IntoIterator<Item = String>,
        ips: impl IntoIterator<Item = String>,
    ) {
        self.hit_count += 1;
        if at < self.first_seen_at {
            self.first_seen_at = at;
        }
        if at > self.last_seen_at {
            self.last_seen_at = at;
        }
        if incoming_severity > self.severity {
            self.severity = incoming_severity;
        }
        for e in event_refs {
            if !self.events.contains(&e) {
                self.events.push(e);
            }
        }
        for h in hosts {
            if !self.entities.hosts.contains(&h) {
                self.entities.hosts.push(h);
            }
        }
        for u in users {
            if !self.entities.users.contains(&u) {
                self.entities.users.push(u);
            }
        }
        for ip in ips {
            if !self.entities.ips.contains(&ip) {
                self.entities.ips.push(ip);
            }
        }
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_hit_never_downgrades_severity() {
        let t0 = Utc::now();
        let mut alert = Alert::new(None, "r", "title", AlertSeverity::High, "fp", t0);
        alert.merge_hit(t0 + chrono::Duration::minutes(1), AlertSeverity::Low, [], [], [], []);
        assert_eq!(alert.severity, AlertSeverity::High);
        assert_eq!(alert.hit_count, 2);
    }

    #[test]
    fn first_seen_never_exceeds_last_seen() {
        let t0 = Utc::now();
        let alert = Alert::new(None, "r", "title", AlertSeverity::Low, "fp", t0);
        assert!(alert.first_seen_at <= alert.last_seen_at);
        assert!(alert.hit_count >= 1);
    }
}
