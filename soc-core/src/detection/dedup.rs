use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Alert, AlertSeverity};
use crate::util::keylock;

/// `sha256(rule_id | entity_tuple)` (spec §4.3). `entity_tuple` is the
/// `join_on`/grouping values for correlation rules and the
/// `threshold_field` value for grouped thresholds, else empty.
pub fn fingerprint(rule_id: Uuid, entity_tuple: &[&str]) -> String {
    let joined = entity_tuple.join("\u{1f}");
    let key = format!("{rule_id}|{joined}");
    let digest = Sha256::digest(key.as_bytes());
    format!("{digest:x}")
}

pub struct DedupHit<'a> {
    pub severity: AlertSeverity,
    pub event_refs: Vec<String>,
    pub hosts: Vec<String>,
    pub users: Vec<String>,
    pub ips: Vec<String>,
    pub rule_name: &'a str,
    pub title: &'a str,
}

/// Serializes alert creation/update per fingerprint through a keyed lock
/// so concurrent rule runs with the same entity tuple linearize (spec §5:
/// "alert dedup updates are linearizable per fingerprint"). `store` must
/// itself be safe to call concurrently for other fingerprints.
pub async fn upsert_alert<F, G>(
    fp: &str,
    rule_id: Option<Uuid>,
    hit: DedupHit<'_>,
    at: DateTime<Utc>,
    dedup_window: chrono::Duration,
    find_open: F,
    save: G,
) where
    F: FnOnce(&str) -> Option<Alert>,
    G: FnOnce(Alert),
{
    let _guard = keylock::lock_key(fp).await;

    let alert = match find_open(fp) {
        Some(mut existing) if at - existing.last_seen_at <= dedup_window => {
            existing.merge_hit(at, hit.severity, hit.event_refs, hit.hosts, hit.users, hit.ips);
            existing
        }
        _ => {
            let mut alert = Alert::new(rule_id, hit.rule_name, hit.title, hit.severity, fp, at);
            alert.events = hit.event_refs;
            alert.entities.hosts = hit.hosts;
            alert.entities.users = hit.users;
            alert.entities.ips = hit.ips;
            alert
        }
    };
    save(alert);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn fingerprint_is_stable_for_same_inputs() {
        let rule = Uuid::new_v4();
        assert_eq!(fingerprint(rule, &["baduser"]), fingerprint(rule, &["baduser"]));
        assert_ne!(fingerprint(rule, &["baduser"]), fingerprint(rule, &["otheruser"]));
    }

    #[tokio::test]
    async fn repeat_hit_within_window_merges_into_existing_alert() {
        let store: Arc<Mutex<Option<Alert>>> = Arc::new(Mutex::new(None));
        let t0 = Utc::now();
        let fp = "fp1";

        let s_find = store.clone();
        let s_save = store.clone();
        upsert_alert(
            fp,
            None,
            DedupHit { severity: AlertSeverity::High, event_refs: vec!["e1".into()], hosts: vec![], users: vec!["baduser".into()], ips: vec![], rule_name: "r", title: "t" },
            t0,
            chrono::Duration::hours(1),
            |_| s_find.lock().unwrap().clone(),
            move |a| *s_save.lock().unwrap() = Some(a),
        )
        .await;

        let s_find = store.clone();
        let s_save = store.clone();
        upsert_alert(
            fp,
            None,
            DedupHit { severity: AlertSeverity::Low, event_refs: vec!["e2".into()], hosts: vec![], users: vec!["baduser".into()], ips: vec![], rule_name: "r", title: "t" },
            t0 + chrono::Duration::minutes(10),
            chrono::Duration::hours(1),
            |_| s_find.lock().unwrap().clone(),
            move |a| *s_save.lock().unwrap() = Some(a),
        )
        .await;

        let final_alert = store.lock().unwrap().clone().unwrap();
        assert_eq!(final_alert.hit_count, 2);
        assert_eq!(final_alert.severity, AlertSeverity::High);
        assert_eq!(final_alert.events.len(), 2);
    }
}
