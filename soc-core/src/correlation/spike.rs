use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::duration;
use super::{CorrelationHit, EntityTuple, EventHit};
use crate::error::{Result, SocError};
use crate::models::rule::SpikeConfig;

/// Evaluates a `spike` correlation pattern: per entity partition, compares
/// the hit count in the trailing `spike_window` against the count in the
/// `baseline_window` immediately preceding it, raising when the spike count
/// is at least `spike_threshold` times the baseline and the baseline itself
/// clears `min_baseline` (spec §4.3).
pub fn evaluate(sp: &SpikeConfig, hits_by_event: &HashMap<String, Vec<EventHit>>, now: DateTime<Utc>) -> Result<Vec<CorrelationHit>> {
    let baseline_secs = duration::parse_secs(&sp.baseline_window)
        .ok_or_else(|| SocError::validation(format!("invalid baseline_window '{}'", sp.baseline_window)))?;
    let spike_secs = duration::parse_secs(&sp.spike_window)
        .ok_or_else(|| SocError::validation(format!("invalid spike_window '{}'", sp.spike_window)))?;
    let threshold: f64 = sp
        .spike_threshold
        .trim()
        .parse()
        .map_err(|_| SocError::validation(format!("invalid spike_threshold '{}'", sp.spike_threshold)))?;

    let spike_start = now - chrono::Duration::seconds(spike_secs);
    let baseline_start = spike_start - chrono::Duration::seconds(baseline_secs);

    let mut by_entity: HashMap<EntityTuple, (Vec<&str>, Vec<&str>)> = HashMap::new();
    for hits in hits_by_event.values() {
        for hit in hits {
            let entry = by_entity.entry(hit.entity.clone()).or_default();
            if hit.timestamp >= spike_start && hit.timestamp <= now {
                entry.1.push(hit.doc_id.as_str());
            } else if hit.timestamp >= baseline_start && hit.timestamp < spike_start {
                entry.0.push(hit.doc_id.as_str());
            }
        }
    }

    let mut results = Vec::new();
    for (entity, (baseline_docs, spike_docs)) in by_entity {
        let baseline_count = baseline_docs.len() as i64;
        let spike_count = spike_docs.len() as i64;
        if baseline_count < sp.min_baseline {
            continue;
        }
        if (spike_count as f64) >= threshold * (baseline_count as f64) {
            let refs = spike_docs.into_iter().map(str::to_string).collect();
            results.push(CorrelationHit { entity, event_refs: refs });
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn hit(entity: &str, secs_before_now: i64, doc: &str, now: DateTime<Utc>) -> EventHit {
        EventHit { entity: vec![entity.to_string()], timestamp: now - Duration::seconds(secs_before_now), doc_id: doc.to_string() }
    }

    fn config() -> SpikeConfig {
        SpikeConfig {
            field: "user.name".into(),
            baseline_window: "1h".into(),
            spike_window: "5m".into(),
            spike_threshold: "3".into(),
            min_baseline: 2,
        }
    }

    #[test]
    fn spike_raised_when_ratio_exceeds_threshold() {
        let now = Utc::now();
        let mut hits_by_event = HashMap::new();
        let mut hits = vec![hit("u1", 1800, "b1", now), hit("u1", 1200, "b2", now)];
        for i in 0..6 {
            hits.push(hit("u1", 60 + i, &format!("s{i}"), now));
        }
        hits_by_event.insert("login_failed".to_string(), hits);

        let results = evaluate(&config(), &hits_by_event, now).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].event_refs.len(), 6);
    }

    #[test]
    fn no_spike_when_baseline_too_thin() {
        let now = Utc::now();
        let mut hits_by_event = HashMap::new();
        let hits = vec![hit("u1", 1800, "b1", now), hit("u1", 60, "s1", now), hit("u1", 65, "s2", now), hit("u1", 70, "s3", now)];
        hits_by_event.insert("login_failed".to_string(), hits);

        let results = evaluate(&config(), &hits_by_event, now).unwrap();
        assert!(results.is_empty());
    }
}
