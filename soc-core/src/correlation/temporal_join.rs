use std::collections::HashMap;

use super::{CorrelationHit, EntityTuple, EventHit};

/// Evaluates a `temporal_join` correlation pattern: for each entity
/// partition, every id in `require_all` must appear within a span of at
/// most `max_span_secs` regardless of order (spec §4.3).
pub fn evaluate(
    require_all: &[String],
    max_span_secs: i64,
    hits_by_event: &HashMap<String, Vec<EventHit>>,
) -> Vec<CorrelationHit> {
    let mut by_entity: HashMap<EntityTuple, Vec<(&str, i64, &str)>> = HashMap::new();
    for event_id in require_all {
        let Some(hits) = hits_by_event.get(event_id) else { continue };
        for hit in hits {
            by_entity
                .entry(hit.entity.clone())
                .or_default()
                .push((event_id.as_str(), hit.timestamp.timestamp(), hit.doc_id.as_str()));
        }
    }

    let mut results = Vec::new();
    for (entity, mut timeline) in by_entity {
        timeline.sort_by_key(|(_, ts, _)| *ts);
        let present: std::collections::HashSet<&str> = timeline.iter().map(|(id, _, _)| *id).collect();
        if !require_all.iter().all(|id| present.contains(id.as_str())) {
            continue;
        }
        let span = timeline.last().unwrap().1 - timeline.first().unwrap().1;
        if span <= max_span_secs {
            let refs = timeline.iter().map(|(_, _, doc)| doc.to_string()).collect();
            results.push(CorrelationHit { entity, event_refs: refs });
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn hit(entity: &str, secs_offset: i64, doc: &str) -> EventHit {
        EventHit { entity: vec![entity.to_string()], timestamp: Utc::now() + Duration::seconds(secs_offset), doc_id: doc.to_string() }
    }

    #[test]
    fn emits_one_hit_when_all_ids_fall_within_span() {
        let mut hits_by_event = HashMap::new();
        hits_by_event.insert("process_spawn".to_string(), vec![hit("h1", 0, "d1")]);
        hits_by_event.insert("network_conn".to_string(), vec![hit("h1", 20, "d2")]);

        let results = evaluate(&["process_spawn".to_string(), "network_conn".to_string()], 60, &hits_by_event);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn no_hit_when_missing_required_id() {
        let mut hits_by_event = HashMap::new();
        hits_by_event.insert("process_spawn".to_string(), vec![hit("h1", 0, "d1")]);

        let results = evaluate(&["process_spawn".to_string(), "network_conn".to_string()], 60, &hits_by_event);
        assert!(results.is_empty());
    }

    #[test]
    fn no_hit_when_span_exceeds_max() {
        let mut hits_by_event = HashMap::new();
        hits_by_event.insert("process_spawn".to_string(), vec![hit("h1", 0, "d1")]);
        hits_by_event.insert("network_conn".to_string(), vec![hit("h1", 120, "d2")]);

        let results = evaluate(&["process_spawn".to_string(), "network_conn".to_string()], 60, &hits_by_event);
        assert!(results.is_empty());
    }
}
