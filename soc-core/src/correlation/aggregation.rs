use std::collections::HashMap;

use super::{CorrelationHit, EntityTuple, EventHit};
use crate::models::rule::AggregationConfig;

/// Evaluates an `aggregation` correlation pattern: groups all hits across
/// `config.group_by`'s entity fields and applies every `having` threshold
/// against each group's per-event-id count (spec §4.3).
pub fn evaluate(agg: &AggregationConfig, hits_by_event: &HashMap<String, Vec<EventHit>>) -> Vec<CorrelationHit> {
    let mut groups: HashMap<EntityTuple, HashMap<&str, Vec<&str>>> = HashMap::new();
    for (event_id, hits) in hits_by_event {
        for hit in hits {
            groups.entry(hit.entity.clone()).or_default().entry(event_id.as_str()).or_default().push(hit.doc_id.as_str());
        }
    }

    let mut results = Vec::new();
    for (entity, by_event) in groups {
        let satisfies = agg.having.iter().all(|t| {
            let Some((op, n)) = t.parsed() else { return false };
            let count = by_event.get(t.event.as_str()).map(|v| v.len()).unwrap_or(0) as i64;
            op.apply(count, n)
        });
        if satisfies {
            let refs = by_event.values().flatten().map(|s| s.to_string()).collect();
            results.push(CorrelationHit { entity, event_refs: refs });
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rule::Threshold;
    use chrono::Utc;

    fn hit(entity: &str, doc: &str) -> EventHit {
        EventHit { entity: vec![entity.to_string()], timestamp: Utc::now(), doc_id: doc.to_string() }
    }

    #[test]
    fn group_satisfying_having_clause_is_emitted() {
        let mut hits_by_event = HashMap::new();
        hits_by_event.insert("file_write".to_string(), vec![hit("h1", "d1"), hit("h1", "d2"), hit("h1", "d3")]);

        let agg = AggregationConfig {
            group_by: vec!["host.name".into()],
            having: vec![Threshold { event: "file_write".into(), count: ">= 3".into() }],
        };
        let results = evaluate(&agg, &hits_by_event);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].event_refs.len(), 3);
    }

    #[test]
    fn group_below_having_clause_is_dropped() {
        let mut hits_by_event = HashMap::new();
        hits_by_event.insert("file_write".to_string(), vec![hit("h1", "d1")]);

        let agg = AggregationConfig {
            group_by: vec!["host.name".into()],
            having: vec![Threshold { event: "file_write".into(), count: ">= 3".into() }],
        };
        let results = evaluate(&agg, &hits_by_event);
        assert!(results.is_empty());
    }
}
