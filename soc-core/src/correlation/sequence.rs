use std::collections::{HashMap, HashSet};

use super::{CorrelationHit, EntityTuple, EventHit};

/// Evaluates a `sequence` correlation pattern (spec §4.3).
///
/// `strict_order=true` requires `order`'s event ids to appear as an
/// order-preserving subsequence in the partition's timeline (gaps from
/// repeated or unrelated hits of the same ids are allowed). The first
/// valid chain wins on ties.
///
/// `strict_order=false`'s semantics are not pinned down by the source
/// material (spec §9 Open Questions); this implementation resolves it as
/// "any permutation": all ids in `order` must appear for the partition
/// within `window_secs`, irrespective of relative ordering.
pub fn evaluate(
    order: &[String],
    strict_order: bool,
    window_secs: i64,
    hits_by_event: &HashMap<String, Vec<EventHit>>,
) -> Vec<CorrelationHit> {
    let mut by_entity: HashMap<EntityTuple, Vec<(&str, i64, &str)>> = HashMap::new();
    for event_id in order {
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

        if strict_order {
            if let Some(refs) = match_strict_chain(order, window_secs, &timeline) {
                results.push(CorrelationHit { entity, event_refs: refs });
            }
        } else {
            let present: HashSet<&str> = timeline.iter().map(|(id, _, _)| *id).collect();
            if order.iter().all(|id| present.contains(id.as_str())) {
                let span = timeline.last().unwrap().1 - timeline.first().unwrap().1;
                if span <= window_secs {
                    let refs = timeline.iter().map(|(_, _, doc)| doc.to_string()).collect();
                    results.push(CorrelationHit { entity, event_refs: refs });
                }
            }
        }
    }
    results
}

fn match_strict_chain(order: &[String], window_secs: i64, timeline: &[(&str, i64, &str)]) -> Option<Vec<String>> {
    let mut step = 0;
    let mut refs = Vec::new();
    let mut start_ts = None;

    for &(event_id, ts, doc_id) in timeline {
        if step >= order.len() {
            break;
        }
        if event_id == order[step] {
            if start_ts.is_none() {
                start_ts = Some(ts);
            }
            refs.push(doc_id.to_string());
            step += 1;
        }
    }

    if step == order.len() {
        let span = timeline.iter().map(|(_, ts, _)| *ts).max().unwrap_or(0) - start_ts.unwrap_or(0);
        if span <= window_secs {
            return Some(refs);
        }
    }
    None
}
