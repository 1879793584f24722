pub mod aggregation;
pub mod arena;
pub mod duration;
pub mod sequence;
pub mod spike;
pub mod temporal_join;

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{Result, SocError};
use crate::kql;
use crate::models::rule::{CorrelationConfig, EventQuery, PatternType};
use crate::search::{SearchRequest, SearchService};

pub type EntityTuple = Vec<String>;

#[derive(Debug, Clone)]
pub struct EventHit {
    pub entity: EntityTuple,
    pub timestamp: DateTime<Utc>,
    pub doc_id: String,
}

#[derive(Debug, Clone)]
pub struct CorrelationHit {
    pub entity: EntityTuple,
    pub event_refs: Vec<String>,
}

/// Runs each named sub-query in `config.events` over `[now - lookback,
/// now]` and groups hits by the entity tuple formed from `join_on` fields
/// (spec §4.3).
async fn fetch_hits_by_event(
    search: &dyn SearchService,
    indices: &[String],
    events: &[EventQuery],
    join_on: &[String],
    lookback_secs: i64,
    now: DateTime<Utc>,
) -> Result<HashMap<String, Vec<EventHit>>> {
    let mut out = HashMap::new();
    for event in events {
        let query_dsl = kql::compile(&event.query);
        let target_indices = if event.indices.is_empty() { indices.to_vec() } else { event.indices.clone() };
        let req = SearchRequest { indices: target_indices, query_dsl, size: usize::MAX, ..Default::default() };
        let response = search.search(req).await?;
        let hits = response
            .hits
            .into_iter()
            .filter(|h| {
                h.doc
                    .get_path("@timestamp")
                    .and_then(|v| v.as_str())
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|t| (now - t.with_timezone(&Utc)).num_seconds() <= lookback_secs)
                    .unwrap_or(true)
            })
            .map(|h| {
                let entity = join_on
                    .iter()
                    .map(|field| h.doc.get_path(field).and_then(|v| v.as_str()).unwrap_or("").to_string())
                    .collect();
                let timestamp = h
                    .doc
                    .get_path("@timestamp")
                    .and_then(|v| v.as_str())
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or(now);
                EventHit { entity, timestamp, doc_id: h.doc.id }
            })
            .collect();
        out.insert(event.id.clone(), hits);
    }
    Ok(out)
}

/// Dispatches to the pattern-specific evaluator named in `config.pattern_type`.
pub async fn evaluate(
    search: &dyn SearchService,
    indices: &[String],
    config: &CorrelationConfig,
    lookback_secs: i64,
    now: DateTime<Utc>,
) -> Result<Vec<CorrelationHit>> {
    let window_secs = duration::parse_secs(&config.window)
        .ok_or_else(|| SocError::validation(format!("invalid correlation window '{}'", config.window)))?;
    let join_on: Vec<String> = config.join_on.iter().map(|j| j.field.clone()).collect();
    let hits_by_event = fetch_hits_by_event(search, indices, &config.events, &join_on, lookback_secs, now).await?;

    match config.pattern_type {
        PatternType::Sequence => {
            let seq = config.sequence.as_ref().ok_or_else(|| SocError::validation("sequence pattern missing sequence config"))?;
            Ok(sequence::evaluate(&seq.order, seq.strict_order, window_secs, &hits_by_event))
        }
        PatternType::TemporalJoin => {
            let tj = config
                .temporal_join
                .as_ref()
                .ok_or_else(|| SocError::validation("temporal_join pattern missing temporal_join config"))?;
            let max_span = duration::parse_secs(&tj.max_span)
                .ok_or_else(|| SocError::validation(format!("invalid max_span '{}'", tj.max_span)))?
                .min(window_secs);
            Ok(temporal_join::evaluate(&tj.require_all, max_span, &hits_by_event))
        }
        PatternType::Aggregation => {
            let agg = config.aggregation.as_ref().ok_or_else(|| SocError::validation("aggregation pattern missing aggregation config"))?;
            Ok(aggregation::evaluate(agg, &hits_by_event))
        }
        PatternType::Spike => {
            let sp = config.spike.as_ref().ok_or_else(|| SocError::validation("spike pattern missing spike config"))?;
            spike::evaluate(sp, &hits_by_event, now)
        }
    }
}
