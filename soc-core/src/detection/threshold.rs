use std::collections::HashMap;

use crate::error::Result;
use crate::kql;
use crate::models::DetectionRule;
use crate::search::{SearchHit, SearchRequest, SearchService};

pub struct ThresholdHit {
    pub group_value: Option<String>,
    pub count: usize,
    pub event_refs: Vec<String>,
}

/// Evaluates a threshold rule over `[now - lookback, now]` (spec §4.3).
/// With no `threshold_count`, every hit is its own alert (event-per-alert);
/// with a `threshold_field`, hits are grouped and each group clearing the
/// threshold becomes one alert; otherwise the whole window is one group.
pub async fn evaluate(
    search: &dyn SearchService,
    rule: &DetectionRule,
) -> Result<Vec<ThresholdHit>> {
    let query_dsl = kql::compile(&rule.query);
    let req = SearchRequest {
        indices: rule.indices.clone(),
        query_dsl,
        size: usize::MAX,
        ..Default::default()
    };
    let response = search.search(req).await?;

    match (rule.threshold_count, &rule.threshold_field) {
        (None, _) => Ok(response
            .hits
            .into_iter()
            .map(|hit| ThresholdHit { group_value: None, count: 1, event_refs: vec![hit.doc.id] })
            .collect()),
        (Some(threshold), Some(field)) => {
            let mut groups: HashMap<String, Vec<SearchHit>> = HashMap::new();
            for hit in response.hits {
                let value = hit.doc.get_path(field).and_then(|v| v.as_str()).unwrap_or("").to_string();
                groups.entry(value).or_default().push(hit);
            }
            Ok(groups
                .into_iter()
                .filter(|(_, hits)| hits.len() as i64 >= threshold)
                .map(|(value, hits)| ThresholdHit {
                    group_value: Some(value),
                    count: hits.len(),
                    event_refs: hits.into_iter().map(|h| h.doc.id).collect(),
                })
                .collect())
        }
        (Some(threshold), None) => {
            if response.total as i64 >= threshold {
                Ok(vec![ThresholdHit {
                    group_value: None,
                    count: response.total as usize,
                    event_refs: response.hits.into_iter().map(|h| h.doc.id).collect(),
                }])
            } else {
                Ok(vec![])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RuleStatus, RuleType};
    use crate::search::{BulkAction, InMemorySearchService};
    use uuid::Uuid;

    fn base_rule() -> DetectionRule {
        DetectionRule {
            id: Uuid::new_v4(),
            tenant_id: "t1".into(),
            name: "threshold-rule".into(),
            description: None,
            rule_type: RuleType::Threshold,
            severity: 60,
            query: "*".into(),
            indices: vec!["events".into()],
            schedule_interval_secs: 60,
            lookback_secs: 300,
            threshold_count: Some(5),
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

    fn doc_with_user(id: &str, user: &str) -> crate::models::EcsDocument {
        let mut fields = serde_json::Map::new();
        fields.insert("user".into(), serde_json::json!({"name": user}));
        crate::models::EcsDocument { id: id.into(), fields }
    }

    #[tokio::test]
    async fn grouped_threshold_emits_one_alert_per_exceeding_group() {
        let search = InMemorySearchService::new();
        let mut actions = Vec::new();
        for i in 0..7 {
            actions.push(BulkAction { index: "events".into(), doc: doc_with_user(&format!("e{i}"), "baduser") });
        }
        actions.push(BulkAction { index: "events".into(), doc: doc_with_user("e8", "otheruser") });
        search.bulk(actions).await.unwrap();

        let hits = evaluate(&search, &base_rule()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].group_value.as_deref(), Some("baduser"));
        assert_eq!(hits[0].count, 7);
    }

    #[tokio::test]
    async fn below_threshold_group_emits_nothing() {
        let search = InMemorySearchService::new();
        search.bulk(vec![BulkAction { index: "events".into(), doc: doc_with_user("e1", "baduser") }]).await.unwrap();
        let hits = evaluate(&search, &base_rule()).await.unwrap();
        assert!(hits.is_empty());
    }
}
