use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::{BulkAction, BulkResult, IndexStats, ReindexResult, SearchHit, SearchRequest, SearchResponse, SearchService};
use crate::error::Result;
use crate::models::EcsDocument;

/// Reference implementation of `SearchService` backed by an in-process
/// map. Used by tests and as the default when no external search backend
/// is configured; a real index is explicitly out of scope (spec §1).
#[derive(Default)]
pub struct InMemorySearchService {
    indices: DashMap<String, Vec<EcsDocument>>,
}

impl InMemorySearchService {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(doc: &EcsDocument, query: &Value) -> bool {
        match query {
            Value::Object(obj) => {
                if let Some(_) = obj.get("match_all") {
                    return true;
                }
                if let Some(Value::Object(term)) = obj.get("term") {
                    return term.iter().all(|(field, want)| {
                        doc.get_path(field).map(|got| value_eq(got, want)).unwrap_or(false)
                    });
                }
                if let Some(Value::Object(terms)) = obj.get("terms") {
                    return terms.iter().all(|(field, wants)| match wants.as_array() {
                        Some(arr) => doc
                            .get_path(field)
                            .map(|got| arr.iter().any(|w| value_eq(got, w)))
                            .unwrap_or(false),
                        None => false,
                    });
                }
                if let Some(Value::Object(m)) = obj.get("match") {
                    return m.iter().all(|(field, want)| {
                        let want_s = want.as_str().unwrap_or_default().to_lowercase();
                        doc.get_path(field)
                            .and_then(|v| v.as_str())
                            .map(|got| got.to_lowercase().contains(&want_s))
                            .unwrap_or(false)
                    });
                }
                if let Some(Value::Object(p)) = obj.get("prefix") {
                    return p.iter().all(|(field, want)| {
                        let want_s = want.as_str().unwrap_or_default();
                        doc.get_path(field).and_then(|v| v.as_str()).map(|got| got.starts_with(want_s)).unwrap_or(false)
                    });
                }
                if let Some(Value::Object(w)) = obj.get("wildcard") {
                    return w.iter().all(|(field, want)| {
                        let pattern = want.as_str().unwrap_or_default();
                        let suffix = pattern.trim_start_matches('*');
                        doc.get_path(field).and_then(|v| v.as_str()).map(|got| got.ends_with(suffix)).unwrap_or(false)
                    });
                }
                if let Some(Value::Object(r)) = obj.get("range") {
                    return r.iter().all(|(field, bounds)| {
                        let got = doc.get_path(field).and_then(|v| v.as_f64());
                        let got = match got {
                            Some(g) => g,
                            None => return false,
                        };
                        let bounds = match bounds.as_object() {
                            Some(b) => b,
                            None => return false,
                        };
                        bounds.iter().all(|(op, v)| {
                            let v = v.as_f64().unwrap_or(f64::NAN);
                            match op.as_str() {
                                "gte" => got >= v,
                                "gt" => got > v,
                                "lte" => got <= v,
                                "lt" => got < v,
                                _ => true,
                            }
                        })
                    });
                }
                if let Some(Value::Object(b)) = obj.get("bool") {
                    let must_ok = b
                        .get("must")
                        .and_then(|v| v.as_array())
                        .map(|clauses| clauses.iter().all(|c| Self::matches(doc, c)))
                        .unwrap_or(true);
                    let must_not_ok = b
                        .get("must_not")
                        .and_then(|v| v.as_array())
                        .map(|clauses| clauses.iter().all(|c| !Self::matches(doc, c)))
                        .unwrap_or(true);
                    let should = b.get("should").and_then(|v| v.as_array());
                    let should_ok = match should {
                        Some(clauses) if !clauses.is_empty() => {
                            let min = b.get("minimum_should_match").and_then(|v| v.as_u64()).unwrap_or(1) as usize;
                            clauses.iter().filter(|c| Self::matches(doc, c)).count() >= min
                        }
                        _ => true,
                    };
                    return must_ok && must_not_ok && should_ok;
                }
                if let Some(Value::Object(qs)) = obj.get("query_string") {
                    let needle = qs.get("query").and_then(|v| v.as_str()).unwrap_or_default().to_lowercase();
                    return doc
                        .get_path("message")
                        .and_then(|v| v.as_str())
                        .map(|m| m.to_lowercase().contains(&needle))
                        .unwrap_or(false);
                }
                false
            }
            _ => false,
        }
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a.as_str(), b.as_str()) {
        (Some(a), Some(b)) => a == b,
        _ => a.to_string() == b.to_string(),
    }
}

#[async_trait]
impl SearchService for InMemorySearchService {
    async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
        let mut hits = Vec::new();
        for index in &req.indices {
            if let Some(docs) = self.indices.get(index) {
                for doc in docs.iter() {
                    if Self::matches(doc, &req.query_dsl) {
                        hits.push(SearchHit { index: index.clone(), doc: doc.clone() });
                    }
                }
            }
        }
        let total = hits.len() as u64;
        let hits = hits.into_iter().skip(req.from).take(if req.size == 0 { usize::MAX } else { req.size }).collect();
        Ok(SearchResponse { took_ms: 0, total, hits, aggregations: None })
    }

    async fn bulk(&self, actions: Vec<BulkAction>) -> Result<BulkResult> {
        let mut success = 0;
        for action in actions {
            let mut docs = self.indices.entry(action.index).or_default();
            if !docs.iter().any(|d| d.id == action.doc.id) {
                docs.push(action.doc);
            }
            success += 1;
        }
        Ok(BulkResult { success, errors: vec![] })
    }

    async fn count(&self, index: &str, query_dsl: Value) -> Result<u64> {
        let req = SearchRequest { indices: vec![index.to_string()], query_dsl, size: usize::MAX, ..Default::default() };
        Ok(self.search(req).await?.total)
    }

    async fn cat_indices(&self, pattern: &str) -> Result<Vec<IndexStats>> {
        Ok(self
            .indices
            .iter()
            .filter(|e| pattern == "*" || e.key() == pattern)
            .map(|e| IndexStats { index: e.key().clone(), docs_count: e.value().len() as u64, store_size_bytes: 0, health: "green".into() })
            .collect())
    }

    async fn get_mapping(&self, _index: &str) -> Result<Value> {
        Ok(Value::Object(Default::default()))
    }

    async fn create_index(&self, name: &str, _mappings: Value, _settings: Value) -> Result<()> {
        self.indices.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn reindex(&self, src: &str, dest: &str, query_dsl: Option<Value>) -> Result<ReindexResult> {
        let query = query_dsl.unwrap_or_else(|| serde_json::json!({"match_all": {}}));
        let req = SearchRequest { indices: vec![src.to_string()], query_dsl: query, size: usize::MAX, ..Default::default() };
        let hits = self.search(req).await?.hits;
        let total = hits.len() as u64;
        let actions = hits.into_iter().map(|h| BulkAction { index: dest.to_string(), doc: h.doc }).collect::<Vec<_>>();
        let result = self.bulk(actions).await?;
        Ok(ReindexResult { total, created: result.success as u64, updated: 0, failures: result.errors })
    }

    async fn delete_by_query(&self, index: &str, query_dsl: Value) -> Result<u64> {
        let mut removed = 0u64;
        if let Some(mut docs) = self.indices.get_mut(index) {
            let before = docs.len();
            docs.retain(|d| !Self::matches(d, &query_dsl));
            removed = (before - docs.len()) as u64;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, host: &str) -> EcsDocument {
        let mut fields = serde_json::Map::new();
        fields.insert("host".into(), json!({"name": host}));
        EcsDocument { id: id.into(), fields }
    }

    #[tokio::test]
    async fn term_query_matches_nested_field() {
        let svc = InMemorySearchService::new();
        svc.bulk(vec![BulkAction { index: "events".into(), doc: doc("1", "WORK-01") }]).await.unwrap();
        let resp = svc
            .search(SearchRequest {
                indices: vec!["events".into()],
                query_dsl: json!({"term": {"host.name": "WORK-01"}}),
                size: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(resp.total, 1);
    }

    #[tokio::test]
    async fn bulk_is_idempotent_on_repeated_doc_id() {
        let svc = InMemorySearchService::new();
        let d = doc("1", "WORK-01");
        svc.bulk(vec![BulkAction { index: "events".into(), doc: d.clone() }]).await.unwrap();
        svc.bulk(vec![BulkAction { index: "events".into(), doc: d }]).await.unwrap();
        let count = svc.count("events", json!({"match_all": {}})).await.unwrap();
        assert_eq!(count, 1);
    }
}
