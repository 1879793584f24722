use async_trait::async_trait;
use serde_json::Value;

use super::{BulkAction, BulkResult, IndexStats, ReindexResult, SearchHit, SearchRequest, SearchResponse, SearchService};
use crate::error::{Result, SocError};
use crate::models::EcsDocument;

/// `SearchService` binding against a generic JSON-over-HTTP search
/// backend, the way the rule scheduler this crate's scheduling loop is
/// modeled on reaches its own datastore over plain `reqwest` calls rather
/// than a dedicated client SDK. The concrete backend (Elasticsearch,
/// ClickHouse, …) is external and out of scope (spec §1); this type only
/// proves out the wire shape described in spec §6.
pub struct HttpSearchService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSearchService {
    pub fn new(base_url: impl Into<String>, pool_size: usize, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(pool_size)
            .timeout(timeout)
            .build()
            .map_err(SocError::Http)?;
        Ok(HttpSearchService { client, base_url: base_url.into() })
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value> {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .map_err(SocError::Http)?;
        if !resp.status().is_success() {
            return Err(SocError::transient(format!("search backend returned {}", resp.status())));
        }
        resp.json::<Value>().await.map_err(SocError::Http)
    }
}

#[async_trait]
impl SearchService for HttpSearchService {
    async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
        let body = serde_json::json!({
            "indices": req.indices,
            "query": req.query_dsl,
            "size": req.size,
            "from": req.from,
            "aggs": req.aggs,
        });
        let value = self.post_json("/_search", body).await?;
        let hits = value
            .get("hits")
            .and_then(|h| h.as_array())
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|h| {
                let index = h.get("_index")?.as_str()?.to_string();
                let doc: EcsDocument = serde_json::from_value(h.get("_source")?.clone()).ok()?;
                Some(SearchHit { index, doc })
            })
            .collect();
        Ok(SearchResponse {
            took_ms: value.get("took").and_then(|v| v.as_u64()).unwrap_or(0),
            total: value.get("total").and_then(|v| v.as_u64()).unwrap_or(0),
            hits,
            aggregations: value.get("aggregations").cloned(),
        })
    }

    async fn bulk(&self, actions: Vec<BulkAction>) -> Result<BulkResult> {
        let body = serde_json::json!(actions
            .iter()
            .map(|a| serde_json::json!({"index": a.index, "doc": a.doc}))
            .collect::<Vec<_>>());
        let value = self.post_json("/_bulk", body).await?;
        Ok(BulkResult {
            success: value.get("success").and_then(|v| v.as_u64()).unwrap_or(0) as usize,
            errors: value
                .get("errors")
                .and_then(|v| v.as_array())
                .map(|a| a.iter().filter_map(|e| e.as_str().map(str::to_string)).collect())
                .unwrap_or_default(),
        })
    }

    async fn count(&self, index: &str, query_dsl: Value) -> Result<u64> {
        let value = self.post_json(&format!("/{index}/_count"), query_dsl).await?;
        Ok(value.get("count").and_then(|v| v.as_u64()).unwrap_or(0))
    }

    async fn cat_indices(&self, pattern: &str) -> Result<Vec<IndexStats>> {
        let value = self.post_json("/_cat/indices", serde_json::json!({"pattern": pattern})).await?;
        Ok(value
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| {
                Some(IndexStats {
                    index: v.get("index")?.as_str()?.to_string(),
                    docs_count: v.get("docs_count").and_then(|x| x.as_u64()).unwrap_or(0),
                    store_size_bytes: v.get("store_size").and_then(|x| x.as_u64()).unwrap_or(0),
                    health: v.get("health").and_then(|x| x.as_str()).unwrap_or("unknown").to_string(),
                })
            })
            .collect())
    }

    async fn get_mapping(&self, index: &str) -> Result<Value> {
        self.post_json(&format!("/{index}/_mapping"), Value::Null).await
    }

    async fn create_index(&self, name: &str, mappings: Value, settings: Value) -> Result<()> {
        self.post_json(&format!("/{name}/_create"), serde_json::json!({"mappings": mappings, "settings": settings})).await?;
        Ok(())
    }

    async fn reindex(&self, src: &str, dest: &str, query_dsl: Option<Value>) -> Result<ReindexResult> {
        let value = self
            .post_json("/_reindex", serde_json::json!({"source": src, "dest": dest, "query": query_dsl}))
            .await?;
        Ok(ReindexResult {
            total: value.get("total").and_then(|v| v.as_u64()).unwrap_or(0),
            created: value.get("created").and_then(|v| v.as_u64()).unwrap_or(0),
            updated: value.get("updated").and_then(|v| v.as_u64()).unwrap_or(0),
            failures: value
                .get("failures")
                .and_then(|v| v.as_array())
                .map(|a| a.iter().filter_map(|e| e.as_str().map(str::to_string)).collect())
                .unwrap_or_default(),
        })
    }

    async fn delete_by_query(&self, index: &str, query_dsl: Value) -> Result<u64> {
        let value = self.post_json(&format!("/{index}/_delete_by_query"), query_dsl).await?;
        Ok(value.get("deleted").and_then(|v| v.as_u64()).unwrap_or(0))
    }
}
