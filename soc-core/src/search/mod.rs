mod http;
mod memory;

pub use http::HttpSearchService;
pub use memory::InMemorySearchService;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::EcsDocument;

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub indices: Vec<String>,
    pub query_dsl: Value,
    pub size: usize,
    pub from: usize,
    pub sort: Vec<(String, bool)>,
    pub aggs: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub index: String,
    pub doc: EcsDocument,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
    pub took_ms: u64,
    pub total: u64,
    pub hits: Vec<SearchHit>,
    pub aggregations: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct BulkAction {
    pub index: String,
    pub doc: EcsDocument,
}

#[derive(Debug, Clone, Default)]
pub struct BulkResult {
    pub success: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IndexStats {
    pub index: String,
    pub docs_count: u64,
    pub store_size_bytes: u64,
    pub health: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReindexResult {
    pub total: u64,
    pub created: u64,
    pub updated: u64,
    pub failures: Vec<String>,
}

/// External search façade the core consumes but does not implement (spec
/// §6, Non-goals: "does not implement its own event-search index"). A real
/// Elasticsearch/ClickHouse binding is out of scope; `InMemorySearchService`
/// exists to exercise detection/correlation/job-indexing logic in tests,
/// and `HttpSearchService` proves the wire shape against any JSON-over-HTTP
/// backend reachable the way the scheduler the core's HTTP conventions
/// were learned from reaches its own datastore.
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(&self, req: SearchRequest) -> Result<SearchResponse>;
    async fn bulk(&self, actions: Vec<BulkAction>) -> Result<BulkResult>;
    async fn count(&self, index: &str, query_dsl: Value) -> Result<u64>;
    async fn cat_indices(&self, pattern: &str) -> Result<Vec<IndexStats>>;
    async fn get_mapping(&self, index: &str) -> Result<Value>;
    async fn create_index(&self, name: &str, mappings: Value, settings: Value) -> Result<()>;
    async fn reindex(&self, src: &str, dest: &str, query_dsl: Option<Value>) -> Result<ReindexResult>;
    async fn delete_by_query(&self, index: &str, query_dsl: Value) -> Result<u64>;
}
