pub mod edr;
pub mod executor;
pub mod soar;
pub mod storage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Connection config shared by every adapter (spec §6). Credentials are
/// accepted here but never echoed back by `get_config` — only a
/// "configured" boolean.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub verify_ssl: bool,
    pub timeout_s: u64,
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterStatus {
    Connected,
    Disconnected,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterHealth {
    pub status: AdapterStatus,
    pub version: Option<String>,
    pub message: Option<String>,
    pub details: Option<Value>,
}

/// Common surface every integration exposes regardless of role (spec §4.6).
#[async_trait]
pub trait Adapter: Send + Sync {
    fn name(&self) -> &str;
    async fn connect(&self) -> bool;
    async fn disconnect(&self);
    async fn health_check(&self) -> AdapterHealth;

    /// Sanitized configuration: booleans for whether a credential is set,
    /// never the credential itself.
    fn get_config(&self) -> Value;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionJob {
    pub job_id: String,
    pub status: String,
    pub client_id: String,
    pub artifact: Option<String>,
}

/// A managed endpoint as reported by the collection adapter's inventory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub client_id: String,
    pub hostname: String,
    pub os: String,
    pub os_version: String,
    pub ip_addresses: Vec<String>,
    pub online: bool,
    pub last_seen: Option<DateTime<Utc>>,
    pub labels: HashMap<String, String>,
}

/// A collectable artifact the adapter knows how to run (e.g. an RTR script).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub name: String,
    pub description: String,
    pub category: String,
}

/// An IOC-based hunt. Most EDR backends expose hunting through a separate
/// IOC-management surface rather than the RTR/containment APIs the other
/// `CollectionAdapter` methods hit; adapters without that surface wired up
/// may legitimately return empty lists / locally-constructed `Hunt` values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hunt {
    pub hunt_id: String,
    pub name: String,
    pub artifact_name: String,
    pub state: String,
    pub description: Option<String>,
}

/// EDR-like collection and containment capability (spec §4.6 Collection role).
#[async_trait]
pub trait CollectionAdapter: Adapter {
    async fn isolate_host(&self, client_id: &str) -> crate::error::Result<()>;
    async fn unisolate_host(&self, client_id: &str) -> crate::error::Result<()>;
    async fn kill_process(&self, client_id: &str, pid: u32) -> crate::error::Result<()>;
    async fn quarantine_file(&self, client_id: &str, file_path: &str) -> crate::error::Result<()>;
    async fn collect_artifact(&self, client_id: &str, artifact: &str, urgent: bool) -> crate::error::Result<CollectionJob>;

    /// Polls the status of a job previously returned by `collect_artifact`.
    async fn get_collection_status(&self, job_id: &str) -> crate::error::Result<CollectionJob>;
    async fn get_collection_results(&self, job_id: &str, limit: u32) -> crate::error::Result<Vec<Value>>;

    async fn list_endpoints(&self, limit: u32, offset: u32, search: Option<&str>, online_only: bool) -> crate::error::Result<Vec<EndpointInfo>>;
    async fn get_endpoint(&self, client_id: &str) -> crate::error::Result<Option<EndpointInfo>>;
    async fn search_endpoints(&self, query: &str) -> crate::error::Result<Vec<EndpointInfo>>;
    async fn list_artifacts(&self, category: Option<&str>) -> crate::error::Result<Vec<ArtifactInfo>>;

    async fn list_hunts(&self, limit: u32, state: Option<&str>) -> crate::error::Result<Vec<Hunt>>;
    async fn create_hunt(&self, name: &str, artifact_name: &str, description: Option<&str>) -> crate::error::Result<Hunt>;
    async fn start_hunt(&self, hunt_id: &str) -> crate::error::Result<Hunt>;
    async fn stop_hunt(&self, hunt_id: &str) -> crate::error::Result<Hunt>;
    async fn get_hunt_results(&self, hunt_id: &str, limit: u32) -> crate::error::Result<Vec<Value>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResult {
    pub key: String,
    pub size: u64,
    pub sha256: String,
}

/// Content-addressed object storage capability (spec §4.6 Storage role).
#[async_trait]
pub trait StorageAdapter: Adapter {
    async fn upload_bytes(&self, key: &str, data: &[u8]) -> crate::error::Result<UploadResult>;
    async fn download_bytes(&self, key: &str) -> crate::error::Result<Vec<u8>>;
    async fn exists(&self, key: &str) -> crate::error::Result<bool>;
    async fn delete(&self, key: &str) -> crate::error::Result<bool>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub workflow_id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub triggers: Vec<String>,
    pub is_active: bool,
    pub parameters: Vec<Value>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub execution_id: String,
    pub workflow_id: String,
    pub workflow_name: String,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub triggered_by: Option<String>,
    pub parameters: Value,
    pub results: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub approval_id: String,
    pub execution_id: String,
    pub workflow_name: String,
    pub action: String,
    pub description: String,
    pub requested_at: DateTime<Utc>,
    pub parameters: Value,
}

/// SOAR workflow-automation capability (spec §4.6 SOAR role). The response
/// executor dispatches here when a response action type has no direct EDR
/// containment call, falling back to a durable workflow trigger with a
/// human-in-the-loop approval surface instead of failing outright.
#[async_trait]
pub trait SoarAdapter: Adapter {
    async fn list_workflows(&self, category: Option<&str>, active_only: bool) -> crate::error::Result<Vec<Workflow>>;
    async fn get_workflow(&self, workflow_id: &str) -> crate::error::Result<Option<Workflow>>;
    async fn trigger_workflow(&self, workflow_id: &str, parameters: Value, triggered_by: Option<&str>) -> crate::error::Result<WorkflowExecution>;
    async fn get_execution_status(&self, execution_id: &str) -> crate::error::Result<WorkflowExecution>;
    async fn cancel_execution(&self, execution_id: &str) -> crate::error::Result<bool>;

    async fn list_pending_approvals(&self) -> crate::error::Result<Vec<ApprovalRequest>>;
    async fn approve_request(&self, approval_id: &str, approved_by: &str, comment: Option<&str>) -> crate::error::Result<bool>;
    async fn deny_request(&self, approval_id: &str, denied_by: &str, reason: Option<&str>) -> crate::error::Result<bool>;
}
