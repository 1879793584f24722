use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::audit::log_response_action;
use crate::error::{Result, SocError};
use crate::models::response::{AuditLog, ResponseAction, ResponseActionType, ResponseStatus};

use super::{CollectionAdapter, SoarAdapter};

/// Maps a response action without a direct EDR containment call onto the
/// SOAR workflow that automates it (spec §4.6 SOAR workflow fallback).
fn soar_workflow_for(action_type: ResponseActionType) -> &'static str {
    match action_type {
        ResponseActionType::BlockIp => "block_ip",
        ResponseActionType::DisableUser => "disable_user",
        ResponseActionType::Isolate => "host_isolation",
        ResponseActionType::CollectEvidence => "collect_evidence",
        _ => "generic_response",
    }
}

struct ActionSchema {
    required_params: &'static [&'static str],
}

static ACTIONS: Lazy<HashMap<ResponseActionType, ActionSchema>> = Lazy::new(|| {
    use ResponseActionType::*;
    HashMap::from([
        (Isolate, ActionSchema { required_params: &["client_id"] }),
        (Release, ActionSchema { required_params: &["client_id"] }),
        (KillProcess, ActionSchema { required_params: &["client_id", "pid"] }),
        (QuarantineFile, ActionSchema { required_params: &["client_id", "file_path"] }),
        (CollectEvidence, ActionSchema { required_params: &["client_id", "artifact"] }),
        (BlockIp, ActionSchema { required_params: &["ip"] }),
        (DisableUser, ActionSchema { required_params: &["username"] }),
    ])
});

fn validate_params(action_type: ResponseActionType, params: &Value) -> Result<()> {
    let schema = ACTIONS.get(&action_type).expect("every ResponseActionType has a schema entry");
    for field in schema.required_params {
        if params.get(field).is_none() {
            return Err(SocError::validation(format!("missing required parameter '{field}' for action {action_type:?}")));
        }
    }
    Ok(())
}

/// Durable store for response actions, written audit-log-first (spec §4.6).
#[async_trait]
pub trait ResponseActionStore: Send + Sync {
    async fn save(&self, action: ResponseAction);
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn save(&self, log: AuditLog);
}

/// Dispatches a `ResponseAction` to the first capable adapter, falling back
/// to a "manual action required" result when none is configured (spec
/// §4.6). Writes the audit entry before attempting dispatch so a crash
/// mid-call never leaves an unaudited action.
pub struct ResponseExecutor {
    collection: Option<Arc<dyn CollectionAdapter>>,
    soar: Option<Arc<dyn SoarAdapter>>,
    actions: Arc<dyn ResponseActionStore>,
    audit: Arc<dyn AuditStore>,
}

impl ResponseExecutor {
    pub fn new(collection: Option<Arc<dyn CollectionAdapter>>, actions: Arc<dyn ResponseActionStore>, audit: Arc<dyn AuditStore>) -> Self {
        ResponseExecutor { collection, soar: None, actions, audit }
    }

    pub fn with_soar(mut self, soar: Arc<dyn SoarAdapter>) -> Self {
        self.soar = Some(soar);
        self
    }

    pub async fn execute(&self, mut action: ResponseAction) -> ResponseAction {
        let audit_entry = log_response_action(
            action.correlation_id,
            action.action_type,
            &action.user_id,
            &action.tenant_id,
            &action.client_id,
            action.hostname.as_deref(),
            action.reason.as_deref(),
        );
        self.audit.save(audit_entry).await;

        if let Err(e) = validate_params(action.action_type, &action.target_details) {
            action.error_message = Some(e.to_string());
            action.status = ResponseStatus::Failed;
            action.completed_at = Some(Utc::now());
            self.actions.save(action.clone()).await;
            return action;
        }

        action.status = ResponseStatus::InProgress;
        action.started_at = Some(Utc::now());
        self.actions.save(action.clone()).await;

        let dispatch_result = self.dispatch(&action).await;
        match dispatch_result {
            Ok(result) => {
                action.status = ResponseStatus::Completed;
                action.result = Some(result);
            }
            Err(e) => {
                action.status = ResponseStatus::Failed;
                action.error_message = Some(e.to_string());
            }
        }
        action.completed_at = Some(Utc::now());
        self.actions.save(action.clone()).await;
        action
    }

    async fn dispatch(&self, action: &ResponseAction) -> Result<Value> {
        let params = &action.target_details;
        if let Some(collection) = &self.collection {
            match action.action_type {
                ResponseActionType::Isolate => {
                    collection.isolate_host(&action.client_id).await?;
                    return Ok(json!({"status": "isolated"}));
                }
                ResponseActionType::Release => {
                    collection.unisolate_host(&action.client_id).await?;
                    return Ok(json!({"status": "released"}));
                }
                ResponseActionType::KillProcess => {
                    let pid = params.get("pid").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
                    collection.kill_process(&action.client_id, pid).await?;
                    return Ok(json!({"status": "killed", "pid": pid}));
                }
                ResponseActionType::QuarantineFile => {
                    let path = params.get("file_path").and_then(|v| v.as_str()).unwrap_or_default();
                    collection.quarantine_file(&action.client_id, path).await?;
                    return Ok(json!({"status": "quarantined", "file_path": path}));
                }
                ResponseActionType::CollectEvidence => {
                    let artifact = params.get("artifact").and_then(|v| v.as_str()).unwrap_or_default();
                    let job = collection.collect_artifact(&action.client_id, artifact, true).await?;
                    return Ok(json!({"status": "collection_queued", "job_id": job.job_id}));
                }
                ResponseActionType::BlockIp | ResponseActionType::DisableUser => {}
            }
        }

        // No EDR adapter configured, or the action type has no direct containment
        // call (BlockIp/DisableUser): fall back to a SOAR workflow trigger.
        if let Some(soar) = &self.soar {
            let workflow_id = soar_workflow_for(action.action_type);
            let execution = soar.trigger_workflow(workflow_id, params.clone(), Some(&action.user_id)).await?;
            return Ok(json!({"status": "workflow_triggered", "execution_id": execution.execution_id, "workflow_id": workflow_id}));
        }

        Ok(json!({"status": "manual_action_required"}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{Adapter, AdapterHealth, AdapterStatus, ArtifactInfo, CollectionJob, EndpointInfo, Hunt, Workflow};
    use crate::models::response::AuditLog;
    use parking_lot::Mutex;

    struct StubCollection;

    #[async_trait]
    impl Adapter for StubCollection {
        fn name(&self) -> &str {
            "stub"
        }
        async fn connect(&self) -> bool {
            true
        }
        async fn disconnect(&self) {}
        async fn health_check(&self) -> AdapterHealth {
            AdapterHealth { status: AdapterStatus::Connected, version: None, message: None, details: None }
        }
        fn get_config(&self) -> Value {
            json!({})
        }
    }

    #[async_trait]
    impl CollectionAdapter for StubCollection {
        async fn isolate_host(&self, _client_id: &str) -> Result<()> {
            Ok(())
        }
        async fn unisolate_host(&self, _client_id: &str) -> Result<()> {
            Ok(())
        }
        async fn kill_process(&self, _client_id: &str, _pid: u32) -> Result<()> {
            Ok(())
        }
        async fn quarantine_file(&self, _client_id: &str, _file_path: &str) -> Result<()> {
            Ok(())
        }
        async fn collect_artifact(&self, client_id: &str, artifact: &str, _urgent: bool) -> Result<CollectionJob> {
            Ok(CollectionJob { job_id: "job-1".to_string(), status: "queued".to_string(), client_id: client_id.to_string(), artifact: Some(artifact.to_string()) })
        }
        async fn get_collection_status(&self, job_id: &str) -> Result<CollectionJob> {
            Ok(CollectionJob { job_id: job_id.to_string(), status: "completed".to_string(), client_id: String::new(), artifact: None })
        }
        async fn get_collection_results(&self, _job_id: &str, _limit: u32) -> Result<Vec<Value>> {
            Ok(Vec::new())
        }
        async fn list_endpoints(&self, _limit: u32, _offset: u32, _search: Option<&str>, _online_only: bool) -> Result<Vec<EndpointInfo>> {
            Ok(Vec::new())
        }
        async fn get_endpoint(&self, _client_id: &str) -> Result<Option<EndpointInfo>> {
            Ok(None)
        }
        async fn search_endpoints(&self, _query: &str) -> Result<Vec<EndpointInfo>> {
            Ok(Vec::new())
        }
        async fn list_artifacts(&self, _category: Option<&str>) -> Result<Vec<ArtifactInfo>> {
            Ok(Vec::new())
        }
        async fn list_hunts(&self, _limit: u32, _state: Option<&str>) -> Result<Vec<Hunt>> {
            Ok(Vec::new())
        }
        async fn create_hunt(&self, name: &str, artifact_name: &str, description: Option<&str>) -> Result<Hunt> {
            Ok(Hunt { hunt_id: "hunt-1".to_string(), name: name.to_string(), artifact_name: artifact_name.to_string(), state: "created".to_string(), description: description.map(str::to_string) })
        }
        async fn start_hunt(&self, hunt_id: &str) -> Result<Hunt> {
            Ok(Hunt { hunt_id: hunt_id.to_string(), name: String::new(), artifact_name: String::new(), state: "running".to_string(), description: None })
        }
        async fn stop_hunt(&self, hunt_id: &str) -> Result<Hunt> {
            Ok(Hunt { hunt_id: hunt_id.to_string(), name: String::new(), artifact_name: String::new(), state: "stopped".to_string(), description: None })
        }
        async fn get_hunt_results(&self, _hunt_id: &str, _limit: u32) -> Result<Vec<Value>> {
            Ok(Vec::new())
        }
    }

    struct StubSoar;

    #[async_trait]
    impl Adapter for StubSoar {
        fn name(&self) -> &str {
            "stub-soar"
        }
        async fn connect(&self) -> bool {
            true
        }
        async fn disconnect(&self) {}
        async fn health_check(&self) -> AdapterHealth {
            AdapterHealth { status: AdapterStatus::Connected, version: None, message: None, details: None }
        }
        fn get_config(&self) -> Value {
            json!({})
        }
    }

    #[async_trait]
    impl super::SoarAdapter for StubSoar {
        async fn list_workflows(&self, _category: Option<&str>, _active_only: bool) -> Result<Vec<Workflow>> {
            Ok(Vec::new())
        }
        async fn get_workflow(&self, workflow_id: &str) -> Result<Option<Workflow>> {
            Ok(Some(Workflow {
                workflow_id: workflow_id.to_string(),
                name: "Block IP".to_string(),
                description: None,
                category: None,
                triggers: vec![],
                is_active: true,
                parameters: vec![],
                created_at: None,
                updated_at: None,
            }))
        }
        async fn trigger_workflow(&self, workflow_id: &str, parameters: Value, triggered_by: Option<&str>) -> Result<crate::adapters::WorkflowExecution> {
            Ok(crate::adapters::WorkflowExecution {
                execution_id: "exec-stub".to_string(),
                workflow_id: workflow_id.to_string(),
                workflow_name: "Block IP".to_string(),
                status: "pending".to_string(),
                started_at: Some(Utc::now()),
                completed_at: None,
                triggered_by: triggered_by.map(str::to_string),
                parameters,
                results: None,
                error: None,
            })
        }
        async fn get_execution_status(&self, _execution_id: &str) -> Result<crate::adapters::WorkflowExecution> {
            unimplemented!("not exercised by these tests")
        }
        async fn cancel_execution(&self, _execution_id: &str) -> Result<bool> {
            Ok(true)
        }
        async fn list_pending_approvals(&self) -> Result<Vec<crate::adapters::ApprovalRequest>> {
            Ok(Vec::new())
        }
        async fn approve_request(&self, _approval_id: &str, _approved_by: &str, _comment: Option<&str>) -> Result<bool> {
            Ok(true)
        }
        async fn deny_request(&self, _approval_id: &str, _denied_by: &str, _reason: Option<&str>) -> Result<bool> {
            Ok(true)
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        audits: Mutex<Vec<AuditLog>>,
        actions: Mutex<Vec<ResponseAction>>,
    }

    #[async_trait]
    impl AuditStore for RecordingStore {
        async fn save(&self, log: AuditLog) {
            self.audits.lock().push(log);
        }
    }

    #[async_trait]
    impl ResponseActionStore for RecordingStore {
        async fn save(&self, action: ResponseAction) {
            self.actions.lock().push(action);
        }
    }

    #[tokio::test]
    async fn isolate_action_completes_via_collection_adapter() {
        let store = Arc::new(RecordingStore::default());
        let executor = ResponseExecutor::new(Some(Arc::new(StubCollection)), store.clone(), store.clone());

        let action = ResponseAction::new("tenant-1", "analyst", ResponseActionType::Isolate, "CID-1", json!({"client_id": "CID-1"}), Utc::now());
        let result = executor.execute(action).await;

        assert_eq!(result.status, ResponseStatus::Completed);
        let audits = store.audits.lock();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].action, "response.isolate");
        assert_eq!(store.actions.lock().len(), 2);
    }

    #[tokio::test]
    async fn missing_required_parameter_fails_before_dispatch() {
        let store = Arc::new(RecordingStore::default());
        let executor = ResponseExecutor::new(Some(Arc::new(StubCollection)), store.clone(), store.clone());

        let action = ResponseAction::new("tenant-1", "analyst", ResponseActionType::KillProcess, "CID-1", json!({"client_id": "CID-1"}), Utc::now());
        let result = executor.execute(action).await;

        assert_eq!(result.status, ResponseStatus::Failed);
        assert!(result.error_message.unwrap().contains("pid"));
    }

    #[tokio::test]
    async fn no_adapter_configured_returns_manual_action_required() {
        let store = Arc::new(RecordingStore::default());
        let executor = ResponseExecutor::new(None, store.clone(), store.clone());

        let action = ResponseAction::new("tenant-1", "analyst", ResponseActionType::BlockIp, "n/a", json!({"ip": "1.2.3.4"}), Utc::now());
        let result = executor.execute(action).await;

        assert_eq!(result.status, ResponseStatus::Completed);
        assert_eq!(result.result.unwrap()["status"], "manual_action_required");
    }

    #[tokio::test]
    async fn block_ip_falls_back_to_soar_workflow_when_configured() {
        let store = Arc::new(RecordingStore::default());
        let executor = ResponseExecutor::new(None, store.clone(), store.clone()).with_soar(Arc::new(StubSoar));

        let action = ResponseAction::new("tenant-1", "analyst", ResponseActionType::BlockIp, "n/a", json!({"ip": "1.2.3.4"}), Utc::now());
        let result = executor.execute(action).await;

        assert_eq!(result.status, ResponseStatus::Completed);
        let result_value = result.result.unwrap();
        assert_eq!(result_value["status"], "workflow_triggered");
        assert_eq!(result_value["execution_id"], "exec-stub");
    }
}
