use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseActionType {
    Isolate,
    Release,
    KillProcess,
    QuarantineFile,
    CollectEvidence,
    BlockIp,
    DisableUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl ResponseStatus {
    pub fn can_transition(&self, next: ResponseStatus) -> bool {
        use ResponseStatus::*;
        matches!((self, next), (Pending, InProgress) | (InProgress, Completed) | (InProgress, Failed))
    }
}

/// Durable audit record for a response action (spec §3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseAction {
    pub id: Uuid,
    pub correlation_id: Uuid,
    pub tenant_id: String,
    pub user_id: String,
    pub case_id: Option<Uuid>,
    pub action_type: ResponseActionType,
    pub status: ResponseStatus,
    pub client_id: String,
    pub hostname: Option<String>,
    pub target_details: Value,
    pub reason: Option<String>,
    pub job_id: Option<String>,
    pub result: Option<Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ResponseAction {
    pub fn new(
        tenant_id: impl Into<String>,
        user_id: impl Into<String>,
        action_type: ResponseActionType,
        client_id: impl Into<String>,
        target_details: Value,
        at: DateTime<Utc>,
    ) -> Self {
        ResponseAction {
            id: Uuid::new_v4(),
            correlation_id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            case_id: None,
            action_type,
            status: ResponseStatus::Pending,
            client_id: client_id.into(),
            hostname: None,
            target_details,
            reason: None,
            job_id: None,
            result: None,
            error_message: None,
            created_at: at,
            started_at: None,
            completed_at: None,
        }
    }
}

/// Paired with a `ResponseAction` via `correlation_id` (spec §3, §4.6:
/// "Always write an AuditLog entry first, even if dispatch fails").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub correlation_id: Uuid,
    pub actor: String,
    pub action: String,
    pub target: String,
    pub tenant_id: String,
    pub outcome: String,
    pub detail: Value,
    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    pub fn new(
        correlation_id: Uuid,
        actor: impl Into<String>,
        action: impl Into<String>,
        target: impl Into<String>,
        tenant_id: impl Into<String>,
        outcome: impl Into<String>,
        detail: Value,
        at: DateTime<Utc>,
    ) -> Self {
        AuditLog {
            id: Uuid::new_v4(),
            correlation_id,
            actor: actor.into(),
            action: action.into(),
            target: target.into(),
            tenant_id: tenant_id.into(),
            outcome: outcome.into(),
            detail,
            created_at: at,
        }
    }
}
