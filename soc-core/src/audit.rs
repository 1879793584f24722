use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use uuid::Uuid;

use crate::adapters::executor::AuditStore;
use crate::models::response::{AuditLog, ResponseActionType};

/// Builds the audit entry for a response-action dispatch with the same
/// structured `details` shape the dispatch lifecycle logs elsewhere, before
/// any adapter call is attempted.
pub fn log_response_action(
    correlation_id: Uuid,
    action_type: ResponseActionType,
    username: &str,
    tenant_id: &str,
    client_id: &str,
    hostname: Option<&str>,
    reason: Option<&str>,
) -> AuditLog {
    AuditLog::new(
        correlation_id,
        username,
        format!("response.{action_type:?}").to_lowercase(),
        client_id,
        tenant_id,
        "dispatched",
        json!({
            "action_type": action_type,
            "hostname": hostname,
            "reason": reason,
        }),
        Utc::now(),
    )
}

/// In-memory `AuditStore` for tests and single-process deployments without
/// a durable backing table.
#[derive(Default)]
pub struct InMemoryAuditStore {
    entries: Mutex<Vec<AuditLog>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        InMemoryAuditStore::default()
    }

    pub fn entries(&self) -> Vec<AuditLog> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn save(&self, log: AuditLog) {
        self.entries.lock().push(log);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_action_audit_names_the_action_lowercase() {
        let log = log_response_action(Uuid::new_v4(), ResponseActionType::Isolate, "analyst", "tenant-1", "CID-1", Some("WORK-01"), Some("malware"));
        assert_eq!(log.action, "response.isolate");
        assert_eq!(log.target, "CID-1");
    }

    #[tokio::test]
    async fn in_memory_store_records_saved_entries() {
        let store = InMemoryAuditStore::new();
        store.save(log_response_action(Uuid::new_v4(), ResponseActionType::BlockIp, "analyst", "tenant-1", "n/a", None, None)).await;
        assert_eq!(store.entries().len(), 1);
    }
}
