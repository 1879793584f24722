use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
    RateLimited,
    InvalidRecipient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub status: DeliveryStatus,
    pub message_id: Option<String>,
    pub retry_after_secs: Option<u64>,
}

/// An outbound alert/notification transport (spec §4.7). `retry_after_secs`
/// on a rate-limited result is advisory only — re-queueing is the caller's
/// responsibility, not the channel's.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, message: &str, recipient: &str) -> DeliveryResult;
    fn validate_config(&self) -> bool;
    fn validate_recipient(&self, recipient: &str) -> bool;
    async fn health_check(&self) -> bool;
}

/// In-memory sink used by tests and single-process deployments without a
/// configured real transport (Slack/Teams/email stay out of scope).
#[derive(Default)]
pub struct LogNotificationChannel {
    sent: Mutex<Vec<(String, String)>>,
}

impl LogNotificationChannel {
    pub fn new() -> Self {
        LogNotificationChannel::default()
    }

    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl NotificationChannel for LogNotificationChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, message: &str, recipient: &str) -> DeliveryResult {
        if !self.validate_recipient(recipient) {
            return DeliveryResult { status: DeliveryStatus::InvalidRecipient, message_id: None, retry_after_secs: None };
        }
        info!(recipient, message, "notification sent");
        self.sent.lock().push((recipient.to_string(), message.to_string()));
        DeliveryResult { status: DeliveryStatus::Sent, message_id: Some(uuid::Uuid::new_v4().to_string()), retry_after_secs: None }
    }

    fn validate_config(&self) -> bool {
        true
    }

    fn validate_recipient(&self, recipient: &str) -> bool {
        !recipient.trim().is_empty()
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sending_to_blank_recipient_is_invalid() {
        let channel = LogNotificationChannel::new();
        let result = channel.send("hello", "  ").await;
        assert_eq!(result.status, DeliveryStatus::InvalidRecipient);
    }

    #[tokio::test]
    async fn sent_message_is_recorded() {
        let channel = LogNotificationChannel::new();
        let result = channel.send("new alert: brute force", "soc-team").await;
        assert_eq!(result.status, DeliveryStatus::Sent);
        assert_eq!(channel.sent_messages(), vec![("soc-team".to_string(), "new alert: brute force".to_string())]);
    }
}
