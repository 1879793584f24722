use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, SocError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    High,
    Default,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether `self -> next` is a legal edge in the state machine (spec §4.4).
    pub fn can_transition(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Queued)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Queued, Running)
                | (Queued, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobCounters {
    pub events_parsed: u64,
    pub events_indexed: u64,
    pub events_failed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsingJob {
    pub id: Uuid,
    pub evidence_id: String,
    pub case_id: Option<Uuid>,
    pub parser_type: Option<String>,
    pub parser_hint: Option<String>,
    pub config: Value,
    pub submitted_by: String,
    pub priority: JobPriority,
    pub status: JobStatus,
    pub worker_task_id: Option<String>,
    pub counters: JobCounters,
    pub progress_percent: u8,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ParsingJob {
    pub fn submit(evidence_id: impl Into<String>, submitted_by: impl Into<String>, priority: JobPriority, at: DateTime<Utc>) -> Self {
        ParsingJob {
            id: Uuid::new_v4(),
            evidence_id: evidence_id.into(),
            case_id: None,
            parser_type: None,
            parser_hint: None,
            config: Value::Null,
            submitted_by: submitted_by.into(),
            priority,
            status: JobStatus::Pending,
            worker_task_id: None,
            counters: JobCounters::default(),
            progress_percent: 0,
            error: None,
            created_at: at,
            started_at: None,
            completed_at: None,
        }
    }

    /// Applies a state transition, rejecting any edge the state machine
    /// forbids (spec §8 invariant: monotonic transitions).
    pub fn transition(&mut self, next: JobStatus, at: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition(next) {
            return Err(SocError::validation(format!(
                "illegal job transition {:?} -> {:?}",
                self.status, next
            )));
        }
        if next == JobStatus::Running {
            self.started_at = Some(at);
        }
        if matches!(next, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled) {
            self.completed_at = Some(at);
        }
        self.status = next;
        Ok(())
    }

    /// Progress is clamped to 100 and never regresses (spec §4.4).
    pub fn set_progress(&mut self, percent: u8) {
        let clamped = percent.min(100);
        if clamped > self.progress_percent {
            self.progress_percent = clamped;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_lifecycle_transitions_succeed() {
        let mut job = ParsingJob::submit("ev1", "user", JobPriority::Default, Utc::now());
        assert!(job.transition(JobStatus::Queued, Utc::now()).is_ok());
        assert!(job.transition(JobStatus::Running, Utc::now()).is_ok());
        assert!(job.transition(JobStatus::Completed, Utc::now()).is_ok());
    }

    #[test]
    fn skipping_states_is_rejected() {
        let mut job = ParsingJob::submit("ev1", "user", JobPriority::Default, Utc::now());
        assert!(job.transition(JobStatus::Completed, Utc::now()).is_err());
    }

    #[test]
    fn progress_never_regresses_and_clamps() {
        let mut job = ParsingJob::submit("ev1", "user", JobPriority::Default, Utc::now());
        job.set_progress(50);
        job.set_progress(30);
        assert_eq!(job.progress_percent, 50);
        job.set_progress(255);
        assert_eq!(job.progress_percent, 100);
    }
}
