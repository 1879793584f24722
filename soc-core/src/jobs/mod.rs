pub mod queue;
pub mod worker;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::Semaphore;
use tracing::warn;
use uuid::Uuid;

use crate::config::JobsConfig;
use crate::error::Result;
use crate::metrics;
use crate::models::job::JobStatus;
use crate::models::{JobPriority, ParsingJob};
use crate::parsers::ParserRegistry;
use crate::search::SearchService;

use queue::JobQueue;

/// Durable store for parsing-job state, implemented by whatever persistence
/// layer the host process wires in (spec §4.4).
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Option<ParsingJob>;
    async fn save(&self, job: ParsingJob);
    async fn find_by_evidence_id(&self, evidence_id: &str) -> Option<ParsingJob>;
}

/// In-memory `JobStore`, useful for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<Uuid, ParsingJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        InMemoryJobStore::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn get(&self, id: Uuid) -> Option<ParsingJob> {
        self.jobs.lock().get(&id).cloned()
    }

    async fn save(&self, job: ParsingJob) {
        self.jobs.lock().insert(job.id, job);
    }

    async fn find_by_evidence_id(&self, evidence_id: &str) -> Option<ParsingJob> {
        self.jobs.lock().values().find(|j| j.evidence_id == evidence_id).cloned()
    }
}

/// Ties the priority queue, job store, parser registry and search backend
/// together (spec §4.4): `submit` enqueues idempotently, `run_workers`
/// drives a bounded pool of worker loops draining the queue.
pub struct JobOrchestrator {
    pub queue: Arc<JobQueue>,
    pub jobs: Arc<dyn JobStore>,
    pub parsers: Arc<ParserRegistry>,
    pub search: Arc<dyn SearchService>,
    pub config: JobsConfig,
}

impl JobOrchestrator {
    pub fn new(jobs: Arc<dyn JobStore>, parsers: Arc<ParserRegistry>, search: Arc<dyn SearchService>, config: JobsConfig) -> Self {
        let queue = Arc::new(JobQueue::new(config.low_priority_starvation_threshold));
        JobOrchestrator { queue, jobs, parsers, search, config }
    }

    /// Enqueues a new job for `evidence_id`, or returns the id of an
    /// already in-flight job for the same evidence (spec §4.4: resubmission
    /// is idempotent, not a duplicate run).
    pub async fn submit(&self, evidence_id: &str, submitted_by: &str, priority: JobPriority, hint: Option<String>) -> Uuid {
        if let Some(existing) = self.jobs.find_by_evidence_id(evidence_id).await {
            if !matches!(existing.status, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled) {
                return existing.id;
            }
        }

        let mut job = ParsingJob::submit(evidence_id, submitted_by, priority, Utc::now());
        job.parser_hint = hint;
        let id = job.id;
        job.transition(JobStatus::Queued, Utc::now()).ok();
        self.jobs.save(job).await;
        self.queue.push(id, priority);
        id
    }

    /// Drains the queue with `worker_pool_size` concurrent workers until
    /// `source_for` returns `None` for every remaining id (used by tests and
    /// by the long-running worker binary, which instead loops forever).
    pub async fn run_workers<F>(&self, source_for: F)
    where
        F: Fn(&str) -> Option<Vec<u8>> + Send + Sync,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.worker_pool_size.max(1)));
        loop {
            let Some((id, _priority)) = self.queue.pop() else {
                break;
            };
            let Some(job) = self.jobs.get(id).await else { continue };
            let Some(source) = source_for(&job.evidence_id) else {
                warn!(job_id = %id, "no evidence bytes available for job, skipping");
                continue;
            };

            let _permit = semaphore.clone().acquire_owned().await;
            if let Err(e) = worker::process_job(id, &source, self.jobs.as_ref(), self.parsers.as_ref(), self.search.as_ref(), &self.config).await {
                warn!(job_id = %id, error = %e, "job processing failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::InMemorySearchService;

    #[tokio::test]
    async fn resubmitting_same_evidence_returns_existing_in_flight_job_id() {
        let jobs: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
        let parsers = Arc::new(ParserRegistry::with_builtins());
        let search: Arc<dyn SearchService> = Arc::new(InMemorySearchService::new());
        let config = JobsConfig { worker_pool_size: 2, index_batch_size: 100, low_priority_starvation_threshold: 10, parser_error_cap: 100 };
        let orchestrator = JobOrchestrator::new(jobs, parsers, search, config);

        let first = orchestrator.submit("ev-dup.csv", "tester", JobPriority::Default, Some("csv".to_string())).await;
        let second = orchestrator.submit("ev-dup.csv", "tester", JobPriority::Default, Some("csv".to_string())).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn worker_pool_processes_queued_csv_job_to_completion() {
        let jobs: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
        let parsers = Arc::new(ParserRegistry::with_builtins());
        let search: Arc<dyn SearchService> = Arc::new(InMemorySearchService::new());
        let config = JobsConfig { worker_pool_size: 2, index_batch_size: 100, low_priority_starvation_threshold: 10, parser_error_cap: 100 };
        let orchestrator = JobOrchestrator::new(jobs.clone(), parsers, search, config);

        let id = orchestrator.submit("ev1.csv", "tester", JobPriority::High, Some("csv".to_string())).await;
        let body = b"timestamp,message\n2024-01-01T00:00:00Z,hello\n".to_vec();
        orchestrator.run_workers(move |evidence_id| if evidence_id == "ev1.csv" { Some(body.clone()) } else { None }).await;

        let saved = jobs.get(id).await.unwrap();
        assert_eq!(saved.status, JobStatus::Completed);
    }
}
