use std::sync::Arc;

use chrono::Utc;
use tracing::{error, warn};

use crate::config::JobsConfig;
use crate::error::Result;
use crate::metrics;
use crate::models::job::JobStatus;
use crate::models::ParsingJob;
use crate::normalize;
use crate::parsers::ParserRegistry;
use crate::search::{BulkAction, SearchService};

use super::JobStore;

const EVENTS_INDEX: &str = "events";

/// Runs one queued job end to end: resolve the parser, parse, normalize and
/// bulk-index in batches, and persist counters/status as the job progresses
/// (spec §4.4). Per-record parse failures are tracked by the parser itself;
/// this function only reacts to a hard parse error or indexing failure.
pub async fn process_job(
    job_id: uuid::Uuid,
    source: &[u8],
    jobs: &dyn JobStore,
    parsers: &ParserRegistry,
    search: &dyn SearchService,
    config: &JobsConfig,
) -> Result<()> {
    let mut job = jobs
        .get(job_id)
        .await
        .ok_or_else(|| crate::error::SocError::not_found(format!("job {job_id} not found")))?;

    job.transition(JobStatus::Running, Utc::now())?;
    jobs.save(job.clone()).await;

    let parser = match parsers.resolve(Some(&job.evidence_id), None, Some(&source[..source.len().min(512)]), job.parser_hint.as_deref()) {
        Ok(p) => p,
        Err(e) => {
            job.error = Some(e.to_string());
            job.transition(JobStatus::Failed, Utc::now())?;
            jobs.save(job).await;
            metrics::inc_job_processed("", "failed");
            return Err(e);
        }
    };

    let events = match parser.parse(source, &job.evidence_id) {
        Ok(events) => events,
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "parse failed");
            job.error = Some(e.to_string());
            job.transition(JobStatus::Failed, Utc::now())?;
            let priority = job.priority;
            jobs.save(job).await;
            metrics::inc_job_processed(priority_label(priority), "failed");
            return Err(e);
        }
    };

    job.counters.events_parsed = events.len() as u64;
    let total = events.len().max(1);
    let batch_size = config.index_batch_size.max(1);

    for (chunk_index, chunk) in events.chunks(batch_size).enumerate() {
        let mut actions = Vec::with_capacity(chunk.len());
        for event in chunk {
            let outcome = normalize::normalize(event);
            for warning in outcome.warnings {
                warn!(job_id = %job_id, warning = %warning.0, "normalize warning");
            }
            actions.push(BulkAction { index: EVENTS_INDEX.to_string(), doc: outcome.document });
        }

        match search.bulk(actions).await {
            Ok(result) => {
                job.counters.events_indexed += result.success as u64;
                job.counters.events_failed += result.errors.len() as u64;
                for err in &result.errors {
                    error!(job_id = %job_id, error = %err, "bulk index error");
                }
            }
            Err(e) => {
                job.counters.events_failed += chunk.len() as u64;
                error!(job_id = %job_id, error = %e, "bulk index request failed");
            }
        }

        let indexed_so_far = (chunk_index + 1) * batch_size;
        job.set_progress(((indexed_so_far.min(total) * 100) / total) as u8);
        jobs.save(job.clone()).await;
    }

    job.set_progress(100);
    let next = if job.counters.events_failed > 0 && job.counters.events_indexed == 0 {
        JobStatus::Failed
    } else {
        JobStatus::Completed
    };
    job.transition(next, Utc::now())?;
    jobs.save(job.clone()).await;
    metrics::inc_job_processed(priority_label(job.priority), if next == JobStatus::Completed { "success" } else { "failed" });
    Ok(())
}

fn priority_label(p: crate::models::JobPriority) -> &'static str {
    use crate::models::JobPriority::*;
    match p {
        High => "high",
        Default => "default",
        Low => "low",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobsConfig;
    use crate::models::JobPriority;
    use crate::search::InMemorySearchService;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct MapJobs(Mutex<HashMap<uuid::Uuid, ParsingJob>>);

    #[async_trait::async_trait]
    impl JobStore for MapJobs {
        async fn get(&self, id: uuid::Uuid) -> Option<ParsingJob> {
            self.0.lock().get(&id).cloned()
        }
        async fn save(&self, job: ParsingJob) {
            self.0.lock().insert(job.id, job);
        }
        async fn find_by_evidence_id(&self, evidence_id: &str) -> Option<ParsingJob> {
            self.0.lock().values().find(|j| j.evidence_id == evidence_id).cloned()
        }
    }

    #[tokio::test]
    async fn csv_job_parses_and_indexes_successfully() {
        let mut job = ParsingJob::submit("ev1.csv", "tester", JobPriority::Default, Utc::now());
        job.parser_hint = Some("csv".to_string());
        job.transition(JobStatus::Queued, Utc::now()).unwrap();
        let job_id = job.id;

        let jobs = Arc::new(MapJobs(Mutex::new(HashMap::from([(job_id, job)]))));
        let parsers = ParserRegistry::with_builtins();
        let search = InMemorySearchService::new();
        let config = JobsConfig { worker_pool_size: 1, index_batch_size: 2, low_priority_starvation_threshold: 100, parser_error_cap: 100 };

        let source = b"timestamp,user,action\n2024-01-01T00:00:00Z,alice,login\n2024-01-01T00:00:01Z,bob,login\n".to_vec();
        process_job(job_id, &source, jobs.as_ref(), &parsers, &search, &config).await.unwrap();

        let saved = jobs.get(job_id).await.unwrap();
        assert_eq!(saved.status, JobStatus::Completed);
        assert_eq!(saved.progress_percent, 100);
        assert_eq!(saved.counters.events_parsed, 2);
    }
}
