//! Background execution of runs on a bounded worker pool.
//!
//! Callers submit a request, get a job id back immediately, and then poll
//! [`JobManager::status`] or subscribe to status changes. Each job carries its
//! own cancellation token. Finished jobs are pruned once they are older than
//! the configured retention.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{RwLock, Semaphore, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::AutomationBackend;
use crate::error::RunnerError;
use crate::runner::TaskRunner;
use crate::types::{ModelId, RunOutcome, TaskRequest};

pub type JobId = Uuid;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Rejected(#[from] RunnerError),

    #[error("job not found: {0}")]
    NotFound(JobId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Finished { outcome: RunOutcome },
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Finished { .. })
    }

    pub fn outcome(&self) -> Option<&RunOutcome> {
        match self {
            JobStatus::Finished { outcome } => Some(outcome),
            _ => None,
        }
    }
}

/// Snapshot of a job for listing.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub id: JobId,
    pub task: String,
    pub model: ModelId,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub status: JobStatus,
}

struct JobEntry {
    task: String,
    model: ModelId,
    submitted_at: Instant,
    status: Arc<watch::Sender<JobStatus>>,
    cancel: CancellationToken,
    finished_at: Arc<OnceLock<Instant>>,
}

impl JobEntry {
    fn expired(&self, retention: Duration) -> bool {
        self.finished_at
            .get()
            .is_some_and(|at| at.elapsed() >= retention)
    }

    fn view(&self, id: JobId) -> JobView {
        JobView {
            id,
            task: self.task.clone(),
            model: self.model,
            elapsed_ms: self.submitted_at.elapsed().as_millis() as u64,
            status: self.status.borrow().clone(),
        }
    }
}

pub struct JobManager<B: AutomationBackend> {
    runner: TaskRunner<B>,
    permits: Arc<Semaphore>,
    jobs: Arc<RwLock<HashMap<JobId, JobEntry>>>,
    retention: Duration,
}

impl<B: AutomationBackend> Clone for JobManager<B> {
    fn clone(&self) -> Self {
        Self {
            runner: self.runner.clone(),
            permits: Arc::clone(&self.permits),
            jobs: Arc::clone(&self.jobs),
            retention: self.retention,
        }
    }
}

impl<B: AutomationBackend> JobManager<B> {
    /// Runs at most `runner.config().workers` jobs at a time.
    pub fn new(runner: TaskRunner<B>) -> Self {
        let workers = runner.config().workers.max(1);
        let retention = runner.config().job_retention;
        Self {
            runner,
            permits: Arc::new(Semaphore::new(workers)),
            jobs: Arc::new(RwLock::new(HashMap::new())),
            retention,
        }
    }

    /// Queues a run. Invalid requests are rejected here and never queued.
    pub async fn submit(&self, request: TaskRequest) -> Result<JobId, JobError> {
        request.validate()?;

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (tx, _rx) = watch::channel(JobStatus::Queued);
        let status = Arc::new(tx);
        let finished_at = Arc::new(OnceLock::new());

        {
            let mut jobs = self.jobs.write().await;
            prune(&mut jobs, self.retention);
            jobs.insert(
                id,
                JobEntry {
                    task: request.task().to_string(),
                    model: request.model(),
                    submitted_at: Instant::now(),
                    status: Arc::clone(&status),
                    cancel: cancel.clone(),
                    finished_at: Arc::clone(&finished_at),
                },
            );
        }
        info!(job_id = %id, model = %request.model(), "Job queued");

        let work = tokio::spawn(run_job(
            id,
            self.runner.clone(),
            Arc::clone(&self.permits),
            request,
            cancel,
            Arc::clone(&status),
        ));
        // Publishes the outcome even when the job task panics.
        tokio::spawn(async move {
            let outcome = match work.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(job_id = %id, error = %e, "Job task failed");
                    RunOutcome::failed(&RunnerError::SessionRun(anyhow!("job task panicked: {e}")))
                }
            };
            let _ = finished_at.set(Instant::now());
            info!(job_id = %id, success = outcome.success, "Job finished");
            status.send_replace(JobStatus::Finished { outcome });
        });

        Ok(id)
    }

    pub async fn status(&self, id: JobId) -> Option<JobStatus> {
        let jobs = self.jobs.read().await;
        jobs.get(&id).map(|job| job.status.borrow().clone())
    }

    pub async fn view(&self, id: JobId) -> Option<JobView> {
        let jobs = self.jobs.read().await;
        jobs.get(&id).map(|job| job.view(id))
    }

    /// Receiver that sees every status change of the job.
    pub async fn subscribe(&self, id: JobId) -> Option<watch::Receiver<JobStatus>> {
        let jobs = self.jobs.read().await;
        jobs.get(&id).map(|job| job.status.subscribe())
    }

    /// Requests cancellation. A no-op for jobs that already finished.
    pub async fn cancel(&self, id: JobId) -> Result<(), JobError> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(&id).ok_or(JobError::NotFound(id))?;
        if !job.status.borrow().is_finished() {
            info!(job_id = %id, "Cancelling job");
            job.cancel.cancel();
        }
        Ok(())
    }

    /// Waits until the job finishes and returns its outcome.
    pub async fn wait(&self, id: JobId) -> Result<RunOutcome, JobError> {
        let mut rx = self.subscribe(id).await.ok_or(JobError::NotFound(id))?;
        let status = rx
            .wait_for(JobStatus::is_finished)
            .await
            .map_err(|_| JobError::NotFound(id))?;
        status.outcome().cloned().ok_or(JobError::NotFound(id))
    }

    /// All retained jobs, oldest first. Prunes expired ones.
    pub async fn list(&self) -> Vec<JobView> {
        let mut jobs = self.jobs.write().await;
        prune(&mut jobs, self.retention);
        let mut views: Vec<JobView> = jobs.iter().map(|(id, job)| job.view(*id)).collect();
        views.sort_by(|a, b| b.elapsed_ms.cmp(&a.elapsed_ms));
        views
    }
}

async fn run_job<B: AutomationBackend>(
    id: JobId,
    runner: TaskRunner<B>,
    permits: Arc<Semaphore>,
    request: TaskRequest,
    cancel: CancellationToken,
    status: Arc<watch::Sender<JobStatus>>,
) -> RunOutcome {
    let permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            info!(job_id = %id, "Job cancelled while queued");
            return RunOutcome::failed(&RunnerError::Cancelled);
        }
        permit = permits.acquire_owned() => permit,
    };
    let Ok(_permit) = permit else {
        warn!(job_id = %id, "Worker pool closed");
        return RunOutcome::failed(&RunnerError::SessionRun(anyhow!("worker pool closed")));
    };

    status.send_replace(JobStatus::Running);
    info!(job_id = %id, "Job started");
    match runner.execute_with_cancel(request, cancel).await {
        Ok(outcome) => outcome,
        Err(e) => RunOutcome::failed(&e),
    }
}

fn prune(jobs: &mut HashMap<JobId, JobEntry>, retention: Duration) {
    let before = jobs.len();
    jobs.retain(|_, job| !job.expired(retention));
    let pruned = before - jobs.len();
    if pruned > 0 {
        debug!(pruned, "Pruned finished jobs");
    }
}
