//! The worker invocation loop.

use crate::queue::{
    domain::{FailureOutcome, Job, JobId, WorkerId},
    ports::JobStore,
    services::{JobQueue, JobQueueError},
};
use crate::worker::ports::{HandlerError, JobHandler};
use futures_util::FutureExt;
use mockable::Clock;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Default number of jobs claimed per invocation.
pub const DEFAULT_BATCH_SIZE: usize = 3;
/// Default per-job handler budget.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(240);
/// Default claim lease; longer than the job budget so a live worker always
/// reports before its lease lapses.
pub const DEFAULT_LEASE: Duration = Duration::from_secs(300);

/// Worker tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Jobs claimed per invocation.
    pub batch_size: usize,
    /// Claim lease.
    pub lease: Duration,
    /// Per-job handler budget.
    pub job_timeout: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            lease: DEFAULT_LEASE,
            job_timeout: DEFAULT_JOB_TIMEOUT,
        }
    }
}

/// Outcome of one job within an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    /// Job processed.
    pub job_id: JobId,
    /// `true` when the handler succeeded and the success was recorded.
    pub ok: bool,
    /// Handler or bookkeeping error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result document of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerRun {
    /// Identity used for the claim.
    #[serde(skip)]
    pub worker_id: WorkerId,
    /// One report per claimed job, in claim order.
    pub results: Vec<JobReport>,
}

/// Errors that abort an invocation before any job runs.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The claim failed.
    #[error(transparent)]
    Claim(#[from] JobQueueError),
}

/// Claims and dispatches jobs.
pub struct Worker<S, C>
where
    S: JobStore,
    C: Clock + Send + Sync,
{
    queue: JobQueue<S, C>,
    handler: Arc<dyn JobHandler>,
    settings: WorkerSettings,
}

impl<S, C> Worker<S, C>
where
    S: JobStore,
    C: Clock + Send + Sync,
{
    /// Creates a worker with default settings.
    #[must_use]
    pub fn new(queue: JobQueue<S, C>, handler: Arc<dyn JobHandler>) -> Self {
        Self {
            queue,
            handler,
            settings: WorkerSettings::default(),
        }
    }

    /// Replaces the worker settings.
    #[must_use]
    pub const fn with_settings(mut self, settings: WorkerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Runs one invocation: claim a batch under a fresh identity and
    /// dispatch each job in claim order.
    ///
    /// Handler failures are recorded against their jobs and never abort
    /// the batch.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Claim`] when the claim itself fails.
    pub async fn run_once(&self) -> Result<WorkerRun, WorkerError> {
        let worker_id = WorkerId::generate();
        let jobs = self
            .queue
            .claim(&worker_id, self.settings.batch_size, self.settings.lease)
            .await?;
        let mut results = Vec::with_capacity(jobs.len());
        for job in jobs {
            results.push(self.process(&worker_id, &job).await);
        }
        if !results.is_empty() {
            info!(
                worker_id = %worker_id,
                claimed = results.len(),
                succeeded = results.iter().filter(|report| report.ok).count(),
                "worker invocation finished"
            );
        }
        Ok(WorkerRun { worker_id, results })
    }

    async fn process(&self, worker_id: &WorkerId, job: &Job) -> JobReport {
        match self.execute(job).await {
            Ok(()) => match self.queue.succeed(job.id(), worker_id).await {
                Ok(_) => JobReport {
                    job_id: job.id(),
                    ok: true,
                    error: None,
                },
                Err(err) => {
                    error!(worker_id = %worker_id, job_id = %job.id(), error = %err, "failed to record job success");
                    JobReport {
                        job_id: job.id(),
                        ok: false,
                        error: Some(format!("failed to record success: {err}")),
                    }
                }
            },
            Err(handler_error) => self.record_failure(worker_id, job, &handler_error).await,
        }
    }

    async fn execute(&self, job: &Job) -> Result<(), HandlerError> {
        let payload = job.decode_payload()?;
        let guarded = AssertUnwindSafe(self.handler.handle(job, payload)).catch_unwind();
        match tokio::time::timeout(self.settings.job_timeout, guarded).await {
            Err(_) => Err(HandlerError::TimedOut(self.settings.job_timeout)),
            Ok(Err(panic)) => Err(HandlerError::Panicked(panic_message(panic.as_ref()))),
            Ok(Ok(result)) => result,
        }
    }

    async fn record_failure(
        &self,
        worker_id: &WorkerId,
        job: &Job,
        handler_error: &HandlerError,
    ) -> JobReport {
        let message = handler_error.to_string();
        if handler_error.is_retryable() {
            warn!(worker_id = %worker_id, job_id = %job.id(), job_type = job.job_type(), error = %message, "job failed");
        } else {
            error!(worker_id = %worker_id, job_id = %job.id(), job_type = job.job_type(), error = %message, "job failed permanently");
        }
        match self.queue.fail(job.id(), worker_id, &message, None).await {
            Ok(report) => {
                if report.outcome == FailureOutcome::Exhausted {
                    if let Err(err) = self.handler.exhausted(&report.job, &message).await {
                        warn!(job_id = %job.id(), error = %err, "exhaustion hook failed");
                    }
                }
                JobReport {
                    job_id: job.id(),
                    ok: false,
                    error: Some(message),
                }
            }
            Err(err) => {
                error!(worker_id = %worker_id, job_id = %job.id(), error = %err, "failed to record job failure");
                JobReport {
                    job_id: job.id(),
                    ok: false,
                    error: Some(format!("{message}; failed to record failure: {err}")),
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|text| (*text).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}
