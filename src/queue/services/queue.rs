//! Job queue API: enqueue with dedupe, lease-based claim, and outcome
//! bookkeeping.

use crate::queue::{
    domain::{
        DedupeKey, FailureOutcome, Job, JobDomainError, JobId, JobPayload, JobStatus, NewJob,
        RetryPolicy, SuccessOutcome, WorkerId,
    },
    ports::{ClaimRequest, InsertOutcome, JobStore, JobStoreError},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

/// Request to place one job on the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueRequest {
    payload: JobPayload,
    dedupe_key: DedupeKey,
    run_at: Option<DateTime<Utc>>,
    max_attempts: Option<u32>,
}

impl EnqueueRequest {
    /// Creates a request that runs as soon as possible with default budget.
    #[must_use]
    pub const fn new(payload: JobPayload, dedupe_key: DedupeKey) -> Self {
        Self {
            payload,
            dedupe_key,
            run_at: None,
            max_attempts: None,
        }
    }

    /// Defers the job until `run_at`.
    #[must_use]
    pub fn with_run_at(mut self, run_at: DateTime<Utc>) -> Self {
        self.run_at = Some(run_at);
        self
    }

    /// Overrides the attempt budget.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Returns the dedupe key.
    #[must_use]
    pub const fn dedupe_key(&self) -> &DedupeKey {
        &self.dedupe_key
    }
}

/// Queue-wide defaults applied by [`JobQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    /// Backoff used when a failure carries no explicit delay.
    pub retry: RetryPolicy,
    /// Attempt budget for requests that do not set one.
    pub default_max_attempts: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            default_max_attempts: crate::queue::domain::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Job and the outcome of the failure just recorded against it.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureReport {
    /// Job after the transition.
    pub job: Job,
    /// Whether it will be retried.
    pub outcome: FailureOutcome,
}

/// Service-level errors for queue operations.
#[derive(Debug, Error)]
pub enum JobQueueError {
    /// Domain validation or transition failed.
    #[error(transparent)]
    Domain(#[from] JobDomainError),
    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] JobStoreError),
}

/// Result type for queue service operations.
pub type JobQueueResult<T> = Result<T, JobQueueError>;

/// Job queue orchestration service.
#[derive(Clone)]
pub struct JobQueue<S, C>
where
    S: JobStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    settings: QueueSettings,
}

impl<S, C> JobQueue<S, C>
where
    S: JobStore,
    C: Clock + Send + Sync,
{
    /// Creates a queue over `store` with default settings.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self::with_settings(store, clock, QueueSettings::default())
    }

    /// Creates a queue with explicit settings.
    #[must_use]
    pub const fn with_settings(store: Arc<S>, clock: Arc<C>, settings: QueueSettings) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    /// Returns the backoff policy.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        self.settings.retry
    }

    /// Enqueues a job, or returns the existing job for its dedupe key.
    ///
    /// # Errors
    ///
    /// Returns [`JobQueueError::Domain`] for an invalid attempt budget and
    /// [`JobQueueError::Store`] when persistence fails.
    pub async fn enqueue(&self, request: EnqueueRequest) -> JobQueueResult<InsertOutcome> {
        let job = Job::new(
            NewJob {
                payload: request.payload,
                dedupe_key: request.dedupe_key,
                run_at: request.run_at,
                max_attempts: Some(
                    request
                        .max_attempts
                        .unwrap_or(self.settings.default_max_attempts),
                ),
            },
            &*self.clock,
        )?;
        let outcome = self.store.insert_if_absent(&job).await?;
        match outcome {
            InsertOutcome::Inserted(job_id) => info!(
                job_id = %job_id,
                job_type = job.job_type(),
                dedupe_key = %job.dedupe_key(),
                run_at = %job.run_at(),
                "job enqueued"
            ),
            InsertOutcome::Existing(job_id) => debug!(
                job_id = %job_id,
                dedupe_key = %job.dedupe_key(),
                "enqueue deduplicated"
            ),
        }
        Ok(outcome)
    }

    /// Claims up to `max_jobs` ready jobs under leases of length `lease`.
    ///
    /// # Errors
    ///
    /// Returns [`JobQueueError::Store`] when the claim round fails.
    pub async fn claim(
        &self,
        worker_id: &WorkerId,
        max_jobs: usize,
        lease: Duration,
    ) -> JobQueueResult<Vec<Job>> {
        if max_jobs == 0 {
            return Ok(Vec::new());
        }
        let request = ClaimRequest {
            worker_id: worker_id.clone(),
            max_jobs,
            now: self.clock.utc(),
            lease,
        };
        let jobs = self.store.claim(&request).await?;
        debug!(worker_id = %worker_id, claimed = jobs.len(), "claim round finished");
        Ok(jobs)
    }

    /// Marks a job succeeded on behalf of the worker holding its lease.
    /// Calling it again after success is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::NotFound`] (wrapped) for unknown jobs,
    /// [`JobDomainError::LeaseLost`] when `worker_id` no longer holds the
    /// lease, and [`JobQueueError::Domain`] when the job is not in a
    /// succeedable state.
    pub async fn succeed(&self, job_id: JobId, worker_id: &WorkerId) -> JobQueueResult<Job> {
        let mut job = self.load(job_id).await?;
        if job.status() != JobStatus::Succeeded {
            job.ensure_held_by(worker_id)?;
        }
        if job.mark_succeeded(&*self.clock)? == SuccessOutcome::Recorded {
            self.store.update_held(&job, worker_id).await?;
            info!(job_id = %job_id, job_type = job.job_type(), worker_id = %worker_id, "job succeeded");
        }
        Ok(job)
    }

    /// Records a failed attempt on behalf of the worker holding the lease.
    ///
    /// `retry_in` overrides the backoff policy for this attempt.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::NotFound`] (wrapped) for unknown jobs,
    /// [`JobDomainError::LeaseLost`] when `worker_id` no longer holds the
    /// lease, and [`JobQueueError::Domain`] when the job is not locked.
    pub async fn fail(
        &self,
        job_id: JobId,
        worker_id: &WorkerId,
        error_message: &str,
        retry_in: Option<Duration>,
    ) -> JobQueueResult<FailureReport> {
        let mut job = self.load(job_id).await?;
        job.ensure_held_by(worker_id)?;
        let delay = retry_in
            .unwrap_or_else(|| self.settings.retry.delay_for(job.attempts().saturating_add(1)));
        let outcome = job.record_failure(error_message, delay, &*self.clock)?;
        self.store.update_held(&job, worker_id).await?;
        match outcome {
            FailureOutcome::Retrying { run_at } => info!(
                job_id = %job_id,
                job_type = job.job_type(),
                attempts = job.attempts(),
                run_at = %run_at,
                error = error_message,
                "job failed, retry scheduled"
            ),
            FailureOutcome::Exhausted => error!(
                job_id = %job_id,
                job_type = job.job_type(),
                attempts = job.attempts(),
                error = error_message,
                "job failed permanently"
            ),
        }
        Ok(FailureReport { job, outcome })
    }

    /// Looks up a job by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`JobQueueError::Store`] when the lookup fails.
    pub async fn find(&self, job_id: JobId) -> JobQueueResult<Option<Job>> {
        Ok(self.store.find_by_id(job_id).await?)
    }

    async fn load(&self, job_id: JobId) -> JobQueueResult<Job> {
        self.store
            .find_by_id(job_id)
            .await?
            .ok_or(JobQueueError::Store(JobStoreError::NotFound(job_id)))
    }
}
