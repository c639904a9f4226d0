//! Due-task scheduler tick.

use crate::queue::{
    domain::{DedupeKey, JobId, JobPayload},
    ports::JobStore,
    services::{EnqueueRequest, JobQueue},
};
use crate::task::{
    domain::{Task, TaskId},
    ports::{TaskRepository, TaskRepositoryError},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default maximum number of tasks dispatched per tick.
pub const DEFAULT_BATCH_LIMIT: usize = 100;

/// A task run enqueued by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchedRun {
    /// Fired task.
    pub task_id: TaskId,
    /// Job carrying the run.
    pub job_id: JobId,
    /// Firing instant the run was bucketed under.
    pub due_at: DateTime<Utc>,
}

/// A due task the tick could not dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickFailure {
    /// Task that failed to dispatch.
    pub task_id: TaskId,
    /// Failure description.
    pub error: String,
}

/// Outcome of one scheduler tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Runs enqueued and whose tasks were marked dispatched.
    pub enqueued: Vec<DispatchedRun>,
    /// Tasks edited between scan and dispatch; their job may still exist.
    pub skipped: Vec<TaskId>,
    /// Tasks whose dispatch failed; they remain due for the next tick.
    pub failures: Vec<TickFailure>,
}

impl TickReport {
    /// Number of runs enqueued.
    #[must_use]
    pub fn enqueued_count(&self) -> usize {
        self.enqueued.len()
    }

    /// Number of dispatch failures.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }
}

/// Errors that abort a whole tick.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scanning for due tasks failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
}

/// Converts due tasks into queued `run_task` jobs.
#[derive(Clone)]
pub struct TaskScheduler<R, S, C>
where
    R: TaskRepository,
    S: JobStore,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    queue: JobQueue<S, C>,
    clock: Arc<C>,
    batch_limit: usize,
}

impl<R, S, C> TaskScheduler<R, S, C>
where
    R: TaskRepository,
    S: JobStore,
    C: Clock + Send + Sync,
{
    /// Creates a scheduler with the default batch limit.
    #[must_use]
    pub const fn new(repository: Arc<R>, queue: JobQueue<S, C>, clock: Arc<C>) -> Self {
        Self {
            repository,
            queue,
            clock,
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }

    /// Overrides the number of tasks handled per tick.
    #[must_use]
    pub const fn with_batch_limit(mut self, batch_limit: usize) -> Self {
        self.batch_limit = batch_limit;
        self
    }

    /// Enqueues one run per due task and clears each task's `next_run_at`.
    ///
    /// The job's dedupe key is bucketed by the due instant, so a tick retried
    /// after a partial failure lands on the same job. Per-task failures are
    /// reported, not propagated.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Repository`] when the due-task scan fails.
    pub async fn tick(&self) -> Result<TickReport, SchedulerError> {
        let now = self.clock.utc();
        let due = self.repository.find_due(now, self.batch_limit).await?;
        let mut report = TickReport::default();

        for task in due {
            let Some(due_at) = task.next_run_at() else {
                continue;
            };
            match self.dispatch(&task, due_at, now).await {
                Ok(Some(job_id)) => report.enqueued.push(DispatchedRun {
                    task_id: task.id(),
                    job_id,
                    due_at,
                }),
                Ok(None) => report.skipped.push(task.id()),
                Err(error) => {
                    warn!(task_id = %task.id(), error = %error, "task dispatch failed");
                    report.failures.push(TickFailure {
                        task_id: task.id(),
                        error,
                    });
                }
            }
        }

        if !report.enqueued.is_empty() || !report.failures.is_empty() {
            info!(
                enqueued = report.enqueued_count(),
                skipped = report.skipped.len(),
                failed = report.failed_count(),
                "scheduler tick finished"
            );
        }
        Ok(report)
    }

    async fn dispatch(
        &self,
        task: &Task,
        due_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<JobId>, String> {
        let task_id = task.id();
        let request = EnqueueRequest::new(
            JobPayload::run_task(
                task_id.into_inner(),
                task.prompt().as_str(),
                task.session_id().into_inner(),
            ),
            DedupeKey::for_scheduled_run(task_id.into_inner(), due_at.timestamp()),
        );
        let outcome = self
            .queue
            .enqueue(request)
            .await
            .map_err(|err| err.to_string())?;
        if !outcome.is_new() {
            debug!(task_id = %task_id, job_id = %outcome.job_id(), "run already enqueued");
        }

        let cleared = self
            .repository
            .mark_dispatched(task_id, due_at, now)
            .await
            .map_err(|err| err.to_string())?;
        if !cleared {
            warn!(task_id = %task_id, "task changed during dispatch; left as edited");
            return Ok(None);
        }
        info!(
            task_id = %task_id,
            job_id = %outcome.job_id(),
            due_at = %due_at,
            "task dispatched"
        );
        Ok(Some(outcome.job_id()))
    }
}
