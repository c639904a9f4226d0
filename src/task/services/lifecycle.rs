//! Service layer for task management and post-run bookkeeping.

use crate::conversation::domain::SessionId;
use crate::queue::{
    domain::{DedupeKey, JobId, JobPayload},
    ports::JobStore,
    services::{EnqueueRequest, JobQueue, JobQueueError},
};
use crate::task::{
    domain::{NewTask, Task, TaskDomainError, TaskId, TaskName, TaskPrompt, TaskSchedule},
    ports::{TaskRepository, TaskRepositoryError},
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Unvalidated schedule as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleRequest {
    /// Manual-only task.
    None,
    /// Fire once at an RFC 3339 instant.
    Once {
        /// RFC 3339 timestamp.
        run_at: String,
    },
    /// Fire on a five-field cron expression in an IANA timezone.
    Recurring {
        /// Cron expression.
        cron_expr: String,
        /// IANA timezone name.
        timezone: String,
    },
}

impl ScheduleRequest {
    fn parse(&self) -> Result<TaskSchedule, TaskDomainError> {
        match self {
            Self::None => Ok(TaskSchedule::Unscheduled),
            Self::Once { run_at } => TaskSchedule::once_at(run_at),
            Self::Recurring {
                cron_expr,
                timezone,
            } => TaskSchedule::recurring(cron_expr, timezone),
        }
    }
}

/// Request payload for creating a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTaskRequest {
    session_id: SessionId,
    name: String,
    prompt: String,
    schedule: ScheduleRequest,
    enabled: bool,
}

impl CreateTaskRequest {
    /// Creates an enabled-task request.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        name: impl Into<String>,
        prompt: impl Into<String>,
        schedule: ScheduleRequest,
    ) -> Self {
        Self {
            session_id,
            name: name.into(),
            prompt: prompt.into(),
            schedule,
            enabled: true,
        }
    }

    /// Creates the task switched off.
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Service-level errors for task management.
#[derive(Debug, Error)]
pub enum TaskLifecycleError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
    /// Enqueueing a manual run failed.
    #[error(transparent)]
    Queue(#[from] JobQueueError),
    /// The task does not exist.
    #[error("task not found: {0}")]
    NotFound(TaskId),
    /// The task is disabled or completed and cannot run.
    #[error("task {0} is not runnable")]
    NotRunnable(TaskId),
}

/// Result type for task lifecycle service operations.
pub type TaskLifecycleResult<T> = Result<T, TaskLifecycleError>;

/// Task management orchestration service.
#[derive(Clone)]
pub struct TaskLifecycleService<R, S, C>
where
    R: TaskRepository,
    S: JobStore,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    queue: JobQueue<S, C>,
    clock: Arc<C>,
}

impl<R, S, C> TaskLifecycleService<R, S, C>
where
    R: TaskRepository,
    S: JobStore,
    C: Clock + Send + Sync,
{
    /// Creates a new task lifecycle service.
    #[must_use]
    pub const fn new(repository: Arc<R>, queue: JobQueue<S, C>, clock: Arc<C>) -> Self {
        Self {
            repository,
            queue,
            clock,
        }
    }

    /// Creates a task, validating its name, prompt and schedule.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Domain`] for an invalid timestamp, cron
    /// expression, timezone, name or prompt, and
    /// [`TaskLifecycleError::Repository`] when persistence fails.
    pub async fn create(&self, request: CreateTaskRequest) -> TaskLifecycleResult<Task> {
        let task = Task::new(
            NewTask {
                session_id: request.session_id,
                name: TaskName::new(request.name)?,
                prompt: TaskPrompt::new(request.prompt)?,
                schedule: request.schedule.parse()?,
                enabled: request.enabled,
            },
            &*self.clock,
        )?;
        self.repository.store(&task).await?;
        info!(
            task_id = %task.id(),
            session_id = %task.session_id(),
            schedule = task.schedule().kind(),
            next_run_at = ?task.next_run_at(),
            "task created"
        );
        Ok(task)
    }

    /// Replaces a task's schedule.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] for unknown tasks and
    /// [`TaskLifecycleError::Domain`] for an invalid schedule.
    pub async fn reschedule(
        &self,
        task_id: TaskId,
        schedule: &ScheduleRequest,
    ) -> TaskLifecycleResult<Task> {
        let parsed = schedule.parse()?;
        let mut task = self.load(task_id).await?;
        task.reschedule(parsed, &*self.clock)?;
        self.repository.update(&task).await?;
        Ok(task)
    }

    /// Arms a task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] for unknown tasks and
    /// [`TaskLifecycleError::Domain`] for completed one-shot tasks.
    pub async fn enable(&self, task_id: TaskId) -> TaskLifecycleResult<Task> {
        let mut task = self.load(task_id).await?;
        task.enable(&*self.clock)?;
        self.repository.update(&task).await?;
        Ok(task)
    }

    /// Disarms a task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] for unknown tasks.
    pub async fn disable(&self, task_id: TaskId) -> TaskLifecycleResult<Task> {
        let mut task = self.load(task_id).await?;
        task.disable(&*self.clock);
        self.repository.update(&task).await?;
        Ok(task)
    }

    /// Renames a task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] for unknown tasks and
    /// [`TaskLifecycleError::Domain`] for an invalid name.
    pub async fn rename(&self, task_id: TaskId, name: &str) -> TaskLifecycleResult<Task> {
        let validated = TaskName::new(name)?;
        let mut task = self.load(task_id).await?;
        task.rename(validated, &*self.clock);
        self.repository.update(&task).await?;
        Ok(task)
    }

    /// Replaces a task's prompt.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] for unknown tasks and
    /// [`TaskLifecycleError::Domain`] for a blank prompt.
    pub async fn update_prompt(&self, task_id: TaskId, prompt: &str) -> TaskLifecycleResult<Task> {
        let validated = TaskPrompt::new(prompt)?;
        let mut task = self.load(task_id).await?;
        task.update_prompt(validated, &*self.clock);
        self.repository.update(&task).await?;
        Ok(task)
    }

    /// Deletes a task. Queued runs of it are acknowledged without running.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] for unknown tasks.
    pub async fn delete(&self, task_id: TaskId) -> TaskLifecycleResult<()> {
        if !self.repository.delete(task_id).await? {
            return Err(TaskLifecycleError::NotFound(task_id));
        }
        info!(task_id = %task_id, "task deleted");
        Ok(())
    }

    /// Retrieves a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when the lookup fails.
    pub async fn find_by_id(&self, task_id: TaskId) -> TaskLifecycleResult<Option<Task>> {
        Ok(self.repository.find_by_id(task_id).await?)
    }

    /// Lists a session's tasks, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when the lookup fails.
    pub async fn list_for_session(&self, session_id: SessionId) -> TaskLifecycleResult<Vec<Task>> {
        Ok(self.repository.list_for_session(session_id).await?)
    }

    /// Enqueues an immediate run regardless of the schedule.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::NotFound`] for unknown tasks,
    /// [`TaskLifecycleError::NotRunnable`] for disabled or completed tasks,
    /// and [`TaskLifecycleError::Queue`] when enqueueing fails.
    pub async fn trigger_now(&self, task_id: TaskId) -> TaskLifecycleResult<JobId> {
        let task = self.load(task_id).await?;
        if !task.is_runnable() {
            return Err(TaskLifecycleError::NotRunnable(task_id));
        }
        let now = self.clock.utc();
        let request = EnqueueRequest::new(
            JobPayload::run_task(
                task_id.into_inner(),
                task.prompt().as_str(),
                task.session_id().into_inner(),
            ),
            DedupeKey::for_manual_run(task_id.into_inner(), now.timestamp_millis()),
        );
        let outcome = self.queue.enqueue(request).await?;
        info!(task_id = %task_id, job_id = %outcome.job_id(), "manual task run enqueued");
        Ok(outcome.job_id())
    }

    /// Returns the task when a queued run of it should execute.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when the lookup fails.
    pub async fn find_runnable(&self, task_id: TaskId) -> TaskLifecycleResult<Option<Task>> {
        let task = self.repository.find_by_id(task_id).await?;
        Ok(task.filter(Task::is_runnable))
    }

    /// Applies post-run bookkeeping after a delivered run.
    ///
    /// Returns `None` when the task was deleted while the run was in flight.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError`] when the next occurrence cannot be
    /// computed or persistence fails.
    pub async fn record_run_success(&self, task_id: TaskId) -> TaskLifecycleResult<Option<Task>> {
        let Some(mut task) = self.repository.find_by_id(task_id).await? else {
            warn!(task_id = %task_id, "task deleted before run bookkeeping");
            return Ok(None);
        };
        task.record_run_success(&*self.clock)?;
        self.repository.update(&task).await?;
        info!(
            task_id = %task_id,
            run_count = task.run_count(),
            state = task.state().as_str(),
            next_run_at = ?task.next_run_at(),
            "task run recorded"
        );
        Ok(Some(task))
    }

    /// Records a run that failed terminally.
    ///
    /// # Errors
    ///
    /// Returns [`TaskLifecycleError::Repository`] when persistence fails.
    pub async fn record_run_failure(
        &self,
        task_id: TaskId,
        error: &str,
    ) -> TaskLifecycleResult<Option<Task>> {
        let Some(mut task) = self.repository.find_by_id(task_id).await? else {
            return Ok(None);
        };
        task.record_run_failure(error, &*self.clock);
        self.repository.update(&task).await?;
        warn!(
            task_id = %task_id,
            error,
            next_run_at = ?task.next_run_at(),
            "task run failed permanently"
        );
        Ok(Some(task))
    }

    async fn load(&self, task_id: TaskId) -> TaskLifecycleResult<Task> {
        self.repository
            .find_by_id(task_id)
            .await?
            .ok_or(TaskLifecycleError::NotFound(task_id))
    }
}
