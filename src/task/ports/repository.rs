//! Repository port for scheduled task persistence and due-task scanning.

use crate::conversation::domain::SessionId;
use crate::task::domain::{Task, TaskId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for task repository operations.
pub type TaskRepositoryResult<T> = Result<T, TaskRepositoryError>;

/// Task persistence contract.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Stores a new task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::DuplicateTask`] when the task ID already
    /// exists.
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()>;

    /// Persists changes to an existing task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not exist.
    async fn update(&self, task: &Task) -> TaskRepositoryResult<()>;

    /// Finds a task by identifier.
    ///
    /// Returns `None` when the task does not exist.
    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>>;

    /// Returns up to `limit` enabled pending tasks with `next_run_at <= now`,
    /// oldest due first.
    async fn find_due(&self, now: DateTime<Utc>, limit: usize) -> TaskRepositoryResult<Vec<Task>>;

    /// Clears `next_run_at` and marks the task dispatched, but only if it is
    /// still pending at `observed_next_run_at`.
    ///
    /// Returns `false` when the task changed since it was observed.
    async fn mark_dispatched(
        &self,
        id: TaskId,
        observed_next_run_at: DateTime<Utc>,
        dispatched_at: DateTime<Utc>,
    ) -> TaskRepositoryResult<bool>;

    /// Returns every task owned by a session, oldest first.
    async fn list_for_session(&self, session_id: SessionId) -> TaskRepositoryResult<Vec<Task>>;

    /// Deletes a task. Returns `false` when it did not exist.
    async fn delete(&self, id: TaskId) -> TaskRepositoryResult<bool>;
}

/// Errors returned by task repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskRepositoryError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
