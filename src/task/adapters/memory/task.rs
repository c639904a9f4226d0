//! In-memory repository for scheduled task tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::conversation::domain::SessionId;
use crate::task::{
    domain::{Task, TaskId},
    ports::{TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};

/// Thread-safe in-memory task repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    state: Arc<RwLock<HashMap<TaskId, Task>>>,
}

impl InMemoryTaskRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(err: impl std::fmt::Display) -> TaskRepositoryError {
    TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let mut tasks = self.state.write().map_err(poisoned)?;
        if tasks.contains_key(&task.id()) {
            return Err(TaskRepositoryError::DuplicateTask(task.id()));
        }
        tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn update(&self, task: &Task) -> TaskRepositoryResult<()> {
        let mut tasks = self.state.write().map_err(poisoned)?;
        let slot = tasks
            .get_mut(&task.id())
            .ok_or(TaskRepositoryError::NotFound(task.id()))?;
        *slot = task.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        let tasks = self.state.read().map_err(poisoned)?;
        Ok(tasks.get(&id).cloned())
    }

    async fn find_due(&self, now: DateTime<Utc>, limit: usize) -> TaskRepositoryResult<Vec<Task>> {
        let tasks = self.state.read().map_err(poisoned)?;
        let mut due: Vec<Task> = tasks
            .values()
            .filter(|task| task.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|task| (task.next_run_at(), task.created_at()));
        due.truncate(limit);
        Ok(due)
    }

    async fn mark_dispatched(
        &self,
        id: TaskId,
        observed_next_run_at: DateTime<Utc>,
        dispatched_at: DateTime<Utc>,
    ) -> TaskRepositoryResult<bool> {
        let mut tasks = self.state.write().map_err(poisoned)?;
        let Some(task) = tasks.get_mut(&id) else {
            return Ok(false);
        };
        Ok(task
            .mark_dispatched(observed_next_run_at, dispatched_at)
            .is_ok())
    }

    async fn list_for_session(&self, session_id: SessionId) -> TaskRepositoryResult<Vec<Task>> {
        let tasks = self.state.read().map_err(poisoned)?;
        let mut owned: Vec<Task> = tasks
            .values()
            .filter(|task| task.session_id() == session_id)
            .cloned()
            .collect();
        owned.sort_by_key(|task| (task.created_at(), task.id()));
        Ok(owned)
    }

    async fn delete(&self, id: TaskId) -> TaskRepositoryResult<bool> {
        let mut tasks = self.state.write().map_err(poisoned)?;
        Ok(tasks.remove(&id).is_some())
    }
}
