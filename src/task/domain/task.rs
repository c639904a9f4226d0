//! Scheduled task aggregate root and its firing lifecycle.

use super::{ParseTaskStateError, TaskDomainError, TaskId, TaskName, TaskPrompt, TaskSchedule};
use crate::conversation::domain::SessionId;
use chrono::{DateTime, Utc};
use mockable::Clock;

/// Scheduling state of a task.
///
/// Timestamps are metadata of the state they belong to. A task is due when
/// it is [`TaskState::Pending`] with a `next_run_at` that has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Switched off; never fires.
    Disabled,
    /// Armed, waiting for `next_run_at` (or for a manual trigger when unset).
    Pending {
        /// Next firing instant, if any.
        next_run_at: Option<DateTime<Utc>>,
    },
    /// A run has been enqueued and not yet reported back.
    Dispatched {
        /// When the scheduler enqueued the run.
        dispatched_at: DateTime<Utc>,
    },
    /// A one-shot task that has run.
    Completed {
        /// When the run finished.
        completed_at: DateTime<Utc>,
    },
}

impl TaskState {
    /// Returns the canonical storage representation of the state kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Pending { .. } => "pending",
            Self::Dispatched { .. } => "dispatched",
            Self::Completed { .. } => "completed",
        }
    }

    /// Rebuilds a state from its storage name and timestamp columns.
    ///
    /// # Errors
    ///
    /// Returns [`ParseTaskStateError`] for unknown names or when the
    /// timestamp the state requires is missing.
    pub fn from_parts(
        kind: &str,
        next_run_at: Option<DateTime<Utc>>,
        dispatched_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, ParseTaskStateError> {
        let normalized = kind.trim().to_ascii_lowercase();
        match (normalized.as_str(), dispatched_at, completed_at) {
            ("disabled", _, _) => Ok(Self::Disabled),
            ("pending", _, _) => Ok(Self::Pending { next_run_at }),
            ("dispatched", Some(at), _) => Ok(Self::Dispatched { dispatched_at: at }),
            ("completed", _, Some(at)) => Ok(Self::Completed { completed_at: at }),
            _ => Err(ParseTaskStateError(kind.to_owned())),
        }
    }

    /// Returns the pending firing instant.
    #[must_use]
    pub const fn next_run_at(self) -> Option<DateTime<Utc>> {
        match self {
            Self::Pending { next_run_at } => next_run_at,
            Self::Disabled | Self::Dispatched { .. } | Self::Completed { .. } => None,
        }
    }
}

/// Scheduled task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    id: TaskId,
    session_id: SessionId,
    name: TaskName,
    prompt: TaskPrompt,
    schedule: TaskSchedule,
    state: TaskState,
    enabled_at: Option<DateTime<Utc>>,
    last_run_at: Option<DateTime<Utc>>,
    run_count: u32,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for a brand-new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    /// Session the task reports into.
    pub session_id: SessionId,
    /// Display name.
    pub name: TaskName,
    /// Prompt sent on every run.
    pub prompt: TaskPrompt,
    /// Firing rule.
    pub schedule: TaskSchedule,
    /// Whether the task starts armed.
    pub enabled: bool,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Owning session.
    pub session_id: SessionId,
    /// Display name.
    pub name: TaskName,
    /// Prompt.
    pub prompt: TaskPrompt,
    /// Firing rule.
    pub schedule: TaskSchedule,
    /// Scheduling state.
    pub state: TaskState,
    /// When the task was last enabled.
    pub enabled_at: Option<DateTime<Utc>>,
    /// When the task last ran successfully.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Successful run count.
    pub run_count: u32,
    /// Error from the most recent terminally failed run.
    pub last_error: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a task, arming it when `enabled` is set.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::NoUpcomingOccurrence`] when an enabled
    /// recurring schedule never fires.
    pub fn new(new_task: NewTask, clock: &impl Clock) -> Result<Self, TaskDomainError> {
        let timestamp = clock.utc();
        let (state, enabled_at) = if new_task.enabled {
            let next_run_at = new_task.schedule.first_fire(timestamp)?;
            (TaskState::Pending { next_run_at }, Some(timestamp))
        } else {
            (TaskState::Disabled, None)
        };
        Ok(Self {
            id: TaskId::new(),
            session_id: new_task.session_id,
            name: new_task.name,
            prompt: new_task.prompt,
            schedule: new_task.schedule,
            state,
            enabled_at,
            last_run_at: None,
            run_count: 0,
            last_error: None,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            session_id: data.session_id,
            name: data.name,
            prompt: data.prompt,
            schedule: data.schedule,
            state: data.state,
            enabled_at: data.enabled_at,
            last_run_at: data.last_run_at,
            run_count: data.run_count,
            last_error: data.last_error,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the owning session.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns the display name.
    #[must_use]
    pub const fn name(&self) -> &TaskName {
        &self.name
    }

    /// Returns the prompt.
    #[must_use]
    pub const fn prompt(&self) -> &TaskPrompt {
        &self.prompt
    }

    /// Returns the firing rule.
    #[must_use]
    pub const fn schedule(&self) -> &TaskSchedule {
        &self.schedule
    }

    /// Returns the scheduling state.
    #[must_use]
    pub const fn state(&self) -> TaskState {
        self.state
    }

    /// Returns when the task was last enabled.
    #[must_use]
    pub const fn enabled_at(&self) -> Option<DateTime<Utc>> {
        self.enabled_at
    }

    /// Returns the pending firing instant.
    #[must_use]
    pub const fn next_run_at(&self) -> Option<DateTime<Utc>> {
        self.state.next_run_at()
    }

    /// Returns when the task last ran successfully.
    #[must_use]
    pub const fn last_run_at(&self) -> Option<DateTime<Utc>> {
        self.last_run_at
    }

    /// Returns the number of successful runs.
    #[must_use]
    pub const fn run_count(&self) -> u32 {
        self.run_count
    }

    /// Returns the error of the most recent terminally failed run.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last modification timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns `true` when the task is enabled and its firing instant passed.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled_at.is_some() && self.next_run_at().is_some_and(|at| at <= now)
    }

    /// Returns `true` when a queued run of this task should execute.
    #[must_use]
    pub const fn is_runnable(&self) -> bool {
        self.enabled_at.is_some()
            && !matches!(
                self.state,
                TaskState::Disabled | TaskState::Completed { .. }
            )
    }

    /// Renames the task.
    pub fn rename(&mut self, name: TaskName, clock: &impl Clock) {
        self.name = name;
        self.touch(clock);
    }

    /// Replaces the prompt used by future runs.
    pub fn update_prompt(&mut self, prompt: TaskPrompt, clock: &impl Clock) {
        self.prompt = prompt;
        self.touch(clock);
    }

    /// Replaces the schedule and re-arms an enabled task from now.
    ///
    /// A completed one-shot task given a new schedule becomes pending again.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::NoUpcomingOccurrence`] when an enabled
    /// recurring schedule never fires.
    pub fn reschedule(
        &mut self,
        schedule: TaskSchedule,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        let now = clock.utc();
        if self.enabled_at.is_some() {
            let next_run_at = schedule.first_fire(now)?;
            self.state = TaskState::Pending { next_run_at };
        }
        self.schedule = schedule;
        self.updated_at = now;
        Ok(())
    }

    /// Arms a disabled task. Enabling an enabled task is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::AlreadyCompleted`] for a completed one-shot
    /// task, or [`TaskDomainError::NoUpcomingOccurrence`] when the cron
    /// expression never fires.
    pub fn enable(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        match self.state {
            TaskState::Completed { .. } => Err(TaskDomainError::AlreadyCompleted(self.id)),
            TaskState::Disabled => {
                let now = clock.utc();
                let next_run_at = self.schedule.first_fire(now)?;
                self.state = TaskState::Pending { next_run_at };
                self.enabled_at = Some(now);
                self.updated_at = now;
                Ok(())
            }
            TaskState::Pending { .. } | TaskState::Dispatched { .. } => Ok(()),
        }
    }

    /// Disarms the task. Runs already queued are skipped when they start.
    pub fn disable(&mut self, clock: &impl Clock) {
        if matches!(self.state, TaskState::Completed { .. }) {
            return;
        }
        self.state = TaskState::Disabled;
        self.enabled_at = None;
        self.touch(clock);
    }

    /// Records that the scheduler enqueued the run due at `observed`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::NotDue`] when the task is no longer pending
    /// at `observed`, for example because it was rescheduled concurrently.
    pub fn mark_dispatched(
        &mut self,
        observed: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), TaskDomainError> {
        if self.enabled_at.is_none() || self.next_run_at() != Some(observed) {
            return Err(TaskDomainError::NotDue(self.id));
        }
        self.state = TaskState::Dispatched { dispatched_at: now };
        self.updated_at = now;
        Ok(())
    }

    /// Applies post-run bookkeeping after a delivered run.
    ///
    /// Increments `run_count`, clears `last_error`, and then either retires a
    /// one-shot task or recomputes the next recurring occurrence. A pending
    /// one-shot instant still in the future, set by a concurrent reschedule,
    /// is kept.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::NoUpcomingOccurrence`] when the recurring
    /// expression never fires again.
    pub fn record_run_success(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        let now = clock.utc();
        self.last_run_at = Some(now);
        self.run_count = self.run_count.saturating_add(1);
        self.last_error = None;
        self.updated_at = now;
        if self.enabled_at.is_none() {
            return Ok(());
        }
        self.state = match &self.schedule {
            TaskSchedule::Unscheduled => TaskState::Pending { next_run_at: None },
            TaskSchedule::Once { .. } => match self.state {
                TaskState::Pending {
                    next_run_at: Some(at),
                } if at > now => self.state,
                _ => TaskState::Completed { completed_at: now },
            },
            TaskSchedule::Recurring(cron) => TaskState::Pending {
                next_run_at: Some(cron.next_after(now)?),
            },
        };
        Ok(())
    }

    /// Records a run that failed terminally.
    ///
    /// A recurring task is re-armed at its next occurrence so it keeps
    /// firing; a dispatched one-shot task is left pending without an instant.
    pub fn record_run_failure(&mut self, error: impl Into<String>, clock: &impl Clock) {
        let now = clock.utc();
        self.last_error = Some(error.into());
        self.updated_at = now;
        if self.enabled_at.is_none() {
            return;
        }
        match (&self.schedule, self.state) {
            (TaskSchedule::Recurring(cron), TaskState::Dispatched { .. }) => {
                self.state = TaskState::Pending {
                    next_run_at: cron.next_after(now).ok(),
                };
            }
            (_, TaskState::Dispatched { .. }) => {
                self.state = TaskState::Pending { next_run_at: None };
            }
            _ => {}
        }
    }

    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}
