//! Domain model for scheduled tasks.
//!
//! A task pairs a prompt with a schedule. The scheduler moves due tasks from
//! `pending` to `dispatched`; the worker's post-run step either re-arms them
//! or, for one-shot tasks, retires them as `completed`.

mod error;
mod ids;
mod schedule;
mod task;

pub use error::{ParseTaskStateError, TaskDomainError};
pub use ids::{TaskId, TaskName, TaskPrompt};
pub use schedule::{CronSchedule, TaskSchedule};
pub use task::{NewTask, PersistedTaskData, Task, TaskState};
