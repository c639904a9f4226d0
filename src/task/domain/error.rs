//! Error types for scheduled task validation and transitions.

use super::TaskId;
use thiserror::Error;

/// Errors returned while constructing or transitioning tasks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The task name is empty after trimming, or too long.
    #[error("invalid task name '{0}'")]
    InvalidName(String),

    /// The task prompt is empty after trimming.
    #[error("task prompt must not be empty")]
    EmptyPrompt,

    /// A one-shot timestamp is not valid RFC 3339.
    #[error("invalid timestamp '{value}': {reason}")]
    InvalidTimestamp {
        /// Rejected input.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// A cron expression could not be parsed.
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression {
        /// Rejected expression.
        expression: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// The timezone is not a known IANA zone.
    #[error("unknown timezone '{0}'")]
    InvalidTimezone(String),

    /// A recurring expression never fires after the given instant.
    #[error("cron expression '{0}' has no upcoming occurrence")]
    NoUpcomingOccurrence(String),

    /// The one-shot task has already run.
    #[error("task {0} is completed")]
    AlreadyCompleted(TaskId),

    /// The task is not in the state the caller observed.
    #[error("task {0} is not due for dispatch")]
    NotDue(TaskId),
}

/// Error returned while parsing task states from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task state: {0}")]
pub struct ParseTaskStateError(pub String);
