//! Job handler port and its error taxonomy.

use crate::agent::domain::TemplateError;
use crate::conversation::{
    domain::{ConversationDomainError, MessageId},
    ports::ConversationRepositoryError,
};
use crate::delivery::services::ReplyError;
use crate::queue::domain::{Job, JobPayload, PayloadError};
use crate::task::services::TaskLifecycleError;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use super::EmbeddingError;

/// Executes one claimed job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Runs the job's side effects.
    async fn handle(&self, job: &Job, payload: JobPayload) -> Result<(), HandlerError>;

    /// Called once a job has used its last attempt.
    async fn exhausted(&self, job: &Job, error: &str) -> Result<(), HandlerError>;
}

/// Errors raised by job handlers.
///
/// Every variant is recorded through the queue's `fail` and consumes an
/// attempt; [`HandlerError::is_retryable`] only drives log severity.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The payload did not match its job type.
    #[error(transparent)]
    Payload(#[from] PayloadError),
    /// The inbound message the job points at does not exist.
    #[error("inbound message not found: {0}")]
    MissingMessage(MessageId),
    /// The handler exceeded its time budget.
    #[error("job timed out after {0:?}")]
    TimedOut(Duration),
    /// The handler panicked.
    #[error("job handler panicked: {0}")]
    Panicked(String),
    /// A synthetic message could not be built.
    #[error(transparent)]
    Domain(#[from] ConversationDomainError),
    /// A task prompt could not be rendered.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// Conversation persistence failed.
    #[error(transparent)]
    Conversation(#[from] ConversationRepositoryError),
    /// Reply generation or delivery failed.
    #[error(transparent)]
    Reply(#[from] ReplyError),
    /// Task bookkeeping failed.
    #[error(transparent)]
    Task(#[from] TaskLifecycleError),
    /// Embedding refresh failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

impl HandlerError {
    /// Returns `true` when a retry may succeed without operator action.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::Payload(_)
                | Self::MissingMessage(_)
                | Self::Domain(_)
                | Self::Template(_)
                | Self::Embedding(EmbeddingError::RowNotFound { .. })
        )
    }
}
