//! Repository port for sessions and message logs.

use crate::conversation::domain::{Message, MessageId, Session, SessionId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for conversation repository operations.
pub type ConversationRepositoryResult<T> = Result<T, ConversationRepositoryError>;

/// Session and message persistence contract.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Returns the session for `(channel, channel_chat_id)`, storing
    /// `candidate` when none exists yet.
    async fn upsert_session(&self, candidate: &Session) -> ConversationRepositoryResult<Session>;

    /// Finds a session by identifier.
    async fn find_session(&self, id: SessionId) -> ConversationRepositoryResult<Option<Session>>;

    /// Appends a message to its session's log.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationRepositoryError::DuplicateChannelUpdate`] when
    /// the session already holds a row with the same `channel_update_id`.
    async fn insert_message(&self, message: &Message) -> ConversationRepositoryResult<()>;

    /// Persists changes to an existing message.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationRepositoryError::MessageNotFound`] when the row
    /// does not exist.
    async fn update_message(&self, message: &Message) -> ConversationRepositoryResult<()>;

    /// Finds a message by identifier.
    async fn find_message(&self, id: MessageId) -> ConversationRepositoryResult<Option<Message>>;

    /// Finds the row a session received under `channel_update_id`.
    async fn find_by_channel_update(
        &self,
        session_id: SessionId,
        channel_update_id: &str,
    ) -> ConversationRepositoryResult<Option<Message>>;

    /// Finds the assistant text reply linked to `inbound_id`.
    async fn find_reply_to(
        &self,
        inbound_id: MessageId,
    ) -> ConversationRepositoryResult<Option<Message>>;

    /// Returns the latest `limit` history rows of a session, oldest first.
    ///
    /// History excludes tool-call rows and unfinished reply placeholders.
    async fn recent_history(
        &self,
        session_id: SessionId,
        limit: usize,
    ) -> ConversationRepositoryResult<Vec<Message>>;
}

/// Errors returned by conversation repository implementations.
#[derive(Debug, Clone, Error)]
pub enum ConversationRepositoryError {
    /// The session already holds a row for this channel update.
    #[error("session {session_id} already received update {channel_update_id}")]
    DuplicateChannelUpdate {
        /// Session holding the row.
        session_id: SessionId,
        /// Duplicated channel update identifier.
        channel_update_id: String,
    },

    /// A message with the same identifier already exists.
    #[error("duplicate message identifier: {0}")]
    DuplicateMessage(MessageId),

    /// The message was not found.
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ConversationRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
