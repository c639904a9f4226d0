//! Chat sessions keyed by channel and channel chat.

use super::{ConversationDomainError, SessionId};
use chrono::{DateTime, Utc};
use mockable::Clock;

/// One conversation with one chat on one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    channel: String,
    channel_chat_id: String,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session for a channel chat.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationDomainError::EmptyChannel`] or
    /// [`ConversationDomainError::EmptyChatId`] for blank keys.
    pub fn new(
        channel: &str,
        channel_chat_id: &str,
        clock: &impl Clock,
    ) -> Result<Self, ConversationDomainError> {
        let trimmed_channel = channel.trim();
        let trimmed_chat = channel_chat_id.trim();
        if trimmed_channel.is_empty() {
            return Err(ConversationDomainError::EmptyChannel);
        }
        if trimmed_chat.is_empty() {
            return Err(ConversationDomainError::EmptyChatId);
        }
        Ok(Self {
            id: SessionId::new(),
            channel: trimmed_channel.to_ascii_lowercase(),
            channel_chat_id: trimmed_chat.to_owned(),
            created_at: clock.utc(),
        })
    }

    /// Reconstructs a session from persisted storage.
    #[must_use]
    pub const fn from_persisted(
        id: SessionId,
        channel: String,
        channel_chat_id: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            channel,
            channel_chat_id,
            created_at,
        }
    }

    /// Returns the session identifier.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Returns the channel name, lowercased.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Returns the chat identifier on the channel.
    #[must_use]
    pub fn channel_chat_id(&self) -> &str {
        &self.channel_chat_id
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
