//! In-memory session and message repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::conversation::{
    domain::{Message, MessageId, MessageKind, Role, Session, SessionId},
    ports::{ConversationRepository, ConversationRepositoryError, ConversationRepositoryResult},
};

/// Thread-safe in-memory conversation repository.
///
/// Messages keep insertion order, which stands in for the sequence column
/// of the `PostgreSQL` adapter.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConversationRepository {
    state: Arc<RwLock<InMemoryConversationState>>,
}

#[derive(Debug, Default)]
struct InMemoryConversationState {
    sessions: HashMap<SessionId, Session>,
    session_keys: HashMap<(String, String), SessionId>,
    messages: Vec<Message>,
}

impl InMemoryConversationRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every message of a session in log order.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationRepositoryError::Persistence`] when the lock is
    /// poisoned.
    pub fn session_log(&self, session_id: SessionId) -> ConversationRepositoryResult<Vec<Message>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .messages
            .iter()
            .filter(|message| message.session_id() == session_id)
            .cloned()
            .collect())
    }

    /// Returns every stored session.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationRepositoryError::Persistence`] when the lock is
    /// poisoned.
    pub fn sessions(&self) -> ConversationRepositoryResult<Vec<Session>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.sessions.values().cloned().collect())
    }
}

fn poisoned(err: impl std::fmt::Display) -> ConversationRepositoryError {
    ConversationRepositoryError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn upsert_session(&self, candidate: &Session) -> ConversationRepositoryResult<Session> {
        let mut state = self.state.write().map_err(poisoned)?;
        let key = (
            candidate.channel().to_owned(),
            candidate.channel_chat_id().to_owned(),
        );
        if let Some(existing) = state
            .session_keys
            .get(&key)
            .and_then(|id| state.sessions.get(id))
        {
            return Ok(existing.clone());
        }
        state.session_keys.insert(key, candidate.id());
        state.sessions.insert(candidate.id(), candidate.clone());
        Ok(candidate.clone())
    }

    async fn find_session(&self, id: SessionId) -> ConversationRepositoryResult<Option<Session>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.sessions.get(&id).cloned())
    }

    async fn insert_message(&self, message: &Message) -> ConversationRepositoryResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        if state.messages.iter().any(|row| row.id() == message.id()) {
            return Err(ConversationRepositoryError::DuplicateMessage(message.id()));
        }
        if let Some(update_id) = message.channel_update_id() {
            let duplicate = state.messages.iter().any(|row| {
                row.session_id() == message.session_id()
                    && row.channel_update_id() == Some(update_id)
            });
            if duplicate {
                return Err(ConversationRepositoryError::DuplicateChannelUpdate {
                    session_id: message.session_id(),
                    channel_update_id: update_id.to_owned(),
                });
            }
        }
        state.messages.push(message.clone());
        Ok(())
    }

    async fn update_message(&self, message: &Message) -> ConversationRepositoryResult<()> {
        let mut state = self.state.write().map_err(poisoned)?;
        let slot = state
            .messages
            .iter_mut()
            .find(|row| row.id() == message.id())
            .ok_or(ConversationRepositoryError::MessageNotFound(message.id()))?;
        *slot = message.clone();
        Ok(())
    }

    async fn find_message(&self, id: MessageId) -> ConversationRepositoryResult<Option<Message>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.messages.iter().find(|row| row.id() == id).cloned())
    }

    async fn find_by_channel_update(
        &self,
        session_id: SessionId,
        channel_update_id: &str,
    ) -> ConversationRepositoryResult<Option<Message>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .messages
            .iter()
            .find(|row| {
                row.session_id() == session_id && row.channel_update_id() == Some(channel_update_id)
            })
            .cloned())
    }

    async fn find_reply_to(
        &self,
        inbound_id: MessageId,
    ) -> ConversationRepositoryResult<Option<Message>> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .messages
            .iter()
            .find(|row| {
                row.reply_to() == Some(inbound_id)
                    && row.role() == Role::Assistant
                    && row.kind() == MessageKind::Text
            })
            .cloned())
    }

    async fn recent_history(
        &self,
        session_id: SessionId,
        limit: usize,
    ) -> ConversationRepositoryResult<Vec<Message>> {
        let state = self.state.read().map_err(poisoned)?;
        let mut history: Vec<Message> = state
            .messages
            .iter()
            .rev()
            .filter(|row| row.session_id() == session_id && row.is_history())
            .take(limit)
            .cloned()
            .collect();
        history.reverse();
        Ok(history)
    }
}
