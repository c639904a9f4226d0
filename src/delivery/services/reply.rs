//! Placeholder, generate, deliver, mark.

use crate::agent::services::{TurnError, TurnExecutor};
use crate::channel::{
    domain::{ChannelTarget, MessageHandle},
    ports::{ChannelError, ChannelGateway},
};
use crate::conversation::{
    domain::{Message, MessageId, Session, SessionId},
    ports::{ConversationRepository, ConversationRepositoryError},
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Reply delivered when a turn produces no text.
pub const DEFAULT_FALLBACK_REPLY: &str = "Sorry, I could not put together a reply this time.";

/// What [`ReplyService::respond`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// A new reply was generated and delivered.
    Delivered(MessageId),
    /// A reply placeholder left by an earlier attempt was regenerated and
    /// delivered.
    Regenerated(MessageId),
    /// Content generated by an earlier attempt was delivered.
    Redelivered(MessageId),
    /// The reply had already been delivered; nothing happened.
    AlreadyDelivered(MessageId),
}

impl ReplyOutcome {
    /// Returns the reply row.
    #[must_use]
    pub const fn reply_id(self) -> MessageId {
        match self {
            Self::Delivered(id)
            | Self::Regenerated(id)
            | Self::Redelivered(id)
            | Self::AlreadyDelivered(id) => id,
        }
    }
}

/// Errors that leave the reply undelivered.
#[derive(Debug, Error)]
pub enum ReplyError {
    /// The inbound message does not exist.
    #[error("inbound message not found: {0}")]
    InboundNotFound(MessageId),
    /// The inbound message's session does not exist.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),
    /// Conversation persistence failed.
    #[error(transparent)]
    Repository(#[from] ConversationRepositoryError),
    /// Generation failed.
    #[error(transparent)]
    Turn(#[from] TurnError),
    /// The channel rejected the reply.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Generates and delivers assistant replies exactly once per inbound row.
pub struct ReplyService<R, C>
where
    R: ConversationRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    executor: TurnExecutor<R, C>,
    channel: Arc<dyn ChannelGateway>,
    clock: Arc<C>,
    fallback: String,
}

impl<R, C> ReplyService<R, C>
where
    R: ConversationRepository,
    C: Clock + Send + Sync,
{
    /// Creates a reply service.
    #[must_use]
    pub fn new(
        repository: Arc<R>,
        executor: TurnExecutor<R, C>,
        channel: Arc<dyn ChannelGateway>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            repository,
            executor,
            channel,
            clock,
            fallback: DEFAULT_FALLBACK_REPLY.to_owned(),
        }
    }

    /// Replaces the fallback reply text.
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Returns the conversation repository.
    #[must_use]
    pub const fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Ensures `inbound_id` has exactly one delivered reply.
    ///
    /// # Errors
    ///
    /// Returns [`ReplyError`] when the inbound row or its session is missing,
    /// or when generation or the channel post fails. Failing to record the
    /// delivery mark is logged, not returned.
    pub async fn respond(&self, inbound_id: MessageId) -> Result<ReplyOutcome, ReplyError> {
        let inbound = self
            .repository
            .find_message(inbound_id)
            .await?
            .ok_or(ReplyError::InboundNotFound(inbound_id))?;
        let session = self
            .repository
            .find_session(inbound.session_id())
            .await?
            .ok_or_else(|| ReplyError::SessionNotFound(inbound.session_id()))?;
        self.respond_to(&session, &inbound).await
    }

    /// Same as [`Self::respond`] for rows the caller already loaded.
    ///
    /// # Errors
    ///
    /// See [`Self::respond`].
    pub async fn respond_to(
        &self,
        session: &Session,
        inbound: &Message,
    ) -> Result<ReplyOutcome, ReplyError> {
        match self.repository.find_reply_to(inbound.id()).await? {
            Some(reply) if reply.is_delivered() => {
                debug!(inbound_id = %inbound.id(), reply_id = %reply.id(), "reply already delivered");
                Ok(ReplyOutcome::AlreadyDelivered(reply.id()))
            }
            Some(reply) if reply.is_generated() => {
                info!(inbound_id = %inbound.id(), reply_id = %reply.id(), "redelivering generated reply");
                self.deliver(session, reply).await.map(ReplyOutcome::Redelivered)
            }
            Some(reply) => {
                info!(inbound_id = %inbound.id(), reply_id = %reply.id(), "regenerating reply");
                let generated = self.generate(session, inbound, reply).await?;
                self.deliver(session, generated)
                    .await
                    .map(ReplyOutcome::Regenerated)
            }
            None => {
                let placeholder = Message::reply_placeholder(inbound, &*self.clock);
                self.repository.insert_message(&placeholder).await?;
                let generated = self.generate(session, inbound, placeholder).await?;
                self.deliver(session, generated)
                    .await
                    .map(ReplyOutcome::Delivered)
            }
        }
    }

    async fn generate(
        &self,
        session: &Session,
        inbound: &Message,
        mut reply: Message,
    ) -> Result<Message, ReplyError> {
        let output = self.executor.run_for_reply(session, inbound, &reply).await?;
        let text = if output.text.trim().is_empty() {
            debug!(inbound_id = %inbound.id(), "turn produced no text, using fallback");
            self.fallback.clone()
        } else {
            output.text
        };
        reply.record_generated(text, &*self.clock);
        if let Some(draft) = output.draft {
            reply.record_draft(draft.into_inner(), &*self.clock);
        }
        self.repository.update_message(&reply).await?;
        Ok(reply)
    }

    async fn deliver(&self, session: &Session, mut reply: Message) -> Result<MessageId, ReplyError> {
        let target = ChannelTarget::for_session(session);
        let handle = match reply.channel_message_id().map(MessageHandle::new) {
            Some(draft) => self.finish_draft(&target, draft, reply.content()).await?,
            None => self.channel.post(&target, reply.content()).await?,
        };
        reply.mark_delivered(Some(handle.into_inner()), &*self.clock);
        if let Err(error) = self.repository.update_message(&reply).await {
            warn!(reply_id = %reply.id(), %error, "reply delivered but delivery mark failed");
        } else {
            info!(session_id = %session.id(), reply_id = %reply.id(), "reply delivered");
        }
        Ok(reply.id())
    }

    async fn finish_draft(
        &self,
        target: &ChannelTarget,
        draft: MessageHandle,
        text: &str,
    ) -> Result<MessageHandle, ReplyError> {
        match self.channel.edit(target, &draft, text).await {
            Ok(()) => Ok(draft),
            Err(error) => {
                warn!(%target, %error, "draft edit failed, posting reply instead");
                Ok(self.channel.post(target, text).await?)
            }
        }
    }
}
