//! Inbound ingestion: session upsert, message insert and job enqueue.

use crate::conversation::{
    domain::{ConversationDomainError, InboundMessage, Message, MessageId, Role, Session},
    ports::{ConversationRepository, ConversationRepositoryError},
};
use crate::queue::{
    domain::{DedupeKey, JobDomainError, JobId, JobPayload},
    ports::JobStore,
    services::{EnqueueRequest, JobQueue, JobQueueError},
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Channel-agnostic inbound message envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEnvelope {
    /// Channel name, such as `telegram`.
    pub channel: String,
    /// Chat identifier on the channel.
    pub channel_chat_id: String,
    /// Channel-side idempotency key.
    pub channel_update_id: String,
    /// Message text.
    pub content: Option<String>,
    /// Uploaded file reference.
    pub file_id: Option<String>,
    /// Channel-side message identifier.
    pub channel_message_id: Option<String>,
    /// Channel-side sender identifier.
    pub channel_from_user_id: Option<String>,
}

impl InboundEnvelope {
    /// Creates a text envelope.
    #[must_use]
    pub fn text(
        channel: impl Into<String>,
        channel_chat_id: impl Into<String>,
        channel_update_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            channel_chat_id: channel_chat_id.into(),
            channel_update_id: channel_update_id.into(),
            content: Some(content.into()),
            file_id: None,
            channel_message_id: None,
            channel_from_user_id: None,
        }
    }

    /// Attaches an uploaded file.
    #[must_use]
    pub fn with_file(mut self, file_id: impl Into<String>) -> Self {
        self.file_id = Some(file_id.into());
        self
    }

    /// Records the channel-side message and sender identifiers.
    #[must_use]
    pub fn with_channel_ids(
        mut self,
        channel_message_id: impl Into<String>,
        channel_from_user_id: impl Into<String>,
    ) -> Self {
        self.channel_message_id = Some(channel_message_id.into());
        self.channel_from_user_id = Some(channel_from_user_id.into());
        self
    }
}

/// Result of ingesting one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionOutcome {
    /// Session the message belongs to.
    pub session: Session,
    /// Stored inbound row (the original one for duplicates).
    pub message_id: MessageId,
    /// `process_message` job answering the row.
    pub job_id: JobId,
    /// `true` when the update had been ingested before.
    pub duplicate: bool,
}

/// Service-level errors for inbound ingestion.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// The envelope failed validation.
    #[error(transparent)]
    Domain(#[from] ConversationDomainError),
    /// The dedupe key derived from the update is unusable.
    #[error(transparent)]
    DedupeKey(#[from] JobDomainError),
    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] ConversationRepositoryError),
    /// Enqueueing the processing job failed.
    #[error(transparent)]
    Queue(#[from] JobQueueError),
    /// A new inbound row's update id already keys a job for another row.
    #[error("update {channel_update_id} is already queued as job {job_id} for another message")]
    UpdateAlreadyQueued {
        /// Channel-side update identifier.
        channel_update_id: String,
        /// Job holding the dedupe key.
        job_id: JobId,
        /// Inbound row left without a job.
        message_id: MessageId,
    },
}

/// Writes inbound traffic and schedules its processing.
#[derive(Clone)]
pub struct IngestionService<R, S, C>
where
    R: ConversationRepository,
    S: JobStore,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    queue: JobQueue<S, C>,
    clock: Arc<C>,
}

impl<R, S, C> IngestionService<R, S, C>
where
    R: ConversationRepository,
    S: JobStore,
    C: Clock + Send + Sync,
{
    /// Creates a new ingestion service.
    #[must_use]
    pub const fn new(repository: Arc<R>, queue: JobQueue<S, C>, clock: Arc<C>) -> Self {
        Self {
            repository,
            queue,
            clock,
        }
    }

    /// Ingests an inbound envelope.
    ///
    /// A duplicate `channel_update_id` for the same session is benign: no
    /// second row is written and the dedupe key keeps the job count at one.
    /// The enqueue is repeated for duplicates so a crash between insert and
    /// enqueue heals on redelivery.
    ///
    /// # Errors
    ///
    /// Returns [`IngestionError`] when validation, persistence or enqueueing
    /// fails, and [`IngestionError::UpdateAlreadyQueued`] when a new row's
    /// update id already keys another row's job.
    pub async fn ingest(&self, envelope: InboundEnvelope) -> Result<IngestionOutcome, IngestionError> {
        let candidate = Session::new(&envelope.channel, &envelope.channel_chat_id, &*self.clock)?;
        let dedupe_key = DedupeKey::for_inbound_update(&envelope.channel_update_id)?;
        let session = self.repository.upsert_session(&candidate).await?;

        let message = Message::inbound(
            InboundMessage {
                session_id: session.id(),
                role: Role::User,
                content: envelope.content.unwrap_or_default(),
                file_id: envelope.file_id,
                channel_update_id: envelope.channel_update_id.clone(),
                channel_message_id: envelope.channel_message_id,
                channel_from_user_id: envelope.channel_from_user_id,
            },
            &*self.clock,
        )?;

        let (message_id, duplicate) = match self.repository.insert_message(&message).await {
            Ok(()) => (message.id(), false),
            Err(ConversationRepositoryError::DuplicateChannelUpdate { .. }) => {
                let existing = self
                    .repository
                    .find_by_channel_update(session.id(), &envelope.channel_update_id)
                    .await?
                    .ok_or(ConversationRepositoryError::MessageNotFound(message.id()))?;
                debug!(
                    session_id = %session.id(),
                    channel_update_id = envelope.channel_update_id,
                    "duplicate inbound update ignored"
                );
                (existing.id(), true)
            }
            Err(other) => return Err(other.into()),
        };

        let outcome = self
            .queue
            .enqueue(EnqueueRequest::new(
                JobPayload::process_message(message_id.into_inner()),
                dedupe_key,
            ))
            .await?;
        if !duplicate && !outcome.is_new() {
            warn!(
                session_id = %session.id(),
                message_id = %message_id,
                job_id = %outcome.job_id(),
                channel_update_id = envelope.channel_update_id,
                "update id already queued for another message"
            );
            return Err(IngestionError::UpdateAlreadyQueued {
                channel_update_id: envelope.channel_update_id,
                job_id: outcome.job_id(),
                message_id,
            });
        }
        if !duplicate {
            info!(
                session_id = %session.id(),
                message_id = %message_id,
                job_id = %outcome.job_id(),
                "inbound message ingested"
            );
        }
        Ok(IngestionOutcome {
            session,
            message_id,
            job_id: outcome.job_id(),
            duplicate,
        })
    }
}
