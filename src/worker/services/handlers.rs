//! Routes decoded job payloads to their side effects.

use crate::agent::domain::StatusTemplates;
use crate::conversation::{
    domain::{InboundMessage, Message, MessageId, Role, Session},
    ports::{ConversationRepository, ConversationRepositoryError},
};
use crate::delivery::services::ReplyService;
use crate::queue::{
    domain::{Job, JobId, JobPayload, RunTaskPayload},
    ports::JobStore,
};
use crate::task::{domain::TaskId, ports::TaskRepository, services::TaskLifecycleService};
use crate::worker::ports::{EmbeddingRefresher, HandlerError, JobHandler};
use async_trait::async_trait;
use mockable::Clock;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::SessionCache;

/// Channel update identifier of the synthetic inbound row of a task run.
///
/// A retried job reuses the same row, and therefore the same reply row.
#[must_use]
pub fn task_update_id(task_id: Uuid, job_id: JobId) -> String {
    format!("task:{task_id}:job:{job_id}")
}

/// Production job handler wiring replies, task bookkeeping and embeddings.
pub struct ConciergeJobHandler<R, T, S, C>
where
    R: ConversationRepository,
    T: TaskRepository,
    S: JobStore,
    C: Clock + Send + Sync,
{
    replies: ReplyService<R, C>,
    tasks: TaskLifecycleService<T, S, C>,
    embeddings: Arc<dyn EmbeddingRefresher>,
    sessions: SessionCache,
    templates: StatusTemplates,
    clock: Arc<C>,
}

impl<R, T, S, C> ConciergeJobHandler<R, T, S, C>
where
    R: ConversationRepository,
    T: TaskRepository,
    S: JobStore,
    C: Clock + Send + Sync,
{
    /// Creates a handler.
    #[must_use]
    pub fn new(
        replies: ReplyService<R, C>,
        tasks: TaskLifecycleService<T, S, C>,
        embeddings: Arc<dyn EmbeddingRefresher>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            replies,
            tasks,
            embeddings,
            sessions: SessionCache::default(),
            templates: StatusTemplates::default(),
            clock,
        }
    }

    /// Replaces the session cache.
    #[must_use]
    pub fn with_session_cache(mut self, sessions: SessionCache) -> Self {
        self.sessions = sessions;
        self
    }

    /// Replaces the task prompt templates.
    #[must_use]
    pub fn with_templates(mut self, templates: StatusTemplates) -> Self {
        self.templates = templates;
        self
    }

    fn repository(&self) -> &R {
        self.replies.repository()
    }

    async fn process_message(&self, message_id: Uuid) -> Result<(), HandlerError> {
        let inbound_id = MessageId::from_uuid(message_id);
        let inbound = self
            .repository()
            .find_message(inbound_id)
            .await?
            .ok_or(HandlerError::MissingMessage(inbound_id))?;
        let Some(session) = self
            .sessions
            .get_or_load(inbound.session_id(), self.repository())
            .await?
        else {
            return Err(HandlerError::MissingMessage(inbound_id));
        };
        let outcome = self.replies.respond_to(&session, &inbound).await?;
        debug!(message_id = %inbound_id, ?outcome, "message processed");
        Ok(())
    }

    async fn run_task(&self, job: &Job, payload: RunTaskPayload) -> Result<(), HandlerError> {
        let task_id = TaskId::from_uuid(payload.task_id);
        let Some(task) = self.tasks.find_runnable(task_id).await? else {
            info!(task_id = %task_id, job_id = %job.id(), "task no longer runnable, acknowledging");
            return Ok(());
        };
        let Some(session) = self
            .sessions
            .get_or_load(task.session_id(), self.repository())
            .await?
        else {
            warn!(task_id = %task_id, session_id = %task.session_id(), "task session missing, acknowledging");
            return Ok(());
        };

        let update_id = task_update_id(payload.task_id, job.id());
        let inbound = self
            .synthetic_inbound(&session, &update_id, task.name().as_str(), &payload.prompt)
            .await?;
        self.replies.respond_to(&session, &inbound).await?;
        self.tasks.record_run_success(task_id).await?;
        Ok(())
    }

    async fn synthetic_inbound(
        &self,
        session: &Session,
        update_id: &str,
        name: &str,
        prompt: &str,
    ) -> Result<Message, HandlerError> {
        if let Some(existing) = self
            .repository()
            .find_by_channel_update(session.id(), update_id)
            .await?
        {
            return Ok(existing);
        }
        let content = self.templates.render_task_prompt(name, prompt)?;
        let message = Message::inbound(
            InboundMessage {
                session_id: session.id(),
                role: Role::System,
                content,
                file_id: None,
                channel_update_id: update_id.to_owned(),
                channel_message_id: None,
                channel_from_user_id: None,
            },
            &*self.clock,
        )?;
        match self.repository().insert_message(&message).await {
            Ok(()) => Ok(message),
            Err(ConversationRepositoryError::DuplicateChannelUpdate { .. }) => self
                .repository()
                .find_by_channel_update(session.id(), update_id)
                .await?
                .ok_or(HandlerError::MissingMessage(message.id())),
            Err(other) => Err(other.into()),
        }
    }
}

#[async_trait]
impl<R, T, S, C> JobHandler for ConciergeJobHandler<R, T, S, C>
where
    R: ConversationRepository,
    T: TaskRepository,
    S: JobStore,
    C: Clock + Send + Sync,
{
    async fn handle(&self, job: &Job, payload: JobPayload) -> Result<(), HandlerError> {
        match payload {
            JobPayload::ProcessMessage(body) => self.process_message(body.message_id).await,
            JobPayload::RunTask(body) => self.run_task(job, body).await,
            JobPayload::Embed { target, row_id } => {
                self.embeddings.refresh(target, row_id).await?;
                Ok(())
            }
            JobPayload::Trigger(body) => {
                debug!(job_id = %job.id(), payload = %body, "trigger acknowledged");
                Ok(())
            }
        }
    }

    async fn exhausted(&self, job: &Job, error: &str) -> Result<(), HandlerError> {
        if let Ok(JobPayload::RunTask(body)) = job.decode_payload() {
            self.tasks
                .record_run_failure(TaskId::from_uuid(body.task_id), error)
                .await?;
        }
        Ok(())
    }
}
