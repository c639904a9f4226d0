//! Runs one model turn and records its tool-call telemetry.

use crate::agent::{
    domain::{HistoryEntry, ModelRequest, TurnEvent, TurnSettings},
    ports::{ContextError, ContextSource, LanguageModel, ModelError},
};
use crate::channel::{
    domain::{ChannelTarget, MessageHandle},
    ports::ChannelGateway,
};
use crate::conversation::{
    domain::{ConversationDomainError, Message, MessageId, Session, SessionId, ToolOutcome},
    ports::{ConversationRepository, ConversationRepositoryError},
};
use futures_util::StreamExt;
use mockable::Clock;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

/// Error recorded on tool calls still running when the stream ends.
pub const INCOMPLETE_TOOL_CALL: &str = "tool call did not complete";
/// Error recorded on tool calls abandoned by a timeout.
pub const TOOL_TIMED_OUT: &str = "timed out";

/// Result of a completed turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutput {
    /// Accumulated reply text.
    pub text: String,
    /// Draft message streamed to the channel, if any.
    pub draft: Option<MessageHandle>,
    /// Number of tool calls recorded.
    pub tool_calls: usize,
}

/// Errors that end a turn without a reply.
#[derive(Debug, Error)]
pub enum TurnError {
    /// Conversation persistence failed.
    #[error(transparent)]
    Repository(#[from] ConversationRepositoryError),
    /// A tool-call row rejected a transition.
    #[error(transparent)]
    Domain(#[from] ConversationDomainError),
    /// Long-term context could not be loaded.
    #[error(transparent)]
    Context(#[from] ContextError),
    /// The model failed to start or its stream raised.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// The overall turn deadline passed.
    #[error("model turn exceeded {0:?}")]
    ModelTimedOut(Duration),
    /// No event arrived while tool calls were in flight.
    #[error("no tool event within {0:?}")]
    ToolTimedOut(Duration),
}

struct InFlightCall {
    row: Message,
    tool_name: String,
    started: std::time::Instant,
    status: Option<MessageHandle>,
}

struct TurnState {
    session_id: SessionId,
    inbound_id: MessageId,
    target: ChannelTarget,
    text: String,
    in_flight: BTreeMap<String, InFlightCall>,
    finished: HashSet<String>,
    tool_calls: usize,
    draft: Option<MessageHandle>,
    reply: Option<Message>,
    unflushed_chars: usize,
    last_flush: Instant,
}

impl TurnState {
    fn new(session: &Session, inbound: &Message, reply: Option<&Message>) -> Self {
        Self {
            session_id: session.id(),
            inbound_id: inbound.id(),
            target: ChannelTarget::for_session(session),
            text: String::new(),
            in_flight: BTreeMap::new(),
            finished: HashSet::new(),
            tool_calls: 0,
            draft: reply
                .and_then(Message::channel_message_id)
                .map(MessageHandle::new),
            reply: reply.cloned(),
            unflushed_chars: 0,
            last_flush: Instant::now(),
        }
    }
}

/// Executes agent turns for a session.
pub struct TurnExecutor<R, C>
where
    R: ConversationRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    model: Arc<dyn LanguageModel>,
    context: Arc<dyn ContextSource>,
    channel: Arc<dyn ChannelGateway>,
    clock: Arc<C>,
    settings: TurnSettings,
}

impl<R, C> TurnExecutor<R, C>
where
    R: ConversationRepository,
    C: Clock + Send + Sync,
{
    /// Creates an executor with default settings.
    #[must_use]
    pub fn new(
        repository: Arc<R>,
        model: Arc<dyn LanguageModel>,
        context: Arc<dyn ContextSource>,
        channel: Arc<dyn ChannelGateway>,
        clock: Arc<C>,
    ) -> Self {
        Self {
            repository,
            model,
            context,
            channel,
            clock,
            settings: TurnSettings::default(),
        }
    }

    /// Replaces the executor settings.
    #[must_use]
    pub fn with_settings(mut self, settings: TurnSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Returns the executor settings.
    #[must_use]
    pub const fn settings(&self) -> &TurnSettings {
        &self.settings
    }

    /// Runs one turn answering `inbound`.
    ///
    /// Tool calls are persisted as they start and finish. When the stream
    /// raises, a deadline passes or persistence fails mid-turn, every call
    /// still in flight is marked failed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`TurnError`] when loading inputs, the model stream or
    /// tool-call persistence fails, or when a deadline passes.
    pub async fn run(&self, session: &Session, inbound: &Message) -> Result<TurnOutput, TurnError> {
        self.execute(session, inbound, None).await
    }

    /// Runs one turn whose text streams into `reply`'s draft.
    ///
    /// A draft left on the channel by an earlier attempt is edited in place.
    /// The first draft posted by this turn is recorded on the reply row
    /// before any further event is consumed, so a retry after a crash finds
    /// it.
    ///
    /// # Errors
    ///
    /// See [`Self::run`]. Failing to record a new draft on the reply row is
    /// returned as [`TurnError::Repository`] after the draft is withdrawn.
    pub async fn run_for_reply(
        &self,
        session: &Session,
        inbound: &Message,
        reply: &Message,
    ) -> Result<TurnOutput, TurnError> {
        self.execute(session, inbound, Some(reply)).await
    }

    async fn execute(
        &self,
        session: &Session,
        inbound: &Message,
        reply: Option<&Message>,
    ) -> Result<TurnOutput, TurnError> {
        let history = self
            .repository
            .recent_history(session.id(), self.settings.history_limit)
            .await?;
        let context = self
            .context
            .long_term_context(session.id(), inbound.content())
            .await?;
        let request = ModelRequest {
            session_id: session.id(),
            history: history.iter().map(HistoryEntry::from).collect(),
            context,
            tools: self.settings.tools.clone(),
        };

        let deadline = Instant::now() + self.settings.model_timeout;
        let mut turn = TurnState::new(session, inbound, reply);
        let mut events = timeout_at(deadline, self.model.stream_turn(request))
            .await
            .map_err(|_| TurnError::ModelTimedOut(self.settings.model_timeout))??;

        loop {
            let (wait_until, limit) = if turn.in_flight.is_empty() {
                (deadline, TurnError::ModelTimedOut(self.settings.model_timeout))
            } else {
                let tool_deadline = Instant::now() + self.settings.tool_timeout;
                if tool_deadline < deadline {
                    (tool_deadline, TurnError::ToolTimedOut(self.settings.tool_timeout))
                } else {
                    (deadline, TurnError::ModelTimedOut(self.settings.model_timeout))
                }
            };
            let Ok(next) = timeout_at(wait_until, events.next()).await else {
                self.abandon_after_error(&mut turn, TOOL_TIMED_OUT).await;
                return Err(limit);
            };
            match next {
                None => break,
                Some(Err(error)) => {
                    self.abandon_after_error(&mut turn, &error.to_string()).await;
                    return Err(error.into());
                }
                Some(Ok(event)) => {
                    if let Err(error) = self.apply(&mut turn, event).await {
                        self.abandon_after_error(&mut turn, &error.to_string()).await;
                        return Err(error);
                    }
                }
            }
        }

        self.abandon(&mut turn, INCOMPLETE_TOOL_CALL).await?;
        if turn.unflushed_chars > 0 {
            self.flush_draft(&mut turn).await?;
        }
        debug!(
            session_id = %turn.session_id,
            tool_calls = turn.tool_calls,
            chars = turn.text.len(),
            "turn completed"
        );
        Ok(TurnOutput {
            text: turn.text,
            draft: turn.draft,
            tool_calls: turn.tool_calls,
        })
    }

    async fn apply(&self, turn: &mut TurnState, event: TurnEvent) -> Result<(), TurnError> {
        match event {
            TurnEvent::TextDelta { text } => {
                turn.text.push_str(&text);
                if self.settings.stream_text {
                    turn.unflushed_chars += text.chars().count();
                    if turn.unflushed_chars >= self.settings.text_flush_chars
                        || turn.last_flush.elapsed() >= self.settings.text_flush_interval
                    {
                        self.flush_draft(turn).await?;
                    }
                }
                Ok(())
            }
            TurnEvent::ToolCallStarted {
                call_id,
                tool_name,
                arguments,
            } => self.start_call(turn, call_id, tool_name, arguments).await,
            TurnEvent::ToolCallFinished { call_id, outcome } => {
                match turn.in_flight.remove(&call_id) {
                    Some(call) => self.finish_call(turn, call_id, call, outcome).await,
                    None if turn.finished.contains(&call_id) => {
                        debug!(call_id, "duplicate tool result ignored");
                        Ok(())
                    }
                    None => {
                        warn!(call_id, "result for unknown tool call ignored");
                        Ok(())
                    }
                }
            }
        }
    }

    async fn start_call(
        &self,
        turn: &mut TurnState,
        call_id: String,
        tool_name: String,
        arguments: Value,
    ) -> Result<(), TurnError> {
        if turn.in_flight.contains_key(&call_id) || turn.finished.contains(&call_id) {
            warn!(call_id, tool_name, "repeated tool call start ignored");
            return Ok(());
        }
        let row = Message::tool_call_started(
            turn.session_id,
            Some(turn.inbound_id),
            call_id.clone(),
            tool_name.clone(),
            arguments,
            &*self.clock,
        );
        self.repository.insert_message(&row).await?;
        turn.tool_calls += 1;
        info!(session_id = %turn.session_id, call_id, tool_name, "tool call started");

        let status = if self.settings.mirror_tool_calls {
            match self.settings.templates.render_started(&tool_name) {
                Ok(text) => self.post_status(&turn.target, &text).await,
                Err(error) => {
                    warn!(%error, "tool status not mirrored");
                    None
                }
            }
        } else {
            None
        };
        turn.in_flight.insert(
            call_id,
            InFlightCall {
                row,
                tool_name,
                started: std::time::Instant::now(),
                status,
            },
        );
        Ok(())
    }

    async fn finish_call(
        &self,
        turn: &mut TurnState,
        call_id: String,
        mut call: InFlightCall,
        outcome: ToolOutcome,
    ) -> Result<(), TurnError> {
        let duration_ms = u64::try_from(call.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let status_text = match &outcome {
            ToolOutcome::Succeeded(_) => self
                .settings
                .templates
                .render_succeeded(&call.tool_name, duration_ms),
            ToolOutcome::Failed(error) => {
                self.settings
                    .templates
                    .render_failed(&call.tool_name, duration_ms, error)
            }
        };
        let succeeded = matches!(outcome, ToolOutcome::Succeeded(_));
        call.row.finish_tool_call(outcome, duration_ms, &*self.clock)?;
        self.repository.update_message(&call.row).await?;
        info!(
            session_id = %turn.session_id,
            call_id,
            tool_name = call.tool_name,
            duration_ms,
            succeeded,
            "tool call finished"
        );
        turn.finished.insert(call_id);

        if let Some(handle) = call.status {
            match status_text {
                Ok(text) => {
                    if let Err(error) = self.channel.edit(&turn.target, &handle, &text).await {
                        warn!(%error, "tool status edit failed");
                    }
                }
                Err(error) => warn!(%error, "tool status not mirrored"),
            }
        }
        Ok(())
    }

    async fn abandon(&self, turn: &mut TurnState, reason: &str) -> Result<(), TurnError> {
        let pending = std::mem::take(&mut turn.in_flight);
        for (call_id, call) in pending {
            self.finish_call(turn, call_id, call, ToolOutcome::Failed(reason.to_owned()))
                .await?;
        }
        Ok(())
    }

    async fn abandon_after_error(&self, turn: &mut TurnState, reason: &str) {
        if let Err(error) = self.abandon(turn, reason).await {
            warn!(session_id = %turn.session_id, %error, "failed to settle in-flight tool calls");
        }
    }

    async fn post_status(&self, target: &ChannelTarget, text: &str) -> Option<MessageHandle> {
        match self.channel.post(target, text).await {
            Ok(handle) => Some(handle),
            Err(error) => {
                warn!(%target, %error, "tool status post failed");
                None
            }
        }
    }

    async fn flush_draft(&self, turn: &mut TurnState) -> Result<(), TurnError> {
        turn.unflushed_chars = 0;
        turn.last_flush = Instant::now();
        if turn.text.trim().is_empty() {
            return Ok(());
        }
        if let Some(handle) = turn.draft.clone() {
            if let Err(error) = self.channel.edit(&turn.target, &handle, &turn.text).await {
                warn!(target = %turn.target, %error, "draft flush failed");
            }
            return Ok(());
        }
        match self.channel.post(&turn.target, &turn.text).await {
            Ok(handle) => self.remember_draft(turn, handle).await,
            Err(error) => {
                warn!(target = %turn.target, %error, "draft flush failed");
                Ok(())
            }
        }
    }

    async fn remember_draft(
        &self,
        turn: &mut TurnState,
        handle: MessageHandle,
    ) -> Result<(), TurnError> {
        let Some(reply) = turn.reply.as_mut() else {
            turn.draft = Some(handle);
            return Ok(());
        };
        reply.record_draft(handle.as_str(), &*self.clock);
        if let Err(error) = self.repository.update_message(reply).await {
            if let Err(withdraw) = self.channel.delete(&turn.target, &handle).await {
                warn!(target = %turn.target, error = %withdraw, "unrecorded draft not withdrawn");
            }
            return Err(error.into());
        }
        debug!(reply_id = %reply.id(), "draft recorded on reply");
        turn.draft = Some(handle);
        Ok(())
    }
}
