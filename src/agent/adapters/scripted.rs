//! Scripted language model for tests and local runs.

use crate::agent::{
    domain::{ModelRequest, TurnEvent},
    ports::{LanguageModel, ModelError, TurnEventStream},
};
use async_trait::async_trait;
use futures_util::stream;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One step of a scripted turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Yield an event.
    Emit(TurnEvent),
    /// Sleep before the next step.
    Pause(Duration),
    /// Fail the stream.
    Fail(String),
}

impl From<TurnEvent> for ScriptStep {
    fn from(event: TurnEvent) -> Self {
        Self::Emit(event)
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    turns: VecDeque<Vec<ScriptStep>>,
    requests: Vec<ModelRequest>,
}

/// Model that replays queued scripts, one per turn.
///
/// A turn with no queued script fails with [`ModelError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedModel {
    state: Arc<Mutex<ScriptState>>,
}

fn poisoned(err: impl std::fmt::Display) -> ModelError {
    ModelError::transport(std::io::Error::other(err.to_string()))
}

impl ScriptedModel {
    /// Creates a model with no queued turns.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the script of the next turn.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Transport`] when the lock is poisoned.
    pub fn push_turn<I, S>(&self, steps: I) -> Result<(), ModelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<ScriptStep>,
    {
        let mut state = self.state.lock().map_err(poisoned)?;
        state.turns.push_back(steps.into_iter().map(Into::into).collect());
        Ok(())
    }

    /// Queues a turn that only replies with `text`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Transport`] when the lock is poisoned.
    pub fn push_reply(&self, text: impl Into<String>) -> Result<(), ModelError> {
        self.push_turn([TurnEvent::text(text)])
    }

    /// Returns every request received so far.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Transport`] when the lock is poisoned.
    pub fn requests(&self) -> Result<Vec<ModelRequest>, ModelError> {
        let state = self.state.lock().map_err(poisoned)?;
        Ok(state.requests.clone())
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn stream_turn(&self, request: ModelRequest) -> Result<TurnEventStream, ModelError> {
        let steps = {
            let mut state = self.state.lock().map_err(poisoned)?;
            state.requests.push(request);
            state
                .turns
                .pop_front()
                .ok_or_else(|| ModelError::Unavailable("no scripted turn queued".to_owned()))?
        };
        let events = stream::unfold(steps.into_iter(), |mut remaining| async move {
            loop {
                match remaining.next()? {
                    ScriptStep::Pause(delay) => tokio::time::sleep(delay).await,
                    ScriptStep::Emit(event) => return Some((Ok(event), remaining)),
                    ScriptStep::Fail(message) => {
                        return Some((Err(ModelError::Stream(message)), remaining));
                    }
                }
            }
        });
        Ok(Box::pin(events))
    }
}
