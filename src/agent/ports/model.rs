//! Streaming language model port.

use crate::agent::domain::{ModelRequest, TurnEvent};
use async_trait::async_trait;
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Event stream of one model turn.
pub type TurnEventStream = Pin<Box<dyn Stream<Item = Result<TurnEvent, ModelError>> + Send>>;

/// Model invocation contract.
///
/// Implementations run tools themselves and report them through
/// [`TurnEvent::ToolCallStarted`] and [`TurnEvent::ToolCallFinished`].
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Starts a turn and returns its event stream.
    async fn stream_turn(&self, request: ModelRequest) -> Result<TurnEventStream, ModelError>;
}

/// Errors raised by model adapters.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// The model could not be reached or refused the request.
    #[error("model unavailable: {0}")]
    Unavailable(String),

    /// The stream failed mid-turn.
    #[error("model stream failed: {0}")]
    Stream(String),

    /// Transport failure.
    #[error("model transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl ModelError {
    /// Wraps a transport error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}
