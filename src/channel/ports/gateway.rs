//! Delivery port implemented by channel adapters.

use crate::channel::domain::{ChannelTarget, MessageHandle};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Outbound chat operations.
///
/// `post` appends a message, `edit` replaces the text of a posted message
/// and `delete` removes it.
#[async_trait]
pub trait ChannelGateway: Send + Sync {
    /// Posts `text` to the target chat.
    async fn post(&self, target: &ChannelTarget, text: &str) -> ChannelResult<MessageHandle>;

    /// Replaces the text of a posted message.
    async fn edit(
        &self,
        target: &ChannelTarget,
        handle: &MessageHandle,
        text: &str,
    ) -> ChannelResult<()>;

    /// Removes a posted message.
    async fn delete(&self, target: &ChannelTarget, handle: &MessageHandle) -> ChannelResult<()>;
}

/// Errors returned by channel adapters.
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// The channel has no adapter configured.
    #[error("unsupported channel: {0}")]
    UnsupportedChannel(String),

    /// The handle does not name a message in the chat.
    #[error("unknown message handle {handle} in {target}")]
    UnknownHandle {
        /// Chat that was addressed.
        target: ChannelTarget,
        /// Missing handle.
        handle: MessageHandle,
    },

    /// Transport failure.
    #[error("channel transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl ChannelError {
    /// Wraps a transport error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}
