//! Error types for conversation domain validation.

use super::MessageId;
use thiserror::Error;

/// Errors returned while constructing or transitioning messages.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversationDomainError {
    /// The channel name is blank.
    #[error("channel must not be empty")]
    EmptyChannel,

    /// The channel chat identifier is blank.
    #[error("channel chat identifier must not be empty")]
    EmptyChatId,

    /// The channel update identifier is blank.
    #[error("channel update identifier must not be empty")]
    EmptyUpdateId,

    /// An inbound message carries neither text nor a file.
    #[error("inbound message needs content or a file")]
    EmptyInbound,

    /// Inbound messages must come from a user or the system.
    #[error("inbound messages cannot have the assistant role")]
    AssistantInbound,

    /// The message is not a tool call.
    #[error("message {0} is not a tool call")]
    NotToolCall(MessageId),

    /// The tool call already has a final status.
    #[error("tool call message {0} already finished")]
    ToolCallAlreadyFinished(MessageId),
}

/// Error returned while parsing stored enum values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} value: {value}")]
pub struct ParseConversationValueError {
    /// Enum being parsed.
    pub kind: &'static str,
    /// Rejected value.
    pub value: String,
}
