//! Normalized model events and the request that produces them.
//!
//! A turn stream interleaves text and tool calls:
//!
//! ```text
//! TextDelta* (ToolCallStarted (TextDelta | ToolCallStarted | ToolCallFinished)* ToolCallFinished)* TextDelta*
//! ```
//!
//! Tool calls are independent per `call_id`; several may be in flight at
//! once and they may finish in any order.

use crate::conversation::domain::{Message, Role, SessionId, ToolOutcome};
use serde_json::Value;

/// One event from a model turn stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// A chunk of reply text.
    TextDelta {
        /// Text fragment.
        text: String,
    },
    /// The model invoked a tool.
    ToolCallStarted {
        /// Identifier linking start and result.
        call_id: String,
        /// Invoked tool.
        tool_name: String,
        /// Tool arguments.
        arguments: Value,
    },
    /// A tool returned or raised.
    ToolCallFinished {
        /// Identifier of the started call.
        call_id: String,
        /// Result or error.
        outcome: ToolOutcome,
    },
}

impl TurnEvent {
    /// Creates a text delta.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::TextDelta { text: text.into() }
    }

    /// Creates a tool start event.
    #[must_use]
    pub fn tool_started(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Value,
    ) -> Self {
        Self::ToolCallStarted {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }

    /// Creates a successful tool result event.
    #[must_use]
    pub fn tool_succeeded(call_id: impl Into<String>, result: Value) -> Self {
        Self::ToolCallFinished {
            call_id: call_id.into(),
            outcome: ToolOutcome::Succeeded(result),
        }
    }

    /// Creates a failed tool result event.
    #[must_use]
    pub fn tool_failed(call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::ToolCallFinished {
            call_id: call_id.into(),
            outcome: ToolOutcome::Failed(error.into()),
        }
    }
}

/// One history row as presented to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Author.
    pub role: Role,
    /// Text content.
    pub content: String,
    /// Uploaded file reference.
    pub file_id: Option<String>,
}

impl From<&Message> for HistoryEntry {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role(),
            content: message.content().to_owned(),
            file_id: message.file_id().map(ToOwned::to_owned),
        }
    }
}

/// Input for one model turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    /// Session being answered.
    pub session_id: SessionId,
    /// Recent history, oldest first, ending with the message being answered.
    pub history: Vec<HistoryEntry>,
    /// Durable long-term context snippets.
    pub context: Vec<String>,
    /// Names of the tools the model may call.
    pub tools: Vec<String>,
}
