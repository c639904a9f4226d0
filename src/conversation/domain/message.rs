//! Message log rows: inbound messages, assistant replies and tool calls.

use super::{ConversationDomainError, MessageId, ParseConversationValueError, SessionId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::Value;

macro_rules! storage_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Returns the canonical storage representation.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ParseConversationValueError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                match value.trim() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ParseConversationValueError {
                        kind: $kind,
                        value: value.to_owned(),
                    }),
                }
            }
        }
    };
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The human on the channel.
    User,
    /// The agent.
    Assistant,
    /// Synthetic input such as a scheduled task prompt.
    System,
}

storage_enum!(Role, "role", {
    User => "user",
    Assistant => "assistant",
    System => "system",
});

/// Shape of a message row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Plain text.
    Text,
    /// One tool invocation made during a turn.
    ToolCall,
    /// An uploaded file reference.
    File,
}

storage_enum!(MessageKind, "message type", {
    Text => "text",
    ToolCall => "tool-call",
    File => "file",
});

/// Lifecycle of a tool call row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolStatus {
    /// Invoked, no result yet.
    Started,
    /// Returned a result.
    Succeeded,
    /// Raised, timed out, or never completed.
    Failed,
}

storage_enum!(ToolStatus, "tool status", {
    Started => "started",
    Succeeded => "succeeded",
    Failed => "failed",
});

/// Whether an assistant reply row holds generated content yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationStatus {
    /// Placeholder written; generation not finished.
    Pending,
    /// Content written.
    Generated,
}

storage_enum!(GenerationStatus, "generation status", {
    Pending => "pending",
    Generated => "generated",
});

/// Final outcome of a tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// The tool returned output.
    Succeeded(Value),
    /// The tool raised, or the call was abandoned.
    Failed(String),
}

/// Tool invocation details carried by a `tool-call` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCallRecord {
    /// Model-assigned call identifier, unique within a turn.
    pub call_id: String,
    /// Invoked tool.
    pub tool_name: String,
    /// Arguments passed to the tool.
    pub arguments: Value,
    /// Current status.
    pub status: ToolStatus,
    /// Output on success.
    pub result: Option<Value>,
    /// Error text on failure.
    pub error: Option<String>,
    /// Wall time from start to finish.
    pub duration_ms: Option<u64>,
}

/// Validated inbound message fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Session the message belongs to.
    pub session_id: SessionId,
    /// [`Role::User`] for channel traffic, [`Role::System`] for synthetic
    /// task prompts.
    pub role: Role,
    /// Message text; empty for bare file uploads.
    pub content: String,
    /// Uploaded file reference.
    pub file_id: Option<String>,
    /// Channel-side idempotency key.
    pub channel_update_id: String,
    /// Channel-side message identifier.
    pub channel_message_id: Option<String>,
    /// Channel-side sender identifier.
    pub channel_from_user_id: Option<String>,
}

/// One row in a session's ordered message log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    session_id: SessionId,
    role: Role,
    kind: MessageKind,
    content: String,
    reply_to: Option<MessageId>,
    channel_update_id: Option<String>,
    channel_message_id: Option<String>,
    channel_from_user_id: Option<String>,
    channel_sent_at: Option<DateTime<Utc>>,
    file_id: Option<String>,
    tool_call: Option<ToolCallRecord>,
    generation_status: Option<GenerationStatus>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedMessageData {
    /// Message identifier.
    pub id: MessageId,
    /// Owning session.
    pub session_id: SessionId,
    /// Author.
    pub role: Role,
    /// Row shape.
    pub kind: MessageKind,
    /// Text content.
    pub content: String,
    /// Message this row answers.
    pub reply_to: Option<MessageId>,
    /// Channel-side idempotency key.
    pub channel_update_id: Option<String>,
    /// Channel-side message identifier.
    pub channel_message_id: Option<String>,
    /// Channel-side sender identifier.
    pub channel_from_user_id: Option<String>,
    /// Delivery timestamp.
    pub channel_sent_at: Option<DateTime<Utc>>,
    /// Uploaded file reference.
    pub file_id: Option<String>,
    /// Tool call details.
    pub tool_call: Option<ToolCallRecord>,
    /// Reply generation marker.
    pub generation_status: Option<GenerationStatus>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Creates an inbound message row.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationDomainError`] when the update identifier is
    /// blank, when neither content nor file is present, or when the role is
    /// [`Role::Assistant`].
    pub fn inbound(
        inbound: InboundMessage,
        clock: &impl Clock,
    ) -> Result<Self, ConversationDomainError> {
        if inbound.role == Role::Assistant {
            return Err(ConversationDomainError::AssistantInbound);
        }
        if inbound.channel_update_id.trim().is_empty() {
            return Err(ConversationDomainError::EmptyUpdateId);
        }
        let file_id = inbound.file_id.filter(|file| !file.trim().is_empty());
        if inbound.content.trim().is_empty() && file_id.is_none() {
            return Err(ConversationDomainError::EmptyInbound);
        }
        let kind = if file_id.is_some() {
            MessageKind::File
        } else {
            MessageKind::Text
        };
        let timestamp = clock.utc();
        Ok(Self {
            id: MessageId::new(),
            session_id: inbound.session_id,
            role: inbound.role,
            kind,
            content: inbound.content,
            reply_to: None,
            channel_update_id: Some(inbound.channel_update_id),
            channel_message_id: inbound.channel_message_id,
            channel_from_user_id: inbound.channel_from_user_id,
            channel_sent_at: None,
            file_id,
            tool_call: None,
            generation_status: None,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    /// Creates the empty, undelivered assistant reply written before
    /// generation starts.
    #[must_use]
    pub fn reply_placeholder(inbound: &Self, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: MessageId::new(),
            session_id: inbound.session_id,
            role: Role::Assistant,
            kind: MessageKind::Text,
            content: String::new(),
            reply_to: Some(inbound.id),
            channel_update_id: None,
            channel_message_id: None,
            channel_from_user_id: None,
            channel_sent_at: None,
            file_id: None,
            tool_call: None,
            generation_status: Some(GenerationStatus::Pending),
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Creates a `started` tool-call row for a turn answering `inbound`.
    #[must_use]
    pub fn tool_call_started(
        session_id: SessionId,
        reply_to: Option<MessageId>,
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: Value,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        let tool_name = tool_name.into();
        Self {
            id: MessageId::new(),
            session_id,
            role: Role::Assistant,
            kind: MessageKind::ToolCall,
            content: tool_name.clone(),
            reply_to,
            channel_update_id: None,
            channel_message_id: None,
            channel_from_user_id: None,
            channel_sent_at: None,
            file_id: None,
            tool_call: Some(ToolCallRecord {
                call_id: call_id.into(),
                tool_name,
                arguments,
                status: ToolStatus::Started,
                result: None,
                error: None,
                duration_ms: None,
            }),
            generation_status: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a message from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedMessageData) -> Self {
        Self {
            id: data.id,
            session_id: data.session_id,
            role: data.role,
            kind: data.kind,
            content: data.content,
            reply_to: data.reply_to,
            channel_update_id: data.channel_update_id,
            channel_message_id: data.channel_message_id,
            channel_from_user_id: data.channel_from_user_id,
            channel_sent_at: data.channel_sent_at,
            file_id: data.file_id,
            tool_call: data.tool_call,
            generation_status: data.generation_status,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the message identifier.
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.id
    }

    /// Returns the owning session.
    #[must_use]
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns the author.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Returns the row shape.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        self.kind
    }

    /// Returns the text content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the message this row answers.
    #[must_use]
    pub const fn reply_to(&self) -> Option<MessageId> {
        self.reply_to
    }

    /// Returns the channel-side idempotency key.
    #[must_use]
    pub fn channel_update_id(&self) -> Option<&str> {
        self.channel_update_id.as_deref()
    }

    /// Returns the channel-side message identifier.
    #[must_use]
    pub fn channel_message_id(&self) -> Option<&str> {
        self.channel_message_id.as_deref()
    }

    /// Returns the channel-side sender identifier.
    #[must_use]
    pub fn channel_from_user_id(&self) -> Option<&str> {
        self.channel_from_user_id.as_deref()
    }

    /// Returns when the row was delivered to the channel.
    #[must_use]
    pub const fn channel_sent_at(&self) -> Option<DateTime<Utc>> {
        self.channel_sent_at
    }

    /// Returns the uploaded file reference.
    #[must_use]
    pub fn file_id(&self) -> Option<&str> {
        self.file_id.as_deref()
    }

    /// Returns the tool call details of a `tool-call` row.
    #[must_use]
    pub const fn tool_call(&self) -> Option<&ToolCallRecord> {
        self.tool_call.as_ref()
    }

    /// Returns the reply generation marker.
    #[must_use]
    pub const fn generation_status(&self) -> Option<GenerationStatus> {
        self.generation_status
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns `true` once the row has been delivered.
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        self.channel_sent_at.is_some()
    }

    /// Returns `true` when the row holds generated reply content.
    #[must_use]
    pub fn is_generated(&self) -> bool {
        self.generation_status == Some(GenerationStatus::Generated)
    }

    /// Returns `true` for rows fed back to the model as history.
    ///
    /// Tool-call rows and unfinished reply placeholders are excluded.
    #[must_use]
    pub fn is_history(&self) -> bool {
        self.kind != MessageKind::ToolCall
            && self.generation_status != Some(GenerationStatus::Pending)
    }

    /// Writes generated reply content.
    pub fn record_generated(&mut self, content: impl Into<String>, clock: &impl Clock) {
        self.content = content.into();
        self.generation_status = Some(GenerationStatus::Generated);
        self.updated_at = clock.utc();
    }

    /// Remembers the channel handle of a draft streamed before delivery.
    ///
    /// Delivery edits that message instead of posting a new one.
    pub fn record_draft(&mut self, channel_message_id: impl Into<String>, clock: &impl Clock) {
        self.channel_message_id = Some(channel_message_id.into());
        self.updated_at = clock.utc();
    }

    /// Marks the row delivered, remembering the channel's message handle.
    pub fn mark_delivered(&mut self, channel_message_id: Option<String>, clock: &impl Clock) {
        let now = clock.utc();
        self.channel_sent_at = Some(now);
        if channel_message_id.is_some() {
            self.channel_message_id = channel_message_id;
        }
        self.updated_at = now;
    }

    /// Settles a started tool call.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationDomainError::NotToolCall`] for other rows and
    /// [`ConversationDomainError::ToolCallAlreadyFinished`] when the call is
    /// already settled.
    pub fn finish_tool_call(
        &mut self,
        outcome: ToolOutcome,
        duration_ms: u64,
        clock: &impl Clock,
    ) -> Result<(), ConversationDomainError> {
        let message_id = self.id;
        let record = self
            .tool_call
            .as_mut()
            .ok_or(ConversationDomainError::NotToolCall(message_id))?;
        if record.status != ToolStatus::Started {
            return Err(ConversationDomainError::ToolCallAlreadyFinished(message_id));
        }
        match outcome {
            ToolOutcome::Succeeded(result) => {
                record.status = ToolStatus::Succeeded;
                record.result = Some(result);
            }
            ToolOutcome::Failed(error) => {
                record.status = ToolStatus::Failed;
                record.error = Some(error);
            }
        }
        record.duration_ms = Some(duration_ms);
        self.updated_at = clock.utc();
        Ok(())
    }
}
