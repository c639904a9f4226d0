//! Domain model for sessions and their message logs.
//!
//! Inbound rows are deduplicated by `(session, channel_update_id)`. Assistant
//! replies start as empty placeholders linked to the inbound row and carry an
//! explicit generation marker, so a retried job can tell "not generated yet"
//! from "generated but not delivered".

mod error;
mod ids;
mod message;
mod session;

pub use error::{ConversationDomainError, ParseConversationValueError};
pub use ids::{MessageId, SessionId};
pub use message::{
    GenerationStatus, InboundMessage, Message, MessageKind, PersistedMessageData, Role,
    ToolCallRecord, ToolOutcome, ToolStatus,
};
pub use session::Session;
