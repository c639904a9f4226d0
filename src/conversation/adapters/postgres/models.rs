//! Diesel row models for session and message persistence.

use super::schema::{messages, sessions};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Row shape for session records.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SessionRow {
    /// Session identifier.
    pub id: uuid::Uuid,
    /// Channel name.
    pub channel: String,
    /// Chat identifier on the channel.
    pub channel_chat_id: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Row shape for message records, excluding the sequence column.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct MessageRow {
    /// Message identifier.
    pub id: uuid::Uuid,
    /// Owning session.
    pub session_id: uuid::Uuid,
    /// Author role.
    pub role: String,
    /// Row shape.
    pub message_type: String,
    /// Text content.
    pub content: String,
    /// Message this row answers.
    pub reply_to_message_id: Option<uuid::Uuid>,
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
    /// Tool call identifier.
    pub tool_call_id: Option<String>,
    /// Invoked tool.
    pub tool_name: Option<String>,
    /// Tool arguments.
    pub tool_arguments: Option<Value>,
    /// Tool call status.
    pub tool_status: Option<String>,
    /// Tool output.
    pub tool_result: Option<Value>,
    /// Tool error text.
    pub tool_error: Option<String>,
    /// Tool wall time in milliseconds.
    pub tool_duration_ms: Option<i64>,
    /// Reply generation marker.
    pub generation_status: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}
