//! Diesel schema for session and message persistence.

diesel::table! {
    /// One row per `(channel, channel_chat_id)`.
    sessions (id) {
        /// Session identifier.
        id -> Uuid,
        /// Channel name.
        #[max_length = 50]
        channel -> Varchar,
        /// Chat identifier on the channel.
        #[max_length = 255]
        channel_chat_id -> Varchar,
        /// Creation timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Ordered message log rows.
    messages (id) {
        /// Insertion sequence used for ordering.
        seq -> Int8,
        /// Message identifier.
        id -> Uuid,
        /// Owning session.
        session_id -> Uuid,
        /// Author role.
        #[max_length = 20]
        role -> Varchar,
        /// Row shape.
        #[max_length = 20]
        message_type -> Varchar,
        /// Text content.
        content -> Text,
        /// Message this row answers.
        reply_to_message_id -> Nullable<Uuid>,
        /// Channel-side idempotency key, unique per session.
        #[max_length = 255]
        channel_update_id -> Nullable<Varchar>,
        /// Channel-side message identifier.
        #[max_length = 255]
        channel_message_id -> Nullable<Varchar>,
        /// Channel-side sender identifier.
        #[max_length = 255]
        channel_from_user_id -> Nullable<Varchar>,
        /// Delivery timestamp.
        channel_sent_at -> Nullable<Timestamptz>,
        /// Uploaded file reference.
        #[max_length = 255]
        file_id -> Nullable<Varchar>,
        /// Model-assigned tool call identifier.
        #[max_length = 255]
        tool_call_id -> Nullable<Varchar>,
        /// Invoked tool.
        #[max_length = 255]
        tool_name -> Nullable<Varchar>,
        /// Tool arguments.
        tool_arguments -> Nullable<Jsonb>,
        /// Tool call status.
        #[max_length = 20]
        tool_status -> Nullable<Varchar>,
        /// Tool output.
        tool_result -> Nullable<Jsonb>,
        /// Tool error text.
        tool_error -> Nullable<Text>,
        /// Tool wall time in milliseconds.
        tool_duration_ms -> Nullable<Int8>,
        /// Reply generation marker.
        #[max_length = 20]
        generation_status -> Nullable<Varchar>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(messages -> sessions (session_id));
diesel::allow_tables_to_appear_in_same_query!(messages, sessions);
