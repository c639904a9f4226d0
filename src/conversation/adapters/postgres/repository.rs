//! `PostgreSQL` repository implementation for sessions and messages.

use super::{
    models::{MessageRow, SessionRow},
    schema::{messages, sessions},
};
use crate::conversation::{
    domain::{
        GenerationStatus, Message, MessageId, MessageKind, PersistedMessageData, Role, Session,
        SessionId, ToolCallRecord, ToolStatus,
    },
    ports::{ConversationRepository, ConversationRepositoryError, ConversationRepositoryResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by conversation adapters.
pub type ConversationPgPool = Pool<ConnectionManager<PgConnection>>;

const CHANNEL_UPDATE_CONSTRAINT: &str = "idx_messages_session_channel_update";

/// `PostgreSQL`-backed conversation repository.
#[derive(Debug, Clone)]
pub struct PostgresConversationRepository {
    pool: ConversationPgPool,
}

impl PostgresConversationRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: ConversationPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> ConversationRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> ConversationRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool
                .get()
                .map_err(ConversationRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(ConversationRepositoryError::persistence)?
    }
}

#[async_trait]
impl ConversationRepository for PostgresConversationRepository {
    async fn upsert_session(&self, candidate: &Session) -> ConversationRepositoryResult<Session> {
        let row = SessionRow {
            id: candidate.id().into_inner(),
            channel: candidate.channel().to_owned(),
            channel_chat_id: candidate.channel_chat_id().to_owned(),
            created_at: candidate.created_at(),
        };
        self.run_blocking(move |connection| {
            diesel::insert_into(sessions::table)
                .values(&row)
                .on_conflict((sessions::channel, sessions::channel_chat_id))
                .do_nothing()
                .execute(connection)
                .map_err(ConversationRepositoryError::persistence)?;
            let stored = sessions::table
                .filter(sessions::channel.eq(&row.channel))
                .filter(sessions::channel_chat_id.eq(&row.channel_chat_id))
                .select(SessionRow::as_select())
                .first::<SessionRow>(connection)
                .map_err(ConversationRepositoryError::persistence)?;
            Ok(row_to_session(stored))
        })
        .await
    }

    async fn find_session(&self, id: SessionId) -> ConversationRepositoryResult<Option<Session>> {
        self.run_blocking(move |connection| {
            let row = sessions::table
                .filter(sessions::id.eq(id.into_inner()))
                .select(SessionRow::as_select())
                .first::<SessionRow>(connection)
                .optional()
                .map_err(ConversationRepositoryError::persistence)?;
            Ok(row.map(row_to_session))
        })
        .await
    }

    async fn insert_message(&self, message: &Message) -> ConversationRepositoryResult<()> {
        let message_id = message.id();
        let session_id = message.session_id();
        let update_id = message.channel_update_id().map(str::to_owned);
        let row = to_row(message)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(messages::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info)
                        if is_channel_update_violation(info.as_ref()) =>
                    {
                        ConversationRepositoryError::DuplicateChannelUpdate {
                            session_id,
                            channel_update_id: update_id.clone().unwrap_or_default(),
                        }
                    }
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        ConversationRepositoryError::DuplicateMessage(message_id)
                    }
                    _ => ConversationRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update_message(&self, message: &Message) -> ConversationRepositoryResult<()> {
        let message_id = message.id();
        let row = to_row(message)?;
        self.run_blocking(move |connection| {
            let updated =
                diesel::update(messages::table.filter(messages::id.eq(message_id.into_inner())))
                    .set(&row)
                    .execute(connection)
                    .map_err(ConversationRepositoryError::persistence)?;
            if updated == 0 {
                return Err(ConversationRepositoryError::MessageNotFound(message_id));
            }
            Ok(())
        })
        .await
    }

    async fn find_message(&self, id: MessageId) -> ConversationRepositoryResult<Option<Message>> {
        self.run_blocking(move |connection| {
            let row = messages::table
                .filter(messages::id.eq(id.into_inner()))
                .select(MessageRow::as_select())
                .first::<MessageRow>(connection)
                .optional()
                .map_err(ConversationRepositoryError::persistence)?;
            row.map(row_to_message).transpose()
        })
        .await
    }

    async fn find_by_channel_update(
        &self,
        session_id: SessionId,
        channel_update_id: &str,
    ) -> ConversationRepositoryResult<Option<Message>> {
        let update_id = channel_update_id.to_owned();
        self.run_blocking(move |connection| {
            let row = messages::table
                .filter(messages::session_id.eq(session_id.into_inner()))
                .filter(messages::channel_update_id.eq(update_id))
                .select(MessageRow::as_select())
                .first::<MessageRow>(connection)
                .optional()
                .map_err(ConversationRepositoryError::persistence)?;
            row.map(row_to_message).transpose()
        })
        .await
    }

    async fn find_reply_to(
        &self,
        inbound_id: MessageId,
    ) -> ConversationRepositoryResult<Option<Message>> {
        self.run_blocking(move |connection| {
            let row = messages::table
                .filter(messages::reply_to_message_id.eq(inbound_id.into_inner()))
                .filter(messages::role.eq(Role::Assistant.as_str()))
                .filter(messages::message_type.eq(MessageKind::Text.as_str()))
                .order(messages::seq.asc())
                .select(MessageRow::as_select())
                .first::<MessageRow>(connection)
                .optional()
                .map_err(ConversationRepositoryError::persistence)?;
            row.map(row_to_message).transpose()
        })
        .await
    }

    async fn recent_history(
        &self,
        session_id: SessionId,
        limit: usize,
    ) -> ConversationRepositoryResult<Vec<Message>> {
        let limit = i64::try_from(limit).map_err(ConversationRepositoryError::persistence)?;
        self.run_blocking(move |connection| {
            let rows = messages::table
                .filter(messages::session_id.eq(session_id.into_inner()))
                .filter(messages::message_type.ne(MessageKind::ToolCall.as_str()))
                .filter(
                    messages::generation_status
                        .is_null()
                        .or(messages::generation_status.ne(GenerationStatus::Pending.as_str())),
                )
                .order(messages::seq.desc())
                .limit(limit)
                .select(MessageRow::as_select())
                .load::<MessageRow>(connection)
                .map_err(ConversationRepositoryError::persistence)?;
            let mut history = rows
                .into_iter()
                .map(row_to_message)
                .collect::<ConversationRepositoryResult<Vec<_>>>()?;
            history.reverse();
            Ok(history)
        })
        .await
    }
}

fn is_channel_update_violation(info: &dyn DatabaseErrorInformation) -> bool {
    info.constraint_name()
        .is_some_and(|name| name == CHANNEL_UPDATE_CONSTRAINT)
}

fn row_to_session(row: SessionRow) -> Session {
    Session::from_persisted(
        SessionId::from_uuid(row.id),
        row.channel,
        row.channel_chat_id,
        row.created_at,
    )
}

fn to_row(message: &Message) -> ConversationRepositoryResult<MessageRow> {
    let tool = message.tool_call();
    let duration = tool
        .and_then(|record| record.duration_ms)
        .map(i64::try_from)
        .transpose()
        .map_err(ConversationRepositoryError::persistence)?;
    Ok(MessageRow {
        id: message.id().into_inner(),
        session_id: message.session_id().into_inner(),
        role: message.role().as_str().to_owned(),
        message_type: message.kind().as_str().to_owned(),
        content: message.content().to_owned(),
        reply_to_message_id: message.reply_to().map(MessageId::into_inner),
        channel_update_id: message.channel_update_id().map(str::to_owned),
        channel_message_id: message.channel_message_id().map(str::to_owned),
        channel_from_user_id: message.channel_from_user_id().map(str::to_owned),
        channel_sent_at: message.channel_sent_at(),
        file_id: message.file_id().map(str::to_owned),
        tool_call_id: tool.map(|record| record.call_id.clone()),
        tool_name: tool.map(|record| record.tool_name.clone()),
        tool_arguments: tool.map(|record| record.arguments.clone()),
        tool_status: tool.map(|record| record.status.as_str().to_owned()),
        tool_result: tool.and_then(|record| record.result.clone()),
        tool_error: tool.and_then(|record| record.error.clone()),
        tool_duration_ms: duration,
        generation_status: message
            .generation_status()
            .map(|status| status.as_str().to_owned()),
        created_at: message.created_at(),
        updated_at: message.updated_at(),
    })
}

fn row_to_tool_call(row: &MessageRow) -> ConversationRepositoryResult<Option<ToolCallRecord>> {
    let (Some(call_id), Some(tool_name), Some(status)) =
        (&row.tool_call_id, &row.tool_name, &row.tool_status)
    else {
        return Ok(None);
    };
    let duration_ms = row
        .tool_duration_ms
        .map(u64::try_from)
        .transpose()
        .map_err(ConversationRepositoryError::persistence)?;
    Ok(Some(ToolCallRecord {
        call_id: call_id.clone(),
        tool_name: tool_name.clone(),
        arguments: row
            .tool_arguments
            .clone()
            .unwrap_or(serde_json::Value::Null),
        status: ToolStatus::try_from(status.as_str())
            .map_err(ConversationRepositoryError::persistence)?,
        result: row.tool_result.clone(),
        error: row.tool_error.clone(),
        duration_ms,
    }))
}

fn row_to_message(row: MessageRow) -> ConversationRepositoryResult<Message> {
    let tool_call = row_to_tool_call(&row)?;
    let role = Role::try_from(row.role.as_str()).map_err(ConversationRepositoryError::persistence)?;
    let kind = MessageKind::try_from(row.message_type.as_str())
        .map_err(ConversationRepositoryError::persistence)?;
    let generation_status = row
        .generation_status
        .as_deref()
        .map(GenerationStatus::try_from)
        .transpose()
        .map_err(ConversationRepositoryError::persistence)?;

    Ok(Message::from_persisted(PersistedMessageData {
        id: MessageId::from_uuid(row.id),
        session_id: SessionId::from_uuid(row.session_id),
        role,
        kind,
        content: row.content,
        reply_to: row.reply_to_message_id.map(MessageId::from_uuid),
        channel_update_id: row.channel_update_id,
        channel_message_id: row.channel_message_id,
        channel_from_user_id: row.channel_from_user_id,
        channel_sent_at: row.channel_sent_at,
        file_id: row.file_id,
        tool_call,
        generation_status,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}
