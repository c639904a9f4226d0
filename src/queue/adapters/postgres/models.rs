//! Diesel row models for job persistence.

use super::schema::jobs;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for job records.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct JobRow {
    /// Job identifier.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub id: uuid::Uuid,
    /// Raw job type.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub job_type: String,
    /// Raw payload.
    #[diesel(sql_type = diesel::sql_types::Jsonb)]
    pub payload: Value,
    /// Dedupe key.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub dedupe_key: String,
    /// Lifecycle status.
    #[diesel(sql_type = diesel::sql_types::Varchar)]
    pub status: String,
    /// Attempts consumed.
    #[diesel(sql_type = diesel::sql_types::Int4)]
    pub attempts: i32,
    /// Attempt budget.
    #[diesel(sql_type = diesel::sql_types::Int4)]
    pub max_attempts: i32,
    /// Earliest execution instant.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub run_at: DateTime<Utc>,
    /// Worker holding the lease.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Varchar>)]
    pub locked_by: Option<String>,
    /// Lease start.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Timestamptz>)]
    pub locked_at: Option<DateTime<Utc>>,
    /// Lease deadline.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Timestamptz>)]
    pub lease_expires_at: Option<DateTime<Utc>>,
    /// Most recent failure message.
    #[diesel(sql_type = diesel::sql_types::Nullable<diesel::sql_types::Text>)]
    pub last_error: Option<String>,
    /// Creation timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub updated_at: DateTime<Utc>,
}

/// Insert model for job records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJobRow {
    /// Job identifier.
    pub id: uuid::Uuid,
    /// Raw job type.
    pub job_type: String,
    /// Raw payload.
    pub payload: Value,
    /// Dedupe key.
    pub dedupe_key: String,
    /// Lifecycle status.
    pub status: String,
    /// Attempts consumed.
    pub attempts: i32,
    /// Attempt budget.
    pub max_attempts: i32,
    /// Earliest execution instant.
    pub run_at: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Mutable columns written after a lifecycle transition.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = jobs)]
#[diesel(treat_none_as_null = true)]
pub struct JobChangeset {
    /// Lifecycle status.
    pub status: String,
    /// Attempts consumed.
    pub attempts: i32,
    /// Earliest execution instant.
    pub run_at: DateTime<Utc>,
    /// Worker holding the lease.
    pub locked_by: Option<String>,
    /// Lease start.
    pub locked_at: Option<DateTime<Utc>>,
    /// Lease deadline.
    pub lease_expires_at: Option<DateTime<Utc>>,
    /// Most recent failure message.
    pub last_error: Option<String>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}
