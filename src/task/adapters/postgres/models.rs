//! Diesel row models for scheduled task persistence.

use super::schema::tasks;
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Row shape shared by reads and writes of the `tasks` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub struct TaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Owning session.
    pub session_id: uuid::Uuid,
    /// Display name.
    pub name: String,
    /// Prompt.
    pub prompt: String,
    /// Schedule kind.
    pub schedule_type: String,
    /// One-shot firing instant.
    pub run_at: Option<DateTime<Utc>>,
    /// Cron expression.
    pub cron_expr: Option<String>,
    /// Cron timezone.
    pub timezone: Option<String>,
    /// Scheduling state kind.
    pub state: String,
    /// When the task was last enabled.
    pub enabled_at: Option<DateTime<Utc>>,
    /// Next firing instant.
    pub next_run_at: Option<DateTime<Utc>>,
    /// Dispatch instant.
    pub dispatched_at: Option<DateTime<Utc>>,
    /// Retirement instant.
    pub completed_at: Option<DateTime<Utc>>,
    /// Last successful run.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Successful run count.
    pub run_count: i32,
    /// Last terminal error.
    pub last_error: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}
