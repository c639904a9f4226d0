//! `PostgreSQL` repository implementation for scheduled tasks.

use super::{models::TaskRow, schema::tasks};
use crate::conversation::domain::SessionId;
use crate::task::{
    domain::{
        CronSchedule, PersistedTaskData, Task, TaskId, TaskName, TaskPrompt, TaskSchedule,
        TaskState,
    },
    ports::{TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL` connection pool type used by task adapters.
pub type TaskPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed task repository.
#[derive(Debug, Clone)]
pub struct PostgresTaskRepository {
    pool: TaskPgPool,
}

impl PostgresTaskRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: TaskPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TaskRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TaskRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskRepositoryError::persistence)?
    }
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let row = to_row(task)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(tasks::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        TaskRepositoryError::DuplicateTask(task_id)
                    }
                    _ => TaskRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update(&self, task: &Task) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let row = to_row(task)?;
        self.run_blocking(move |connection| {
            let updated = diesel::update(tasks::table.filter(tasks::id.eq(task_id.into_inner())))
                .set(&row)
                .execute(connection)
                .map_err(TaskRepositoryError::persistence)?;
            if updated == 0 {
                return Err(TaskRepositoryError::NotFound(task_id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        self.run_blocking(move |connection| {
            let row = tasks::table
                .filter(tasks::id.eq(id.into_inner()))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(TaskRepositoryError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn find_due(&self, now: DateTime<Utc>, limit: usize) -> TaskRepositoryResult<Vec<Task>> {
        let limit = i64::try_from(limit).map_err(TaskRepositoryError::persistence)?;
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .filter(tasks::enabled_at.is_not_null())
                .filter(tasks::state.eq("pending"))
                .filter(tasks::next_run_at.le(now))
                .order((tasks::next_run_at.asc(), tasks::created_at.asc()))
                .limit(limit)
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn mark_dispatched(
        &self,
        id: TaskId,
        observed_next_run_at: DateTime<Utc>,
        dispatched_at: DateTime<Utc>,
    ) -> TaskRepositoryResult<bool> {
        self.run_blocking(move |connection| {
            let updated = diesel::update(
                tasks::table
                    .filter(tasks::id.eq(id.into_inner()))
                    .filter(tasks::enabled_at.is_not_null())
                    .filter(tasks::state.eq("pending"))
                    .filter(tasks::next_run_at.eq(observed_next_run_at)),
            )
            .set((
                tasks::state.eq("dispatched"),
                tasks::next_run_at.eq(None::<DateTime<Utc>>),
                tasks::dispatched_at.eq(Some(dispatched_at)),
                tasks::updated_at.eq(dispatched_at),
            ))
            .execute(connection)
            .map_err(TaskRepositoryError::persistence)?;
            Ok(updated == 1)
        })
        .await
    }

    async fn list_for_session(&self, session_id: SessionId) -> TaskRepositoryResult<Vec<Task>> {
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .filter(tasks::session_id.eq(session_id.into_inner()))
                .order((tasks::created_at.asc(), tasks::id.asc()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn delete(&self, id: TaskId) -> TaskRepositoryResult<bool> {
        self.run_blocking(move |connection| {
            let deleted = diesel::delete(tasks::table.filter(tasks::id.eq(id.into_inner())))
                .execute(connection)
                .map_err(TaskRepositoryError::persistence)?;
            Ok(deleted > 0)
        })
        .await
    }
}

fn to_row(task: &Task) -> TaskRepositoryResult<TaskRow> {
    let (run_at, cron_expr, timezone) = match task.schedule() {
        TaskSchedule::Unscheduled => (None, None, None),
        TaskSchedule::Once { run_at } => (Some(*run_at), None, None),
        TaskSchedule::Recurring(cron) => (
            None,
            Some(cron.expression().to_owned()),
            Some(cron.timezone().name().to_owned()),
        ),
    };
    let (dispatched_at, completed_at) = match task.state() {
        TaskState::Dispatched { dispatched_at } => (Some(dispatched_at), None),
        TaskState::Completed { completed_at } => (None, Some(completed_at)),
        TaskState::Disabled | TaskState::Pending { .. } => (None, None),
    };

    Ok(TaskRow {
        id: task.id().into_inner(),
        session_id: task.session_id().into_inner(),
        name: task.name().as_str().to_owned(),
        prompt: task.prompt().as_str().to_owned(),
        schedule_type: task.schedule().kind().to_owned(),
        run_at,
        cron_expr,
        timezone,
        state: task.state().as_str().to_owned(),
        enabled_at: task.enabled_at(),
        next_run_at: task.next_run_at(),
        dispatched_at,
        completed_at,
        last_run_at: task.last_run_at(),
        run_count: i32::try_from(task.run_count()).map_err(TaskRepositoryError::persistence)?,
        last_error: task.last_error().map(str::to_owned),
        created_at: task.created_at(),
        updated_at: task.updated_at(),
    })
}

fn row_to_schedule(
    schedule_type: &str,
    run_at: Option<DateTime<Utc>>,
    cron_expr: Option<&str>,
    timezone: Option<&str>,
) -> TaskRepositoryResult<TaskSchedule> {
    match (schedule_type, run_at, cron_expr) {
        ("none", _, _) => Ok(TaskSchedule::Unscheduled),
        ("once", Some(at), _) => Ok(TaskSchedule::Once { run_at: at }),
        ("recurring", _, Some(expression)) => {
            CronSchedule::parse(expression, timezone.unwrap_or("UTC"))
                .map(TaskSchedule::Recurring)
                .map_err(TaskRepositoryError::persistence)
        }
        _ => Err(TaskRepositoryError::persistence(std::io::Error::other(
            format!("inconsistent schedule columns for type '{schedule_type}'"),
        ))),
    }
}

fn row_to_task(row: TaskRow) -> TaskRepositoryResult<Task> {
    let schedule = row_to_schedule(
        &row.schedule_type,
        row.run_at,
        row.cron_expr.as_deref(),
        row.timezone.as_deref(),
    )?;
    let state = TaskState::from_parts(
        &row.state,
        row.next_run_at,
        row.dispatched_at,
        row.completed_at,
    )
    .map_err(TaskRepositoryError::persistence)?;
    let name = TaskName::new(row.name).map_err(TaskRepositoryError::persistence)?;
    let prompt = TaskPrompt::new(row.prompt).map_err(TaskRepositoryError::persistence)?;
    let run_count = u32::try_from(row.run_count).map_err(TaskRepositoryError::persistence)?;

    Ok(Task::from_persisted(PersistedTaskData {
        id: TaskId::from_uuid(row.id),
        session_id: SessionId::from_uuid(row.session_id),
        name,
        prompt,
        schedule,
        state,
        enabled_at: row.enabled_at,
        last_run_at: row.last_run_at,
        run_count,
        last_error: row.last_error,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}
