//! `PostgreSQL` job store with `SKIP LOCKED` claiming.

use super::{
    models::{JobChangeset, JobRow, NewJobRow},
    schema::jobs,
};
use crate::queue::{
    domain::{
        DedupeKey, Job, JobDomainError, JobId, JobStatus, LEASE_EXPIRED_ERROR, PersistedJobData,
        WorkerId, offset,
    },
    ports::{ClaimRequest, InsertOutcome, JobStore, JobStoreError, JobStoreResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_types::{BigInt, Text, Timestamptz};

/// `PostgreSQL` connection pool type used by queue adapters.
pub type JobPgPool = Pool<ConnectionManager<PgConnection>>;

const EXPIRE_LEASES_SQL: &str = concat!(
    "UPDATE jobs SET ",
    "attempts = attempts + 1, ",
    "last_error = $2, ",
    "status = CASE WHEN attempts + 1 >= max_attempts THEN 'failed' ELSE 'queued' END, ",
    "run_at = CASE WHEN attempts + 1 >= max_attempts THEN run_at ELSE $1 END, ",
    "locked_by = NULL, locked_at = NULL, lease_expires_at = NULL, updated_at = $1 ",
    "WHERE id IN (",
    "SELECT id FROM jobs WHERE status = 'locked' AND lease_expires_at <= $1 ",
    "FOR UPDATE SKIP LOCKED)",
);

const CLAIM_SQL: &str = concat!(
    "UPDATE jobs SET status = 'locked', locked_by = $1, locked_at = $2, ",
    "lease_expires_at = $3, updated_at = $2 ",
    "WHERE id IN (",
    "SELECT id FROM jobs WHERE status = 'queued' AND run_at <= $2 ",
    "ORDER BY run_at, created_at LIMIT $4 FOR UPDATE SKIP LOCKED) ",
    "RETURNING id, job_type, payload, dedupe_key, status, attempts, max_attempts, run_at, ",
    "locked_by, locked_at, lease_expires_at, last_error, created_at, updated_at",
);

/// `PostgreSQL`-backed job store.
#[derive(Debug, Clone)]
pub struct PostgresJobStore {
    pool: JobPgPool,
}

impl PostgresJobStore {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: JobPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> JobStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> JobStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(JobStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(JobStoreError::persistence)?
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    async fn insert_if_absent(&self, job: &Job) -> JobStoreResult<InsertOutcome> {
        let new_row = to_new_row(job)?;
        self.run_blocking(move |connection| {
            let inserted = diesel::insert_into(jobs::table)
                .values(&new_row)
                .on_conflict(jobs::dedupe_key)
                .do_nothing()
                .returning(jobs::id)
                .get_result::<uuid::Uuid>(connection)
                .optional()
                .map_err(JobStoreError::persistence)?;
            if let Some(id) = inserted {
                return Ok(InsertOutcome::Inserted(JobId::from_uuid(id)));
            }
            let existing = jobs::table
                .filter(jobs::dedupe_key.eq(&new_row.dedupe_key))
                .select(jobs::id)
                .first::<uuid::Uuid>(connection)
                .map_err(JobStoreError::persistence)?;
            Ok(InsertOutcome::Existing(JobId::from_uuid(existing)))
        })
        .await
    }

    async fn claim(&self, request: &ClaimRequest) -> JobStoreResult<Vec<Job>> {
        let limit = i64::try_from(request.max_jobs).map_err(JobStoreError::persistence)?;
        let worker_id = request.worker_id.as_str().to_owned();
        let now = request.now;
        let lease_expires_at = offset(now, request.lease);

        let rows = self
            .run_blocking(move |connection| {
                connection
                    .transaction::<_, diesel::result::Error, _>(|tx| {
                        diesel::sql_query(EXPIRE_LEASES_SQL)
                            .bind::<Timestamptz, _>(now)
                            .bind::<Text, _>(LEASE_EXPIRED_ERROR)
                            .execute(tx)?;
                        diesel::sql_query(CLAIM_SQL)
                            .bind::<Text, _>(&worker_id)
                            .bind::<Timestamptz, _>(now)
                            .bind::<Timestamptz, _>(lease_expires_at)
                            .bind::<BigInt, _>(limit)
                            .load::<JobRow>(tx)
                    })
                    .map_err(JobStoreError::persistence)
            })
            .await?;

        let mut claimed = rows
            .into_iter()
            .map(row_to_job)
            .collect::<JobStoreResult<Vec<_>>>()?;
        claimed.sort_by_key(|job| (job.run_at(), job.created_at()));
        Ok(claimed)
    }

    async fn find_by_id(&self, id: JobId) -> JobStoreResult<Option<Job>> {
        self.run_blocking(move |connection| {
            let row = jobs::table
                .filter(jobs::id.eq(id.into_inner()))
                .select(JobRow::as_select())
                .first::<JobRow>(connection)
                .optional()
                .map_err(JobStoreError::persistence)?;
            row.map(row_to_job).transpose()
        })
        .await
    }

    async fn find_by_dedupe_key(&self, key: &DedupeKey) -> JobStoreResult<Option<Job>> {
        let lookup = key.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = jobs::table
                .filter(jobs::dedupe_key.eq(lookup))
                .select(JobRow::as_select())
                .first::<JobRow>(connection)
                .optional()
                .map_err(JobStoreError::persistence)?;
            row.map(row_to_job).transpose()
        })
        .await
    }

    async fn update_held(&self, job: &Job, holder: &WorkerId) -> JobStoreResult<()> {
        let job_id = job.id();
        let changeset = to_changeset(job)?;
        let worker_id = holder.clone();
        self.run_blocking(move |connection| {
            let updated = diesel::update(
                jobs::table
                    .filter(jobs::id.eq(job_id.into_inner()))
                    .filter(jobs::status.eq(JobStatus::Locked.as_str()))
                    .filter(jobs::locked_by.eq(worker_id.as_str())),
            )
            .set(&changeset)
            .execute(connection)
            .map_err(JobStoreError::persistence)?;
            if updated > 0 {
                return Ok(());
            }
            let exists = diesel::select(diesel::dsl::exists(
                jobs::table.filter(jobs::id.eq(job_id.into_inner())),
            ))
            .get_result::<bool>(connection)
            .map_err(JobStoreError::persistence)?;
            if exists {
                Err(JobStoreError::Domain(JobDomainError::LeaseLost { job_id, worker_id }))
            } else {
                Err(JobStoreError::NotFound(job_id))
            }
        })
        .await
    }
}

fn to_new_row(job: &Job) -> JobStoreResult<NewJobRow> {
    Ok(NewJobRow {
        id: job.id().into_inner(),
        job_type: job.job_type().to_owned(),
        payload: job.payload().clone(),
        dedupe_key: job.dedupe_key().as_str().to_owned(),
        status: job.status().as_str().to_owned(),
        attempts: i32::try_from(job.attempts()).map_err(JobStoreError::persistence)?,
        max_attempts: i32::try_from(job.max_attempts()).map_err(JobStoreError::persistence)?,
        run_at: job.run_at(),
        created_at: job.created_at(),
        updated_at: job.updated_at(),
    })
}

fn to_changeset(job: &Job) -> JobStoreResult<JobChangeset> {
    Ok(JobChangeset {
        status: job.status().as_str().to_owned(),
        attempts: i32::try_from(job.attempts()).map_err(JobStoreError::persistence)?,
        run_at: job.run_at(),
        locked_by: job.locked_by().map(|worker| worker.as_str().to_owned()),
        locked_at: job.locked_at(),
        lease_expires_at: job.lease_expires_at(),
        last_error: job.last_error().map(str::to_owned),
        updated_at: job.updated_at(),
    })
}

fn row_to_job(row: JobRow) -> JobStoreResult<Job> {
    let JobRow {
        id,
        job_type,
        payload,
        dedupe_key: persisted_key,
        status: persisted_status,
        attempts: persisted_attempts,
        max_attempts: persisted_max_attempts,
        run_at,
        locked_by: persisted_worker,
        locked_at,
        lease_expires_at,
        last_error,
        created_at,
        updated_at,
    } = row;

    let status =
        JobStatus::try_from(persisted_status.as_str()).map_err(JobStoreError::persistence)?;
    let dedupe_key = DedupeKey::new(persisted_key).map_err(JobStoreError::persistence)?;
    let locked_by = persisted_worker
        .map(WorkerId::new)
        .transpose()
        .map_err(JobStoreError::persistence)?;
    let attempts = u32::try_from(persisted_attempts).map_err(JobStoreError::persistence)?;
    let max_attempts = u32::try_from(persisted_max_attempts).map_err(JobStoreError::persistence)?;

    Ok(Job::from_persisted(PersistedJobData {
        id: JobId::from_uuid(id),
        job_type,
        payload,
        dedupe_key,
        status,
        attempts,
        max_attempts,
        run_at,
        locked_by,
        locked_at,
        lease_expires_at,
        last_error,
        created_at,
        updated_at,
    }))
}
