//! Queue store port: durable job rows with an atomic claim primitive.

use crate::queue::domain::{DedupeKey, Job, JobDomainError, JobId, WorkerId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for job store operations.
pub type JobStoreResult<T> = Result<T, JobStoreError>;

/// Outcome of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was written.
    Inserted(JobId),
    /// A row with the same dedupe key already existed; nothing was written.
    Existing(JobId),
}

impl InsertOutcome {
    /// Returns the identifier of the job that owns the dedupe key.
    #[must_use]
    pub const fn job_id(self) -> JobId {
        match self {
            Self::Inserted(id) | Self::Existing(id) => id,
        }
    }

    /// Returns `true` when this call created the job.
    #[must_use]
    pub const fn is_new(self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

/// Parameters of one claim round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    /// Worker taking the leases.
    pub worker_id: WorkerId,
    /// Maximum number of jobs to lock.
    pub max_jobs: usize,
    /// Instant the claim is evaluated at.
    pub now: DateTime<Utc>,
    /// Lease length granted to each claimed job.
    pub lease: Duration,
}

/// Durable job storage contract.
///
/// Implementations must make [`JobStore::claim`] atomic: concurrent callers
/// never receive the same row.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts `job` unless a row with its dedupe key exists.
    async fn insert_if_absent(&self, job: &Job) -> JobStoreResult<InsertOutcome>;

    /// Locks up to `request.max_jobs` ready jobs, oldest `run_at` first.
    ///
    /// Before selecting, every job whose lease ran out is charged one attempt
    /// and either requeued for immediate pickup or terminally failed.
    async fn claim(&self, request: &ClaimRequest) -> JobStoreResult<Vec<Job>>;

    /// Finds a job by identifier.
    async fn find_by_id(&self, id: JobId) -> JobStoreResult<Option<Job>>;

    /// Finds the job that owns a dedupe key.
    async fn find_by_dedupe_key(&self, key: &DedupeKey) -> JobStoreResult<Option<Job>>;

    /// Persists a job transitioned out of a lease held by `holder`.
    ///
    /// The write is conditional: it only lands while the stored row is still
    /// locked by `holder`.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::NotFound`] when the job does not exist and
    /// [`JobStoreError::Domain`] with [`JobDomainError::LeaseLost`] when
    /// another worker has re-claimed it or the lease was already settled.
    async fn update_held(&self, job: &Job, holder: &WorkerId) -> JobStoreResult<()>;
}

/// Errors returned by job store implementations.
#[derive(Debug, Clone, Error)]
pub enum JobStoreError {
    /// The job was not found.
    #[error("job not found: {0}")]
    NotFound(JobId),

    /// A stored row violated a domain rule while being transitioned.
    #[error(transparent)]
    Domain(#[from] JobDomainError),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl JobStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
