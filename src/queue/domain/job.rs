//! Job aggregate root and its lease lifecycle.

use super::{
    DEFAULT_MAX_ATTEMPTS, DedupeKey, JobDomainError, JobId, JobPayload, ParseJobStatusError,
    PayloadError, WorkerId,
};
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Error text recorded when a lease runs out without a report.
pub const LEASE_EXPIRED_ERROR: &str = "lease expired";

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for `run_at` and a worker.
    Queued,
    /// Held under a worker lease.
    Locked,
    /// Completed successfully. Terminal.
    Succeeded,
    /// Exhausted its attempts. Terminal.
    Failed,
}

impl JobStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Locked => "locked",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Returns `true` for statuses no transition leaves.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl TryFrom<&str> for JobStatus {
    type Error = ParseJobStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "queued" => Ok(Self::Queued),
            "locked" => Ok(Self::Locked),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            _ => Err(ParseJobStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of recording a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The job was requeued for another attempt.
    Retrying {
        /// Earliest instant of the next attempt.
        run_at: DateTime<Utc>,
    },
    /// The job has no attempts left and is terminally failed.
    Exhausted,
}

/// Result of marking a job succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessOutcome {
    /// The job moved from locked to succeeded.
    Recorded,
    /// The job was already succeeded; nothing changed.
    AlreadySucceeded,
}

/// Parameter object for a brand-new job.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    /// Typed payload; determines the job type.
    pub payload: JobPayload,
    /// Idempotency key.
    pub dedupe_key: DedupeKey,
    /// Earliest execution instant; defaults to now.
    pub run_at: Option<DateTime<Utc>>,
    /// Attempt budget; defaults to [`DEFAULT_MAX_ATTEMPTS`].
    pub max_attempts: Option<u32>,
}

/// Job aggregate root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    id: JobId,
    job_type: String,
    payload: Value,
    dedupe_key: DedupeKey,
    status: JobStatus,
    attempts: u32,
    max_attempts: u32,
    run_at: DateTime<Utc>,
    locked_by: Option<WorkerId>,
    locked_at: Option<DateTime<Utc>>,
    lease_expires_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted job aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedJobData {
    /// Persisted job identifier.
    pub id: JobId,
    /// Persisted raw job type.
    pub job_type: String,
    /// Persisted raw payload.
    pub payload: Value,
    /// Persisted dedupe key.
    pub dedupe_key: DedupeKey,
    /// Persisted status.
    pub status: JobStatus,
    /// Attempts consumed so far.
    pub attempts: u32,
    /// Attempt budget.
    pub max_attempts: u32,
    /// Earliest execution instant.
    pub run_at: DateTime<Utc>,
    /// Worker holding the lease, if locked.
    pub locked_by: Option<WorkerId>,
    /// Lease start, if locked.
    pub locked_at: Option<DateTime<Utc>>,
    /// Lease deadline, if locked.
    pub lease_expires_at: Option<DateTime<Utc>>,
    /// Most recent failure message.
    pub last_error: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Creates a queued job.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::InvalidMaxAttempts`] when the attempt budget
    /// is zero.
    pub fn new(new_job: NewJob, clock: &impl Clock) -> Result<Self, JobDomainError> {
        let max_attempts = new_job.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS);
        if max_attempts == 0 {
            return Err(JobDomainError::InvalidMaxAttempts(max_attempts));
        }
        let timestamp = clock.utc();
        Ok(Self {
            id: JobId::new(),
            job_type: new_job.payload.job_type().to_owned(),
            payload: new_job.payload.to_json(),
            dedupe_key: new_job.dedupe_key,
            status: JobStatus::Queued,
            attempts: 0,
            max_attempts,
            run_at: new_job.run_at.unwrap_or(timestamp),
            locked_by: None,
            locked_at: None,
            lease_expires_at: None,
            last_error: None,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    /// Reconstructs a job from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedJobData) -> Self {
        Self {
            id: data.id,
            job_type: data.job_type,
            payload: data.payload,
            dedupe_key: data.dedupe_key,
            status: data.status,
            attempts: data.attempts,
            max_attempts: data.max_attempts,
            run_at: data.run_at,
            locked_by: data.locked_by,
            locked_at: data.locked_at,
            lease_expires_at: data.lease_expires_at,
            last_error: data.last_error,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the job identifier.
    #[must_use]
    pub const fn id(&self) -> JobId {
        self.id
    }

    /// Returns the raw job type.
    #[must_use]
    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    /// Returns the raw payload.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Decodes the typed payload.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] when the stored pair is unknown or malformed.
    pub fn decode_payload(&self) -> Result<JobPayload, PayloadError> {
        JobPayload::from_parts(&self.job_type, &self.payload)
    }

    /// Returns the dedupe key.
    #[must_use]
    pub const fn dedupe_key(&self) -> &DedupeKey {
        &self.dedupe_key
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub const fn status(&self) -> JobStatus {
        self.status
    }

    /// Returns the number of attempts consumed.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns the attempt budget.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the earliest execution instant.
    #[must_use]
    pub const fn run_at(&self) -> DateTime<Utc> {
        self.run_at
    }

    /// Returns the worker holding the lease.
    #[must_use]
    pub const fn locked_by(&self) -> Option<&WorkerId> {
        self.locked_by.as_ref()
    }

    /// Returns the lease start.
    #[must_use]
    pub const fn locked_at(&self) -> Option<DateTime<Utc>> {
        self.locked_at
    }

    /// Returns the lease deadline.
    #[must_use]
    pub const fn lease_expires_at(&self) -> Option<DateTime<Utc>> {
        self.lease_expires_at
    }

    /// Returns the most recent failure message.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the last modification timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns `true` when the job is queued and its `run_at` has passed.
    #[must_use]
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Queued && self.run_at <= now
    }

    /// Returns `true` when the job is locked past its lease deadline.
    #[must_use]
    pub fn is_lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Locked
            && self
                .lease_expires_at
                .is_some_and(|deadline| deadline <= now)
    }

    /// Places the job under a lease held by `worker_id`.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::NotClaimable`] unless the job is ready.
    pub fn claim(
        &mut self,
        worker_id: &WorkerId,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<(), JobDomainError> {
        if !self.is_ready(now) {
            return Err(JobDomainError::NotClaimable {
                job_id: self.id,
                status: self.status,
            });
        }
        self.status = JobStatus::Locked;
        self.locked_by = Some(worker_id.clone());
        self.locked_at = Some(now);
        self.lease_expires_at = Some(offset(now, lease));
        self.updated_at = now;
        Ok(())
    }

    /// Reclaims an abandoned lease, charging one attempt.
    ///
    /// The job is requeued for immediate pickup, or terminally failed when
    /// the charged attempt exhausts the budget.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::LeaseStillActive`] when the lease has not
    /// run out, or [`JobDomainError::NotLocked`] when the job is not locked.
    pub fn expire_lease(&mut self, now: DateTime<Utc>) -> Result<FailureOutcome, JobDomainError> {
        self.ensure_locked()?;
        if !self.is_lease_expired(now) {
            return Err(JobDomainError::LeaseStillActive(self.id));
        }
        Ok(self.charge_attempt(LEASE_EXPIRED_ERROR.to_owned(), now, now))
    }

    /// Marks the job succeeded. Repeated calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::AlreadyFinished`] when the job is terminally
    /// failed, or [`JobDomainError::NotLocked`] when it is still queued.
    pub fn mark_succeeded(&mut self, clock: &impl Clock) -> Result<SuccessOutcome, JobDomainError> {
        match self.status {
            JobStatus::Succeeded => Ok(SuccessOutcome::AlreadySucceeded),
            JobStatus::Failed => Err(JobDomainError::AlreadyFinished {
                job_id: self.id,
                status: self.status,
            }),
            JobStatus::Queued => Err(JobDomainError::NotLocked {
                job_id: self.id,
                status: self.status,
            }),
            JobStatus::Locked => {
                self.status = JobStatus::Succeeded;
                self.release_lease();
                self.updated_at = clock.utc();
                Ok(SuccessOutcome::Recorded)
            }
        }
    }

    /// Records a failed attempt.
    ///
    /// The job is requeued at `now + retry_in` while attempts remain, and
    /// terminally failed otherwise. `last_error` is kept in both cases.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::AlreadyFinished`] for terminal jobs or
    /// [`JobDomainError::NotLocked`] for queued jobs.
    pub fn record_failure(
        &mut self,
        error: impl Into<String>,
        retry_in: Duration,
        clock: &impl Clock,
    ) -> Result<FailureOutcome, JobDomainError> {
        self.ensure_locked()?;
        let now = clock.utc();
        Ok(self.charge_attempt(error.into(), offset(now, retry_in), now))
    }

    /// Checks that `worker_id` currently holds the job's lease.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::LeaseLost`] when the job is locked by
    /// another worker, and the usual status errors when it is not locked.
    pub fn ensure_held_by(&self, worker_id: &WorkerId) -> Result<(), JobDomainError> {
        self.ensure_locked()?;
        if self.locked_by.as_ref() != Some(worker_id) {
            return Err(JobDomainError::LeaseLost {
                job_id: self.id,
                worker_id: worker_id.clone(),
            });
        }
        Ok(())
    }

    fn ensure_locked(&self) -> Result<(), JobDomainError> {
        match self.status {
            JobStatus::Locked => Ok(()),
            JobStatus::Queued => Err(JobDomainError::NotLocked {
                job_id: self.id,
                status: self.status,
            }),
            JobStatus::Succeeded | JobStatus::Failed => Err(JobDomainError::AlreadyFinished {
                job_id: self.id,
                status: self.status,
            }),
        }
    }

    fn charge_attempt(
        &mut self,
        error: String,
        retry_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> FailureOutcome {
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = Some(error);
        self.release_lease();
        self.updated_at = now;
        if self.attempts < self.max_attempts {
            self.status = JobStatus::Queued;
            self.run_at = retry_at;
            FailureOutcome::Retrying { run_at: retry_at }
        } else {
            self.status = JobStatus::Failed;
            FailureOutcome::Exhausted
        }
    }

    fn release_lease(&mut self) {
        self.locked_by = None;
        self.locked_at = None;
        self.lease_expires_at = None;
    }
}

/// Adds a standard duration to an instant, saturating at the maximum.
pub(crate) fn offset(instant: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(delay)
        .ok()
        .and_then(|delta| instant.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
