//! Error types for job queue domain validation and parsing.

use super::{JobId, JobStatus, WorkerId};
use thiserror::Error;

/// Errors returned while constructing or transitioning jobs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobDomainError {
    /// The dedupe key is blank or too long.
    #[error("invalid dedupe key '{0}'")]
    InvalidDedupeKey(String),

    /// The worker identifier is blank or too long.
    #[error("invalid worker identifier '{0}'")]
    InvalidWorkerId(String),

    /// A job must allow at least one attempt.
    #[error("max attempts must be at least 1, got {0}")]
    InvalidMaxAttempts(u32),

    /// The job is not currently held under a lease.
    #[error("job {job_id} is not locked (status: {status})")]
    NotLocked {
        /// Job that was expected to be locked.
        job_id: JobId,
        /// Status found instead.
        status: JobStatus,
    },

    /// The job cannot be claimed in its current state.
    #[error("job {job_id} is not claimable (status: {status})")]
    NotClaimable {
        /// Job that was offered for claiming.
        job_id: JobId,
        /// Status found instead.
        status: JobStatus,
    },

    /// The job has already reached a terminal status.
    #[error("job {job_id} already finished with status {status}")]
    AlreadyFinished {
        /// Finished job.
        job_id: JobId,
        /// Terminal status.
        status: JobStatus,
    },

    /// The job's lease has not yet expired.
    #[error("lease on job {0} is still active")]
    LeaseStillActive(JobId),

    /// The reporting worker no longer holds the job's lease.
    #[error("worker {worker_id} no longer holds the lease on job {job_id}")]
    LeaseLost {
        /// Job being reported on.
        job_id: JobId,
        /// Worker that sent the stale report.
        worker_id: WorkerId,
    },
}

/// Error returned while parsing job statuses from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown job status: {0}")]
pub struct ParseJobStatusError(pub String);

/// Errors raised while decoding or encoding typed job payloads.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayloadError {
    /// The job type is not handled by this system.
    #[error("unknown job type: {0}")]
    UnknownType(String),

    /// The payload does not match the shape required by its type.
    #[error("invalid payload for job type {job_type}: {reason}")]
    InvalidPayload {
        /// Job type whose payload failed validation.
        job_type: String,
        /// Decoder diagnostic.
        reason: String,
    },
}
