//! Domain model for the durable job queue.
//!
//! Jobs move `queued → locked → succeeded`, or back to `queued` with a later
//! `run_at` on a retryable failure, or to `failed` once their attempt budget
//! is spent. Claiming is the only way into `locked`; an expired lease sends a
//! job back through the failure path.

mod error;
mod ids;
mod job;
mod payload;
mod retry;

pub use error::{JobDomainError, ParseJobStatusError, PayloadError};
pub use ids::{DedupeKey, JobId, WorkerId};
pub(crate) use job::offset;
pub use job::{
    FailureOutcome, Job, JobStatus, LEASE_EXPIRED_ERROR, NewJob, PersistedJobData, SuccessOutcome,
};
pub use payload::{
    EMBED_PREFIX, EmbedTarget, JobPayload, PROCESS_MESSAGE, ProcessMessagePayload, RUN_TASK,
    RunTaskPayload, TRIGGER,
};
pub use retry::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BASE, DEFAULT_RETRY_MAX, RetryPolicy};
