//! Identifier and validated scalar types for the job queue domain.

use super::JobDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Creates a new random job identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a job identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<Uuid> for JobId {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of one worker invocation holding job leases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(String);

impl WorkerId {
    /// Maximum persisted length of a worker identifier.
    pub const MAX_LENGTH: usize = 100;

    /// Creates a validated worker identifier.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::InvalidWorkerId`] when the value is blank or
    /// longer than [`WorkerId::MAX_LENGTH`].
    pub fn new(value: impl Into<String>) -> Result<Self, JobDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.len() > Self::MAX_LENGTH {
            return Err(JobDomainError::InvalidWorkerId(raw));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Generates a fresh identifier for a new worker invocation.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("worker-{}", Uuid::new_v4().simple()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for WorkerId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Globally unique idempotency key for an enqueue request.
///
/// Enqueueing twice with the same key yields one job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupeKey(String);

impl DedupeKey {
    /// Maximum persisted length of a dedupe key.
    pub const MAX_LENGTH: usize = 255;

    /// Creates a validated dedupe key.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::InvalidDedupeKey`] when the key is blank or
    /// longer than [`DedupeKey::MAX_LENGTH`].
    pub fn new(value: impl Into<String>) -> Result<Self, JobDomainError> {
        let raw = value.into();
        if raw.trim().is_empty() || raw.len() > Self::MAX_LENGTH {
            return Err(JobDomainError::InvalidDedupeKey(raw));
        }
        Ok(Self(raw))
    }

    /// Key for processing an inbound channel update.
    ///
    /// # Errors
    ///
    /// Returns [`JobDomainError::InvalidDedupeKey`] when the update identifier
    /// is blank or makes the key too long.
    pub fn for_inbound_update(channel_update_id: &str) -> Result<Self, JobDomainError> {
        if channel_update_id.trim().is_empty() {
            return Err(JobDomainError::InvalidDedupeKey(format!(
                "process_message:{channel_update_id}"
            )));
        }
        Self::new(format!("process_message:{channel_update_id}"))
    }

    /// Key for a scheduled task firing, bucketed by the due instant.
    ///
    /// Two ticks that observe the same due instant produce the same key.
    #[must_use]
    pub fn for_scheduled_run(task_id: Uuid, fire_epoch_seconds: i64) -> Self {
        Self(format!("run_task:{task_id}:{fire_epoch_seconds}"))
    }

    /// Key for an operator-requested task run.
    #[must_use]
    pub fn for_manual_run(task_id: Uuid, epoch_millis: i64) -> Self {
        Self(format!("run_task:{task_id}:manual:{epoch_millis}"))
    }

    /// Key derived from the content of an external trigger.
    ///
    /// The digest covers the job type and the canonical JSON of the payload,
    /// so identical triggers collapse into one job.
    #[must_use]
    pub fn for_trigger(job_type: &str, payload: &serde_json::Value) -> Self {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(job_type.as_bytes());
        hasher.update([0_u8]);
        hasher.update(payload.to_string().as_bytes());
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
        Self(format!("trigger:{hex}"))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DedupeKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for DedupeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
