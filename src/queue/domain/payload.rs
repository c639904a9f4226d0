//! Typed job payloads keyed by job type.
//!
//! Jobs are stored with a raw type string and a JSON payload. Each type has
//! exactly one payload shape; [`JobPayload::from_parts`] validates the pair
//! at dispatch time and [`JobPayload::job_type`]/[`JobPayload::to_json`]
//! produce it at enqueue time.

use super::PayloadError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

/// Job type string for inbound message processing.
pub const PROCESS_MESSAGE: &str = "process_message";
/// Job type string for scheduled task runs.
pub const RUN_TASK: &str = "run_task";
/// Job type string for external no-op triggers.
pub const TRIGGER: &str = "trigger";
/// Prefix shared by every embedding refresh job type.
pub const EMBED_PREFIX: &str = "embed_";

/// Row family whose embedding is recomputed by an `embed_*` job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedTarget {
    /// Conversation message rows.
    Message,
    /// Long-term memory rows.
    Memory,
}

impl EmbedTarget {
    /// Returns the canonical target name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Memory => "memory",
        }
    }

    /// Returns the job type string for this target.
    #[must_use]
    pub const fn job_type(self) -> &'static str {
        match self {
            Self::Message => "embed_message",
            Self::Memory => "embed_memory",
        }
    }

    fn from_job_type(job_type: &str) -> Option<Self> {
        match job_type.strip_prefix(EMBED_PREFIX)? {
            "message" => Some(Self::Message),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Payload of a `process_message` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMessagePayload {
    /// Inbound message row to answer.
    pub message_id: Uuid,
}

/// Payload of a `run_task` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTaskPayload {
    /// Task being fired.
    pub task_id: Uuid,
    /// Prompt captured when the job was enqueued.
    pub prompt: String,
    /// Session the task reports into.
    pub session_id: Uuid,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmbedBody {
    row_id: Uuid,
}

/// Tagged sum of every payload the worker understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPayload {
    /// Answer an inbound user message.
    ProcessMessage(ProcessMessagePayload),
    /// Fire a scheduled task.
    RunTask(RunTaskPayload),
    /// Recompute one row's embedding.
    Embed {
        /// Row family.
        target: EmbedTarget,
        /// Row identifier.
        row_id: Uuid,
    },
    /// Acknowledge an external kick; carries opaque data.
    Trigger(Value),
}

impl JobPayload {
    /// Builds a `process_message` payload.
    #[must_use]
    pub const fn process_message(message_id: Uuid) -> Self {
        Self::ProcessMessage(ProcessMessagePayload { message_id })
    }

    /// Builds a `run_task` payload.
    #[must_use]
    pub fn run_task(task_id: Uuid, prompt: impl Into<String>, session_id: Uuid) -> Self {
        Self::RunTask(RunTaskPayload {
            task_id,
            prompt: prompt.into(),
            session_id,
        })
    }

    /// Returns the job type string this payload is stored under.
    #[must_use]
    pub const fn job_type(&self) -> &'static str {
        match self {
            Self::ProcessMessage(_) => PROCESS_MESSAGE,
            Self::RunTask(_) => RUN_TASK,
            Self::Embed { target, .. } => target.job_type(),
            Self::Trigger(_) => TRIGGER,
        }
    }

    /// Encodes the payload body as JSON.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::ProcessMessage(payload) => json!({ "messageId": payload.message_id }),
            Self::RunTask(payload) => json!({
                "taskId": payload.task_id,
                "prompt": payload.prompt,
                "sessionId": payload.session_id,
            }),
            Self::Embed { row_id, .. } => json!({ "rowId": row_id }),
            Self::Trigger(value) => value.clone(),
        }
    }

    /// Decodes a stored `(type, payload)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::UnknownType`] for unrecognised types and
    /// [`PayloadError::InvalidPayload`] when the JSON does not match the
    /// type's shape.
    pub fn from_parts(job_type: &str, payload: &Value) -> Result<Self, PayloadError> {
        let invalid = |err: serde_json::Error| PayloadError::InvalidPayload {
            job_type: job_type.to_owned(),
            reason: err.to_string(),
        };
        match job_type {
            PROCESS_MESSAGE => ProcessMessagePayload::deserialize(payload)
                .map(Self::ProcessMessage)
                .map_err(invalid),
            RUN_TASK => {
                let decoded = RunTaskPayload::deserialize(payload).map_err(invalid)?;
                if decoded.prompt.trim().is_empty() {
                    return Err(PayloadError::InvalidPayload {
                        job_type: job_type.to_owned(),
                        reason: "prompt must not be empty".to_owned(),
                    });
                }
                Ok(Self::RunTask(decoded))
            }
            TRIGGER => Ok(Self::Trigger(payload.clone())),
            other => {
                let target = EmbedTarget::from_job_type(other)
                    .ok_or_else(|| PayloadError::UnknownType(other.to_owned()))?;
                let decoded = EmbedBody::deserialize(payload).map_err(invalid)?;
                Ok(Self::Embed {
                    target,
                    row_id: decoded.row_id,
                })
            }
        }
    }
}
