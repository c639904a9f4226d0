//! HTTP entry points for worker invocation, scheduler ticks and triggers.
//!
//! | Route              | Auth              | Response                      |
//! |--------------------|-------------------|-------------------------------|
//! | `POST /worker/run` | `x-worker-secret` | `{results: [{jobId, ok, error?}]}` |
//! | `POST /scheduler/tick` | none (internal) | `{enqueued, failed}`        |
//! | `POST /jobs/trigger` | `x-worker-secret` | `{jobId}`                   |

use crate::queue::{
    domain::{DedupeKey, JobPayload},
    ports::JobStore,
    services::{EnqueueRequest, JobQueue, JobQueueError},
};
use crate::task::{ports::TaskRepository, services::TaskScheduler};
use crate::worker::services::{Worker, WorkerRun};
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Header carrying the shared worker secret.
pub const SECRET_HEADER: &str = "x-worker-secret";

/// Shared state of the HTTP surface.
pub struct HttpState<S, T, C>
where
    S: JobStore,
    T: TaskRepository,
    C: Clock + Send + Sync,
{
    worker: Arc<Worker<S, C>>,
    scheduler: Arc<TaskScheduler<T, S, C>>,
    queue: Arc<JobQueue<S, C>>,
    secret_digest: Arc<Vec<u8>>,
    allowed_types: Arc<BTreeSet<String>>,
}

impl<S, T, C> Clone for HttpState<S, T, C>
where
    S: JobStore,
    T: TaskRepository,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            worker: Arc::clone(&self.worker),
            scheduler: Arc::clone(&self.scheduler),
            queue: Arc::clone(&self.queue),
            secret_digest: Arc::clone(&self.secret_digest),
            allowed_types: Arc::clone(&self.allowed_types),
        }
    }
}

impl<S, T, C> HttpState<S, T, C>
where
    S: JobStore,
    T: TaskRepository,
    C: Clock + Send + Sync,
{
    /// Creates the state.
    #[must_use]
    pub fn new(
        worker: Worker<S, C>,
        scheduler: TaskScheduler<T, S, C>,
        queue: JobQueue<S, C>,
        secret: &str,
        allowed_types: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            worker: Arc::new(worker),
            scheduler: Arc::new(scheduler),
            queue: Arc::new(queue),
            secret_digest: Arc::new(Sha256::digest(secret.as_bytes()).to_vec()),
            allowed_types: Arc::new(allowed_types.into_iter().collect()),
        }
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let provided = headers
            .get(SECRET_HEADER)
            .map(|value| Sha256::digest(value.as_bytes()).to_vec());
        if provided.as_deref() == Some(self.secret_digest.as_slice()) {
            Ok(())
        } else {
            warn!("rejected request with missing or wrong worker secret");
            Err(ApiError::Unauthorized)
        }
    }
}

/// Builds the router.
pub fn router<S, T, C>(state: HttpState<S, T, C>) -> Router
where
    S: JobStore + 'static,
    T: TaskRepository + 'static,
    C: Clock + Send + Sync + 'static,
{
    Router::new()
        .route("/worker/run", post(run_worker::<S, T, C>))
        .route("/scheduler/tick", post(tick_scheduler::<S, T, C>))
        .route("/jobs/trigger", post(trigger_job::<S, T, C>))
        .with_state(state)
}

enum ApiError {
    Unauthorized,
    Forbidden(String),
    Unprocessable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_owned()),
            Self::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            Self::Unprocessable(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            Self::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn run_worker<S, T, C>(
    State(state): State<HttpState<S, T, C>>,
    headers: HeaderMap,
) -> Result<Json<WorkerRun>, ApiError>
where
    S: JobStore,
    T: TaskRepository,
    C: Clock + Send + Sync,
{
    state.authorize(&headers)?;
    state
        .worker
        .run_once()
        .await
        .map(Json)
        .map_err(|err| ApiError::Internal(err.to_string()))
}

#[derive(Debug, Serialize)]
struct TickResponse {
    enqueued: usize,
    failed: usize,
}

async fn tick_scheduler<S, T, C>(
    State(state): State<HttpState<S, T, C>>,
) -> Result<Json<TickResponse>, ApiError>
where
    S: JobStore,
    T: TaskRepository,
    C: Clock + Send + Sync,
{
    let report = state
        .scheduler
        .tick()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(Json(TickResponse {
        enqueued: report.enqueued_count(),
        failed: report.failed_count(),
    }))
}

/// Body of `POST /jobs/trigger`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerRequest {
    #[serde(rename = "type")]
    job_type: String,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    dedupe_key: Option<String>,
    #[serde(default)]
    run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    max_attempts: Option<u32>,
}

async fn trigger_job<S, T, C>(
    State(state): State<HttpState<S, T, C>>,
    headers: HeaderMap,
    Json(body): Json<TriggerRequest>,
) -> Result<Json<Value>, ApiError>
where
    S: JobStore,
    T: TaskRepository,
    C: Clock + Send + Sync,
{
    state.authorize(&headers)?;
    if !state.allowed_types.contains(&body.job_type) {
        return Err(ApiError::Forbidden(format!(
            "job type '{}' cannot be triggered",
            body.job_type
        )));
    }
    let raw_payload = body.payload.unwrap_or_else(|| Value::Object(Map::new()));
    let payload = JobPayload::from_parts(&body.job_type, &raw_payload)
        .map_err(|err| ApiError::Unprocessable(err.to_string()))?;
    let dedupe_key = match body.dedupe_key {
        Some(key) => DedupeKey::new(key).map_err(|err| ApiError::Unprocessable(err.to_string()))?,
        None => DedupeKey::for_trigger(&body.job_type, &payload.to_json()),
    };

    let mut request = EnqueueRequest::new(payload, dedupe_key);
    if let Some(run_at) = body.run_at {
        request = request.with_run_at(run_at);
    }
    if let Some(max_attempts) = body.max_attempts {
        request = request.with_max_attempts(max_attempts);
    }
    let outcome = state.queue.enqueue(request).await.map_err(|err| match err {
        JobQueueError::Domain(_) => ApiError::Unprocessable(err.to_string()),
        JobQueueError::Store(_) => ApiError::Internal(err.to_string()),
    })?;
    info!(job_type = body.job_type, job_id = %outcome.job_id(), created = outcome.is_new(), "job triggered");
    Ok(Json(json!({ "jobId": outcome.job_id() })))
}
