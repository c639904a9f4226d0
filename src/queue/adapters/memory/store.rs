//! In-memory job store for tests and single-process use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::warn;

use crate::queue::{
    domain::{DedupeKey, FailureOutcome, Job, JobId, WorkerId},
    ports::{ClaimRequest, InsertOutcome, JobStore, JobStoreError, JobStoreResult},
};

/// Thread-safe in-memory job store.
///
/// A single write lock around each claim round gives the same exclusivity
/// as row locking with `SKIP LOCKED`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJobStore {
    state: Arc<RwLock<InMemoryJobState>>,
}

#[derive(Debug, Default)]
struct InMemoryJobState {
    jobs: HashMap<JobId, Job>,
    dedupe_index: HashMap<DedupeKey, JobId>,
}

impl InMemoryJobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every stored job ordered by creation time.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::Persistence`] when the lock is poisoned.
    pub fn snapshot(&self) -> JobStoreResult<Vec<Job>> {
        let state = self
            .state
            .read()
            .map_err(|err| JobStoreError::persistence(std::io::Error::other(err.to_string())))?;
        let mut jobs: Vec<Job> = state.jobs.values().cloned().collect();
        jobs.sort_by_key(|job| (job.created_at(), job.id()));
        Ok(jobs)
    }
}

fn expire_stale_leases(state: &mut InMemoryJobState, request: &ClaimRequest) -> JobStoreResult<()> {
    let expired: Vec<JobId> = state
        .jobs
        .values()
        .filter(|job| job.is_lease_expired(request.now))
        .map(Job::id)
        .collect();
    for job_id in expired {
        let Some(job) = state.jobs.get_mut(&job_id) else {
            continue;
        };
        if job.expire_lease(request.now)? == FailureOutcome::Exhausted {
            warn!(job_id = %job_id, job_type = job.job_type(), "lease expired on final attempt");
        }
    }
    Ok(())
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert_if_absent(&self, job: &Job) -> JobStoreResult<InsertOutcome> {
        let mut state = self
            .state
            .write()
            .map_err(|err| JobStoreError::persistence(std::io::Error::other(err.to_string())))?;
        if let Some(existing) = state.dedupe_index.get(job.dedupe_key()) {
            return Ok(InsertOutcome::Existing(*existing));
        }
        state.dedupe_index.insert(job.dedupe_key().clone(), job.id());
        state.jobs.insert(job.id(), job.clone());
        Ok(InsertOutcome::Inserted(job.id()))
    }

    async fn claim(&self, request: &ClaimRequest) -> JobStoreResult<Vec<Job>> {
        let mut state = self
            .state
            .write()
            .map_err(|err| JobStoreError::persistence(std::io::Error::other(err.to_string())))?;
        expire_stale_leases(&mut state, request)?;

        let mut ready: Vec<(DateTime<Utc>, DateTime<Utc>, JobId)> = state
            .jobs
            .values()
            .filter(|job| job.is_ready(request.now))
            .map(|job| (job.run_at(), job.created_at(), job.id()))
            .collect();
        ready.sort_unstable();

        let mut claimed = Vec::new();
        for (_, _, job_id) in ready.into_iter().take(request.max_jobs) {
            let Some(job) = state.jobs.get_mut(&job_id) else {
                continue;
            };
            job.claim(&request.worker_id, request.now, request.lease)?;
            claimed.push(job.clone());
        }
        Ok(claimed)
    }

    async fn find_by_id(&self, id: JobId) -> JobStoreResult<Option<Job>> {
        let state = self
            .state
            .read()
            .map_err(|err| JobStoreError::persistence(std::io::Error::other(err.to_string())))?;
        Ok(state.jobs.get(&id).cloned())
    }

    async fn find_by_dedupe_key(&self, key: &DedupeKey) -> JobStoreResult<Option<Job>> {
        let state = self
            .state
            .read()
            .map_err(|err| JobStoreError::persistence(std::io::Error::other(err.to_string())))?;
        Ok(state
            .dedupe_index
            .get(key)
            .and_then(|job_id| state.jobs.get(job_id))
            .cloned())
    }

    async fn update_held(&self, job: &Job, holder: &WorkerId) -> JobStoreResult<()> {
        let mut state = self
            .state
            .write()
            .map_err(|err| JobStoreError::persistence(std::io::Error::other(err.to_string())))?;
        let slot = state
            .jobs
            .get_mut(&job.id())
            .ok_or(JobStoreError::NotFound(job.id()))?;
        slot.ensure_held_by(holder)?;
        *slot = job.clone();
        Ok(())
    }
}
