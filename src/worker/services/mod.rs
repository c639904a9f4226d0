//! Worker services: dispatch loop, job routing and the session cache.

mod cache;
mod dispatch;
mod handlers;

pub use cache::{DEFAULT_SESSION_CACHE_CAPACITY, DEFAULT_SESSION_CACHE_TTL, SessionCache};
pub use dispatch::{
    DEFAULT_BATCH_SIZE, DEFAULT_JOB_TIMEOUT, DEFAULT_LEASE, JobReport, Worker, WorkerError,
    WorkerRun, WorkerSettings,
};
pub use handlers::{ConciergeJobHandler, task_update_id};
