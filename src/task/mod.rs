//! Scheduled tasks.
//!
//! Tasks are prompts that fire on a one-shot instant or a cron expression.
//! [`services::TaskScheduler`] turns due tasks into queued `run_task` jobs;
//! [`services::TaskLifecycleService`] manages tasks and applies the
//! bookkeeping that follows each run. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
