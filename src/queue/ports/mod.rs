//! Port contracts for the job queue.

pub mod store;

pub use store::{ClaimRequest, InsertOutcome, JobStore, JobStoreError, JobStoreResult};
