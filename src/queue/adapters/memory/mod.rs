//! In-memory adapters for the job queue.

mod store;

pub use store::InMemoryJobStore;
