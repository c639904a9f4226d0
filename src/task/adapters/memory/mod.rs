//! In-memory adapters for scheduled tasks.

mod task;

pub use task::InMemoryTaskRepository;
