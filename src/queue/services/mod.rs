//! Application services for the job queue.

mod queue;

pub use queue::{
    EnqueueRequest, FailureReport, JobQueue, JobQueueError, JobQueueResult, QueueSettings,
};
