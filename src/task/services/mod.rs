//! Application services for scheduled tasks.

mod lifecycle;
mod scheduler;

pub use lifecycle::{
    CreateTaskRequest, ScheduleRequest, TaskLifecycleError, TaskLifecycleResult,
    TaskLifecycleService,
};
pub use scheduler::{
    DEFAULT_BATCH_LIMIT, DispatchedRun, SchedulerError, TaskScheduler, TickFailure, TickReport,
};
