//! Shared world state for scheduled task BDD scenarios.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use concierge::agent::{
    adapters::{InMemoryContextSource, ScriptedModel},
    services::TurnExecutor,
};
use concierge::channel::adapters::RecordingChannel;
use concierge::clock::ManualClock;
use concierge::conversation::{adapters::memory::InMemoryConversationRepository, domain::Session};
use concierge::delivery::services::ReplyService;
use concierge::queue::{adapters::memory::InMemoryJobStore, services::JobQueue};
use concierge::task::{
    adapters::memory::InMemoryTaskRepository,
    domain::Task,
    services::{TaskLifecycleError, TaskLifecycleService, TaskScheduler, TickReport},
};
use concierge::worker::{
    adapters::InMemoryEmbeddingRefresher,
    services::{ConciergeJobHandler, Worker},
};
use rstest::fixture;

/// Lifecycle service type used by the BDD world.
pub type TestTaskService =
    TaskLifecycleService<InMemoryTaskRepository, InMemoryJobStore, ManualClock>;

/// Scenario world for scheduled task behaviour tests.
pub struct ScheduledTaskWorld {
    pub clock: ManualClock,
    pub tasks: Arc<InMemoryTaskRepository>,
    pub conversations: Arc<InMemoryConversationRepository>,
    pub queue: JobQueue<InMemoryJobStore, ManualClock>,
    pub service: TestTaskService,
    pub model: ScriptedModel,
    pub session: Option<Session>,
    pub last_task: Option<Task>,
    pub last_create_result: Option<Result<Task, TaskLifecycleError>>,
    pub last_tick: Option<TickReport>,
}

impl ScheduledTaskWorld {
    /// Creates a world whose clock reads 2023-12-31T23:00:00Z.
    #[must_use]
    pub fn new() -> Self {
        let clock = ManualClock::new(
            Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0)
                .single()
                .unwrap_or_default(),
        );
        let shared = Arc::new(clock.clone());
        let tasks = Arc::new(InMemoryTaskRepository::new());
        let queue = JobQueue::new(Arc::new(InMemoryJobStore::new()), Arc::clone(&shared));
        Self {
            service: TaskLifecycleService::new(Arc::clone(&tasks), queue.clone(), shared),
            clock,
            tasks,
            conversations: Arc::new(InMemoryConversationRepository::new()),
            queue,
            model: ScriptedModel::new(),
            session: None,
            last_task: None,
            last_create_result: None,
            last_tick: None,
        }
    }

    /// Scheduler sharing the world's repository, queue and clock.
    #[must_use]
    pub fn scheduler(&self) -> TaskScheduler<InMemoryTaskRepository, InMemoryJobStore, ManualClock> {
        TaskScheduler::new(
            Arc::clone(&self.tasks),
            self.queue.clone(),
            Arc::new(self.clock.clone()),
        )
    }

    /// Worker wired to a scripted model and a recording channel.
    #[must_use]
    pub fn worker(&self) -> Worker<InMemoryJobStore, ManualClock> {
        let clock = Arc::new(self.clock.clone());
        let channel = Arc::new(RecordingChannel::new());
        let executor = TurnExecutor::new(
            Arc::clone(&self.conversations),
            Arc::new(self.model.clone()),
            Arc::new(InMemoryContextSource::new()),
            channel.clone(),
            Arc::clone(&clock),
        );
        let replies = ReplyService::new(
            Arc::clone(&self.conversations),
            executor,
            channel,
            Arc::clone(&clock),
        );
        let handler = ConciergeJobHandler::new(
            replies,
            self.service.clone(),
            Arc::new(InMemoryEmbeddingRefresher::new()),
            clock,
        );
        Worker::new(self.queue.clone(), Arc::new(handler))
    }
}

impl Default for ScheduledTaskWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> ScheduledTaskWorld {
    ScheduledTaskWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
