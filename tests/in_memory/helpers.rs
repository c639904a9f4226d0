//! Shared wiring for in-memory integration tests.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use concierge::agent::{
    adapters::{InMemoryContextSource, ScriptedModel},
    domain::TurnSettings,
    services::TurnExecutor,
};
use concierge::channel::adapters::RecordingChannel;
use concierge::clock::ManualClock;
use concierge::conversation::{
    adapters::memory::InMemoryConversationRepository, services::IngestionService,
};
use concierge::delivery::services::ReplyService;
use concierge::queue::{adapters::memory::InMemoryJobStore, services::JobQueue};
use concierge::task::{
    adapters::memory::InMemoryTaskRepository,
    services::{TaskLifecycleService, TaskScheduler},
};
use concierge::worker::{
    adapters::InMemoryEmbeddingRefresher,
    services::{ConciergeJobHandler, Worker},
};
use rstest::fixture;

/// Handler type produced by [`Stack::handler`].
pub type StackHandler = ConciergeJobHandler<
    InMemoryConversationRepository,
    InMemoryTaskRepository,
    InMemoryJobStore,
    ManualClock,
>;

/// Every service of the execution core over in-memory adapters and one
/// shared manual clock.
pub struct Stack {
    pub clock: ManualClock,
    pub jobs: Arc<InMemoryJobStore>,
    pub tasks: Arc<InMemoryTaskRepository>,
    pub conversations: Arc<InMemoryConversationRepository>,
    pub model: ScriptedModel,
    pub context: InMemoryContextSource,
    pub channel: RecordingChannel,
    pub queue: JobQueue<InMemoryJobStore, ManualClock>,
    pub ingestion: IngestionService<InMemoryConversationRepository, InMemoryJobStore, ManualClock>,
    pub lifecycle: TaskLifecycleService<InMemoryTaskRepository, InMemoryJobStore, ManualClock>,
}

/// Instant every stack starts at.
#[must_use]
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0)
        .single()
        .unwrap_or_default()
}

impl Stack {
    /// Wires a fresh stack.
    #[must_use]
    pub fn new() -> Self {
        let clock = ManualClock::new(epoch());
        let shared = Arc::new(clock.clone());
        let jobs = Arc::new(InMemoryJobStore::new());
        let tasks = Arc::new(InMemoryTaskRepository::new());
        let conversations = Arc::new(InMemoryConversationRepository::new());
        let queue = JobQueue::new(Arc::clone(&jobs), Arc::clone(&shared));
        Self {
            ingestion: IngestionService::new(
                Arc::clone(&conversations),
                queue.clone(),
                Arc::clone(&shared),
            ),
            lifecycle: TaskLifecycleService::new(Arc::clone(&tasks), queue.clone(), shared),
            clock,
            jobs,
            tasks,
            conversations,
            model: ScriptedModel::new(),
            context: InMemoryContextSource::new(),
            channel: RecordingChannel::new(),
            queue,
        }
    }

    fn shared_clock(&self) -> Arc<ManualClock> {
        Arc::new(self.clock.clone())
    }

    /// Scheduler over the stack's task repository.
    #[must_use]
    pub fn scheduler(&self) -> TaskScheduler<InMemoryTaskRepository, InMemoryJobStore, ManualClock> {
        TaskScheduler::new(Arc::clone(&self.tasks), self.queue.clone(), self.shared_clock())
    }

    /// Reply service with the given turn settings.
    #[must_use]
    pub fn replies(
        &self,
        settings: TurnSettings,
    ) -> ReplyService<InMemoryConversationRepository, ManualClock> {
        let executor = TurnExecutor::new(
            Arc::clone(&self.conversations),
            Arc::new(self.model.clone()),
            Arc::new(self.context.clone()),
            Arc::new(self.channel.clone()),
            self.shared_clock(),
        )
        .with_settings(settings);
        ReplyService::new(
            Arc::clone(&self.conversations),
            executor,
            Arc::new(self.channel.clone()),
            self.shared_clock(),
        )
    }

    /// Production job handler with the given turn settings.
    #[must_use]
    pub fn handler(&self, settings: TurnSettings) -> StackHandler {
        ConciergeJobHandler::new(
            self.replies(settings),
            self.lifecycle.clone(),
            Arc::new(InMemoryEmbeddingRefresher::new()),
            self.shared_clock(),
        )
    }

    /// Worker using default turn settings.
    #[must_use]
    pub fn worker(&self) -> Worker<InMemoryJobStore, ManualClock> {
        self.worker_with(TurnSettings::default())
    }

    /// Worker using the given turn settings.
    #[must_use]
    pub fn worker_with(&self, settings: TurnSettings) -> Worker<InMemoryJobStore, ManualClock> {
        Worker::new(self.queue.clone(), Arc::new(self.handler(settings)))
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture providing a fresh stack.
#[fixture]
pub fn stack() -> Stack {
    Stack::default()
}
