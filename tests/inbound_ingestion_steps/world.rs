//! Shared world state for inbound ingestion BDD scenarios.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use concierge::agent::{
    adapters::{InMemoryContextSource, ScriptedModel},
    services::TurnExecutor,
};
use concierge::channel::adapters::RecordingChannel;
use concierge::clock::ManualClock;
use concierge::conversation::{
    adapters::memory::InMemoryConversationRepository,
    services::{InboundEnvelope, IngestionError, IngestionOutcome, IngestionService},
};
use concierge::delivery::services::ReplyService;
use concierge::queue::{adapters::memory::InMemoryJobStore, services::JobQueue};
use concierge::task::{adapters::memory::InMemoryTaskRepository, services::TaskLifecycleService};
use concierge::worker::{
    adapters::InMemoryEmbeddingRefresher,
    services::{ConciergeJobHandler, Worker},
};
use rstest::fixture;

/// Ingestion service type used by the BDD world.
pub type TestIngestionService =
    IngestionService<InMemoryConversationRepository, InMemoryJobStore, ManualClock>;

/// Scenario world for inbound ingestion behaviour tests.
pub struct IngestionWorld {
    pub clock: ManualClock,
    pub jobs: Arc<InMemoryJobStore>,
    pub conversations: Arc<InMemoryConversationRepository>,
    pub queue: JobQueue<InMemoryJobStore, ManualClock>,
    pub service: TestIngestionService,
    pub model: ScriptedModel,
    pub channel: RecordingChannel,
    /// Envelope the scenario delivers.
    pub pending: Option<InboundEnvelope>,
    /// Result of the last ingestion attempt.
    pub last_result: Option<Result<IngestionOutcome, IngestionError>>,
}

impl IngestionWorld {
    /// Creates a world whose clock reads 2023-12-31T23:00:00Z.
    #[must_use]
    pub fn new() -> Self {
        let clock = ManualClock::new(
            Utc.with_ymd_and_hms(2023, 12, 31, 23, 0, 0)
                .single()
                .unwrap_or_default(),
        );
        let shared = Arc::new(clock.clone());
        let jobs = Arc::new(InMemoryJobStore::new());
        let conversations = Arc::new(InMemoryConversationRepository::new());
        let queue = JobQueue::new(Arc::clone(&jobs), Arc::clone(&shared));
        Self {
            service: IngestionService::new(Arc::clone(&conversations), queue.clone(), shared),
            clock,
            jobs,
            conversations,
            queue,
            model: ScriptedModel::new(),
            channel: RecordingChannel::new(),
            pending: None,
            last_result: None,
        }
    }

    /// Worker answering inbound messages through the scripted model.
    #[must_use]
    pub fn worker(&self) -> Worker<InMemoryJobStore, ManualClock> {
        let clock = Arc::new(self.clock.clone());
        let executor = TurnExecutor::new(
            Arc::clone(&self.conversations),
            Arc::new(self.model.clone()),
            Arc::new(InMemoryContextSource::new()),
            Arc::new(self.channel.clone()),
            Arc::clone(&clock),
        );
        let replies = ReplyService::new(
            Arc::clone(&self.conversations),
            executor,
            Arc::new(self.channel.clone()),
            Arc::clone(&clock),
        );
        let tasks = TaskLifecycleService::new(
            Arc::new(InMemoryTaskRepository::new()),
            self.queue.clone(),
            Arc::clone(&clock),
        );
        let handler = ConciergeJobHandler::new(
            replies,
            tasks,
            Arc::new(InMemoryEmbeddingRefresher::new()),
            clock,
        );
        Worker::new(self.queue.clone(), Arc::new(handler))
    }
}

impl Default for IngestionWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> IngestionWorld {
    IngestionWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
