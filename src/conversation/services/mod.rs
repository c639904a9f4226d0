//! Application services for conversations.

mod ingestion;

pub use ingestion::{IngestionError, IngestionOutcome, IngestionService, InboundEnvelope};
