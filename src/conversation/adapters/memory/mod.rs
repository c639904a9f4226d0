//! In-memory adapters for sessions and messages.

mod repository;

pub use repository::InMemoryConversationRepository;
