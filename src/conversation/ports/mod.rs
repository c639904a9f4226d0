//! Port contracts for sessions and messages.

pub mod repository;

pub use repository::{
    ConversationRepository, ConversationRepositoryError, ConversationRepositoryResult,
};

#[cfg(test)]
pub use repository::MockConversationRepository;
