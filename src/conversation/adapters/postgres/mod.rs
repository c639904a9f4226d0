//! `PostgreSQL` adapters for sessions and messages.

mod models;
mod repository;
mod schema;

pub use repository::{ConversationPgPool, PostgresConversationRepository};
