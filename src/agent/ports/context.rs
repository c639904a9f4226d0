//! Long-term context port.

use crate::conversation::domain::SessionId;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Source of durable context (memories, notes) for a turn.
#[async_trait]
pub trait ContextSource: Send + Sync {
    /// Returns context snippets relevant to `query` for a session.
    async fn long_term_context(
        &self,
        session_id: SessionId,
        query: &str,
    ) -> Result<Vec<String>, ContextError>;
}

/// Errors raised while loading long-term context.
#[derive(Debug, Clone, Error)]
pub enum ContextError {
    /// Persistence-layer failure.
    #[error("context persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl ContextError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
