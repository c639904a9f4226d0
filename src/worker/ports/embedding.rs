//! Embedding refresh port for `embed_*` jobs.

use crate::queue::domain::EmbedTarget;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Recomputes the stored embedding of one row.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingRefresher: Send + Sync {
    /// Refreshes the embedding of `row_id` in the `target` table.
    async fn refresh(&self, target: EmbedTarget, row_id: Uuid) -> Result<(), EmbeddingError>;
}

/// Errors raised while refreshing embeddings.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    /// The row no longer exists.
    #[error("{target} row not found: {row_id}")]
    RowNotFound {
        /// Table addressed.
        target: &'static str,
        /// Missing row.
        row_id: Uuid,
    },

    /// The embedding provider failed.
    #[error("embedding provider error: {0}")]
    Provider(Arc<dyn std::error::Error + Send + Sync>),
}

impl EmbeddingError {
    /// Wraps a provider error.
    pub fn provider(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Provider(Arc::new(err))
    }
}
