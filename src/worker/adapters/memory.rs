//! In-memory embedding refresher.

use crate::queue::domain::EmbedTarget;
use crate::worker::ports::{EmbeddingError, EmbeddingRefresher};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Refresher that records requested rows instead of calling a provider.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEmbeddingRefresher {
    refreshed: Arc<RwLock<Vec<(EmbedTarget, Uuid)>>>,
}

fn poisoned(err: impl std::fmt::Display) -> EmbeddingError {
    EmbeddingError::provider(std::io::Error::other(err.to_string()))
}

impl InMemoryEmbeddingRefresher {
    /// Creates an empty refresher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every refreshed row in request order.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError::Provider`] when the lock is poisoned.
    pub fn refreshed(&self) -> Result<Vec<(EmbedTarget, Uuid)>, EmbeddingError> {
        let refreshed = self.refreshed.read().map_err(poisoned)?;
        Ok(refreshed.clone())
    }
}

#[async_trait]
impl EmbeddingRefresher for InMemoryEmbeddingRefresher {
    async fn refresh(&self, target: EmbedTarget, row_id: Uuid) -> Result<(), EmbeddingError> {
        let mut refreshed = self.refreshed.write().map_err(poisoned)?;
        refreshed.push((target, row_id));
        Ok(())
    }
}
