//! In-memory long-term context store.

use crate::agent::ports::{ContextError, ContextSource};
use crate::conversation::domain::SessionId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Context source returning fixed snippets per session.
///
/// Every snippet of the session is returned regardless of the query;
/// ranking is the real store's concern.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContextSource {
    snippets: Arc<RwLock<HashMap<SessionId, Vec<String>>>>,
}

fn poisoned(err: impl std::fmt::Display) -> ContextError {
    ContextError::persistence(std::io::Error::other(err.to_string()))
}

impl InMemoryContextSource {
    /// Creates an empty context source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a snippet for a session.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Persistence`] when the lock is poisoned.
    pub fn remember(&self, session_id: SessionId, snippet: impl Into<String>) -> Result<(), ContextError> {
        let mut snippets = self.snippets.write().map_err(poisoned)?;
        snippets.entry(session_id).or_default().push(snippet.into());
        Ok(())
    }
}

#[async_trait]
impl ContextSource for InMemoryContextSource {
    async fn long_term_context(
        &self,
        session_id: SessionId,
        _query: &str,
    ) -> Result<Vec<String>, ContextError> {
        let snippets = self.snippets.read().map_err(poisoned)?;
        Ok(snippets.get(&session_id).cloned().unwrap_or_default())
    }
}
