//! Bounded, TTL-evicting session cache.

use crate::conversation::{
    domain::{Session, SessionId},
    ports::{ConversationRepository, ConversationRepositoryError},
};
use moka::future::Cache;
use std::time::Duration;

/// Default maximum number of cached sessions.
pub const DEFAULT_SESSION_CACHE_CAPACITY: u64 = 1_000;
/// Default lifetime of a cached session.
pub const DEFAULT_SESSION_CACHE_TTL: Duration = Duration::from_secs(600);

/// Process-local cache of session rows.
///
/// Sessions are immutable once created, so a stale entry is never wrong;
/// the cache only saves a lookup.
#[derive(Debug, Clone)]
pub struct SessionCache {
    sessions: Cache<SessionId, Session>,
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_CACHE_CAPACITY, DEFAULT_SESSION_CACHE_TTL)
    }
}

impl SessionCache {
    /// Creates a cache with the given bounds.
    #[must_use]
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            sessions: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Returns the session, loading it from `repository` on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`ConversationRepositoryError`] when the lookup fails.
    pub async fn get_or_load<R>(
        &self,
        session_id: SessionId,
        repository: &R,
    ) -> Result<Option<Session>, ConversationRepositoryError>
    where
        R: ConversationRepository + ?Sized,
    {
        if let Some(session) = self.sessions.get(&session_id).await {
            return Ok(Some(session));
        }
        let loaded = repository.find_session(session_id).await?;
        if let Some(session) = &loaded {
            self.sessions.insert(session_id, session.clone()).await;
        }
        Ok(loaded)
    }

    /// Returns `true` when the session is cached.
    pub async fn contains(&self, session_id: SessionId) -> bool {
        self.sessions.get(&session_id).await.is_some()
    }
}
