//! Session cache tests.

use std::time::Duration;

use crate::conversation::{
    domain::{Session, SessionId},
    ports::MockConversationRepository,
};
use crate::clock::ManualClock;
use crate::worker::services::SessionCache;
use chrono::{TimeZone, Utc};
use eyre::{OptionExt, ensure};
use mockall::predicate::eq;
use rstest::rstest;

fn session() -> eyre::Result<Session> {
    let clock = ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0)
            .single()
            .ok_or_eyre("valid instant")?,
    );
    Ok(Session::new("telegram", "1001", &clock)?)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn loaded_session_is_served_from_cache() -> eyre::Result<()> {
    let session = session()?;
    let session_id = session.id();
    let mut repository = MockConversationRepository::new();
    repository
        .expect_find_session()
        .with(eq(session_id))
        .times(1)
        .returning(move |_| Ok(Some(session.clone())));
    let cache = SessionCache::new(16, Duration::from_secs(60));

    let first = cache.get_or_load(session_id, &repository).await?;
    let second = cache.get_or_load(session_id, &repository).await?;

    ensure!(first.is_some() && first == second, "same session both times");
    ensure!(cache.contains(session_id).await, "entry cached");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_session_is_not_cached() -> eyre::Result<()> {
    let session_id = SessionId::new();
    let mut repository = MockConversationRepository::new();
    repository
        .expect_find_session()
        .times(2)
        .returning(|_| Ok(None));
    let cache = SessionCache::default();

    ensure!(cache.get_or_load(session_id, &repository).await?.is_none(), "miss");
    ensure!(cache.get_or_load(session_id, &repository).await?.is_none(), "still a miss");
    ensure!(!cache.contains(session_id).await, "misses are not cached");
    Ok(())
}
