//! In-memory repository tests for session upsert and message history.

use crate::clock::ManualClock;
use crate::conversation::{
    adapters::memory::InMemoryConversationRepository,
    domain::{InboundMessage, Message, Role, Session},
    ports::{ConversationRepository, ConversationRepositoryError},
};
use chrono::{Duration, TimeZone, Utc};
use eyre::ensure;
use rstest::{fixture, rstest};
use serde_json::json;

#[fixture]
fn clock() -> ManualClock {
    ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0)
            .single()
            .expect("valid instant"),
    )
}

fn user_message(session: &Session, content: &str, update_id: &str, clock: &ManualClock) -> Message {
    Message::inbound(
        InboundMessage {
            session_id: session.id(),
            role: Role::User,
            content: content.to_owned(),
            file_id: None,
            channel_update_id: update_id.to_owned(),
            channel_message_id: None,
            channel_from_user_id: None,
        },
        clock,
    )
    .expect("valid inbound")
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn upsert_returns_existing_session(clock: ManualClock) -> eyre::Result<()> {
    let repo = InMemoryConversationRepository::new();
    let first = repo
        .upsert_session(&Session::new("telegram", "1001", &clock)?)
        .await?;
    let second = repo
        .upsert_session(&Session::new("telegram", "1001", &clock)?)
        .await?;
    ensure!(first.id() == second.id(), "same chat must map to one session");
    ensure!(repo.sessions()?.len() == 1, "expected one stored session");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_update_in_same_session_is_rejected(clock: ManualClock) -> eyre::Result<()> {
    let repo = InMemoryConversationRepository::new();
    let session = repo
        .upsert_session(&Session::new("telegram", "1001", &clock)?)
        .await?;
    repo.insert_message(&user_message(&session, "hi", "42", &clock))
        .await?;
    let result = repo
        .insert_message(&user_message(&session, "hi again", "42", &clock))
        .await;
    ensure!(
        matches!(
            result,
            Err(ConversationRepositoryError::DuplicateChannelUpdate { .. })
        ),
        "expected duplicate update error, got {result:?}"
    );

    let other = repo
        .upsert_session(&Session::new("telegram", "2002", &clock)?)
        .await?;
    repo.insert_message(&user_message(&other, "hi", "42", &clock))
        .await?;
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn history_skips_tool_calls_and_pending_replies(clock: ManualClock) -> eyre::Result<()> {
    let repo = InMemoryConversationRepository::new();
    let session = repo
        .upsert_session(&Session::new("telegram", "1001", &clock)?)
        .await?;

    let first = user_message(&session, "one", "1", &clock);
    repo.insert_message(&first).await?;
    clock.advance(Duration::seconds(1));
    let mut answered = Message::reply_placeholder(&first, &clock);
    answered.record_generated("reply one", &clock);
    repo.insert_message(&answered).await?;
    let call = Message::tool_call_started(
        session.id(),
        Some(first.id()),
        "call-1",
        "search",
        json!({}),
        &clock,
    );
    repo.insert_message(&call).await?;

    let second = user_message(&session, "two", "2", &clock);
    repo.insert_message(&second).await?;
    repo.insert_message(&Message::reply_placeholder(&second, &clock))
        .await?;

    let history = repo.recent_history(session.id(), 30).await?;
    let contents: Vec<&str> = history.iter().map(Message::content).collect();
    ensure!(
        contents == ["one", "reply one", "two"],
        "unexpected history {contents:?}"
    );

    let latest = repo.recent_history(session.id(), 2).await?;
    let latest_contents: Vec<&str> = latest.iter().map(Message::content).collect();
    ensure!(
        latest_contents == ["reply one", "two"],
        "limit must keep the newest rows, got {latest_contents:?}"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn find_reply_to_ignores_tool_call_rows(clock: ManualClock) -> eyre::Result<()> {
    let repo = InMemoryConversationRepository::new();
    let session = repo
        .upsert_session(&Session::new("telegram", "1001", &clock)?)
        .await?;
    let inbound = user_message(&session, "hello", "5", &clock);
    repo.insert_message(&inbound).await?;
    repo.insert_message(&Message::tool_call_started(
        session.id(),
        Some(inbound.id()),
        "call-1",
        "lookup",
        json!({}),
        &clock,
    ))
    .await?;
    ensure!(
        repo.find_reply_to(inbound.id()).await?.is_none(),
        "tool rows are not replies"
    );

    let reply = Message::reply_placeholder(&inbound, &clock);
    repo.insert_message(&reply).await?;
    let found = repo.find_reply_to(inbound.id()).await?;
    ensure!(
        found.map(|row| row.id()) == Some(reply.id()),
        "placeholder must be found as the reply"
    );
    Ok(())
}
