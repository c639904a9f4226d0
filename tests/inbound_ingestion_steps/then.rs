//! Then steps for inbound ingestion BDD scenarios.

use super::world::IngestionWorld;
use concierge::channel::domain::ChannelTarget;
use concierge::conversation::{domain::Role, services::IngestionError};
use eyre::WrapErr;
use rstest_bdd_macros::then;

#[then("there is {count:usize} session")]
fn session_count(world: &mut IngestionWorld, count: usize) -> Result<(), eyre::Report> {
    let sessions = world.conversations.sessions().wrap_err("list sessions")?;
    eyre::ensure!(
        sessions.len() == count,
        "expected {count} sessions, found {}",
        sessions.len()
    );
    Ok(())
}

#[then("the session has {count:usize} user messages")]
fn user_message_count(world: &mut IngestionWorld, count: usize) -> Result<(), eyre::Report> {
    let sessions = world.conversations.sessions().wrap_err("list sessions")?;
    let session = sessions
        .first()
        .ok_or_else(|| eyre::eyre!("no session was created"))?;
    let log = world
        .conversations
        .session_log(session.id())
        .wrap_err("read session log")?;
    let users = log
        .iter()
        .filter(|message| message.role() == Role::User)
        .count();
    eyre::ensure!(users == count, "expected {count} user messages, found {users}");
    Ok(())
}

#[then(r#"{count:usize} job is queued with dedupe key "{key}""#)]
fn jobs_with_key(world: &mut IngestionWorld, count: usize, key: String) -> Result<(), eyre::Report> {
    let jobs = world.jobs.snapshot().wrap_err("read job store")?;
    eyre::ensure!(jobs.len() == count, "expected {count} jobs, found {}", jobs.len());
    if jobs.iter().any(|job| job.dedupe_key().as_str() != key) {
        return Err(eyre::eyre!("expected every job keyed '{key}'"));
    }
    Ok(())
}

#[then(r#"the chat shows "{text}" once"#)]
fn chat_shows_once(world: &mut IngestionWorld, text: String) -> Result<(), eyre::Report> {
    let outcome = match world.last_result.as_ref() {
        Some(Ok(outcome)) => outcome,
        other => return Err(eyre::eyre!("expected a successful ingestion, got {other:?}")),
    };
    let visible = world
        .channel
        .visible(&ChannelTarget::for_session(&outcome.session))
        .wrap_err("read channel")?;
    eyre::ensure!(visible == [text.as_str()], "expected one '{text}', chat shows {visible:?}");
    Ok(())
}

#[then("ingestion fails with an invalid dedupe key")]
fn ingestion_fails_with_invalid_key(world: &mut IngestionWorld) -> Result<(), eyre::Report> {
    let result = world
        .last_result
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing ingestion result"))?;
    if !matches!(result, Err(IngestionError::DedupeKey(_))) {
        return Err(eyre::eyre!("expected DedupeKey error, got {result:?}"));
    }
    Ok(())
}

#[then("no job is queued")]
fn no_job_is_queued(world: &mut IngestionWorld) -> Result<(), eyre::Report> {
    let jobs = world.jobs.snapshot().wrap_err("read job store")?;
    eyre::ensure!(jobs.is_empty(), "expected no jobs, found {}", jobs.len());
    Ok(())
}
