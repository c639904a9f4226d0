//! Ingestion, dispatch and delivery as one pipeline.

use super::helpers::{Stack, stack};
use concierge::agent::domain::TurnSettings;
use concierge::channel::domain::ChannelTarget;
use concierge::conversation::{
    domain::{MessageId, Role},
    services::InboundEnvelope,
};
use concierge::delivery::services::ReplyOutcome;
use concierge::queue::{
    domain::{DedupeKey, JobPayload, JobStatus},
    services::EnqueueRequest,
};
use eyre::{OptionExt, ensure};
use rstest::rstest;

fn quiet() -> TurnSettings {
    TurnSettings {
        mirror_tool_calls: false,
        ..TurnSettings::default()
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn redelivered_webhook_produces_one_reply(stack: Stack) -> eyre::Result<()> {
    let envelope = InboundEnvelope::text("telegram", "555", "42", "what's on today?");
    let first = stack.ingestion.ingest(envelope.clone()).await?;
    stack.model.push_reply("Two meetings and a dentist.")?;
    stack.worker_with(quiet()).run_once().await?;

    let again = stack.ingestion.ingest(envelope).await?;
    ensure!(again.duplicate && again.job_id == first.job_id, "deduplicated");
    let rerun = stack.worker_with(quiet()).run_once().await?;
    ensure!(rerun.results.is_empty(), "succeeded job is not claimed again");

    let target = ChannelTarget::for_session(&first.session);
    ensure!(
        stack.channel.visible(&target)? == ["Two meetings and a dentist."],
        "exactly one reply visible"
    );
    ensure!(stack.jobs.snapshot()?.len() == 1, "one job");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn crash_after_generation_redelivers_stored_content(stack: Stack) -> eyre::Result<()> {
    let outcome = stack
        .ingestion
        .ingest(InboundEnvelope::text("telegram", "555", "43", "remind me"))
        .await?;
    stack.model.push_reply("Reminder noted.")?;
    stack.channel.fail_next_posts(1)?;

    let crashed = stack.worker_with(quiet()).run_once().await?;
    ensure!(crashed.results.iter().all(|report| !report.ok), "delivery failed");

    let replies = stack.replies(quiet());
    let resumed = replies.respond(outcome.message_id).await?;
    ensure!(
        matches!(resumed, ReplyOutcome::Redelivered(_)),
        "stored content redelivered, got {resumed:?}"
    );
    let repeat = replies.respond(outcome.message_id).await?;
    ensure!(
        matches!(repeat, ReplyOutcome::AlreadyDelivered(_)),
        "second call is a no-op, got {repeat:?}"
    );
    ensure!(stack.model.requests()?.len() == 1, "generated once");
    ensure!(stack.channel.post_count()? == 1, "posted once");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn history_and_context_reach_the_model(stack: Stack) -> eyre::Result<()> {
    let first = stack
        .ingestion
        .ingest(InboundEnvelope::text("slack", "C01", "1", "my cat is called Miso"))
        .await?;
    stack.model.push_reply("Lovely name.")?;
    stack.worker_with(quiet()).run_once().await?;

    stack.context.remember(first.session.id(), "User owns a cat named Miso")?;
    stack.clock.advance(chrono::Duration::minutes(5));
    stack
        .ingestion
        .ingest(InboundEnvelope::text("slack", "C01", "2", "what is my cat called?"))
        .await?;
    stack.model.push_reply("Miso.")?;
    stack.worker_with(quiet()).run_once().await?;

    let requests = stack.model.requests()?;
    let second = requests.last().ok_or_eyre("second request")?;
    let roles: Vec<Role> = second.history.iter().map(|entry| entry.role).collect();
    ensure!(
        roles == [Role::User, Role::Assistant, Role::User],
        "history in order, got {roles:?}"
    );
    ensure!(
        second.context == ["User owns a cat named Miso"],
        "context snippets forwarded"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn job_for_a_missing_message_is_retried_then_failed(stack: Stack) -> eyre::Result<()> {
    let ghost = MessageId::new();
    let job_id = stack
        .queue
        .enqueue(
            EnqueueRequest::new(
                JobPayload::process_message(ghost.into_inner()),
                DedupeKey::for_inbound_update("ghost")?,
            )
            .with_max_attempts(2),
        )
        .await?
        .job_id();

    stack.worker_with(quiet()).run_once().await?;
    stack.clock.advance(chrono::Duration::minutes(1));
    stack.worker_with(quiet()).run_once().await?;

    let job = stack.queue.find(job_id).await?.ok_or_eyre("job")?;
    ensure!(job.status() == JobStatus::Failed, "budget spent");
    ensure!(job.attempts() == 2, "two attempts");
    Ok(())
}
