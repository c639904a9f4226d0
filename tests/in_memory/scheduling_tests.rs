//! Scheduler ticks feeding task runs through the worker.

use super::helpers::{Stack, stack};
use chrono::{Duration, TimeZone, Utc};
use concierge::conversation::{domain::Session, ports::ConversationRepository};
use concierge::task::{
    domain::{Task, TaskState},
    services::{CreateTaskRequest, ScheduleRequest},
};
use eyre::{OptionExt, ensure};
use rstest::rstest;

async fn recurring_task(stack: &Stack, cron_expr: &str) -> eyre::Result<Task> {
    let session = stack
        .conversations
        .upsert_session(&Session::new("telegram", "77", &stack.clock)?)
        .await?;
    Ok(stack
        .lifecycle
        .create(CreateTaskRequest::new(
            session.id(),
            "Check-in",
            "Ask how the day is going",
            ScheduleRequest::Recurring {
                cron_expr: cron_expr.to_owned(),
                timezone: "Europe/Oslo".to_owned(),
            },
        ))
        .await?)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repeated_ticks_enqueue_one_run(stack: Stack) -> eyre::Result<()> {
    let task = recurring_task(&stack, "0 9 * * *").await?;
    let due = task.next_run_at().ok_or_eyre("armed")?;
    stack.clock.set(due + Duration::seconds(5));

    let scheduler = stack.scheduler();
    let first = scheduler.tick().await?;
    let second = scheduler.tick().await?;

    ensure!(first.enqueued_count() == 1, "first tick fires");
    ensure!(second.enqueued_count() == 0, "second tick finds nothing due");
    ensure!(stack.jobs.snapshot()?.len() == 1, "one job");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn recurring_task_runs_on_consecutive_days(stack: Stack) -> eyre::Result<()> {
    let task = recurring_task(&stack, "0 9 * * *").await?;
    let first_due = task.next_run_at().ok_or_eyre("armed")?;
    ensure!(
        Some(first_due) == Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).single(),
        "09:00 Oslo is 08:00 UTC in winter, got {first_due}"
    );

    for day in 0..2 {
        stack.clock.set(first_due + Duration::days(day) + Duration::seconds(1));
        let tick = stack.scheduler().tick().await?;
        ensure!(tick.enqueued_count() == 1, "day {day} fires");
        stack.model.push_reply(format!("Good morning #{day}"))?;
        let run = stack.worker().run_once().await?;
        ensure!(run.results.iter().all(|report| report.ok), "{:?}", run.results);
    }

    let stored = stack
        .lifecycle
        .find_by_id(task.id())
        .await?
        .ok_or_eyre("task")?;
    ensure!(stored.run_count() == 2, "two runs");
    ensure!(
        stored.state()
            == TaskState::Pending {
                next_run_at: Some(first_due + Duration::days(2))
            },
        "armed for the third day, got {:?}",
        stored.state()
    );
    ensure!(stack.jobs.snapshot()?.len() == 2, "distinct job per firing");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn deleted_task_run_is_acknowledged(stack: Stack) -> eyre::Result<()> {
    let task = recurring_task(&stack, "*/30 * * * *").await?;
    let job_id = stack.lifecycle.trigger_now(task.id()).await?;
    stack.lifecycle.delete(task.id()).await?;

    let run = stack.worker().run_once().await?;
    let report = run.results.first().ok_or_eyre("report")?;
    ensure!(report.job_id == job_id && report.ok, "acknowledged");
    ensure!(stack.model.requests()?.is_empty(), "no turn");
    Ok(())
}
