//! Then steps for scheduled task BDD scenarios.

use super::world::{ScheduledTaskWorld, run_async};
use chrono::{DateTime, Utc};
use concierge::task::{
    domain::{TaskDomainError, TaskState},
    services::TaskLifecycleError,
};
use eyre::WrapErr;
use rstest_bdd_macros::then;

fn reload(world: &ScheduledTaskWorld) -> Result<concierge::task::domain::Task, eyre::Report> {
    let task = world
        .last_task
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing task in scenario world"))?;
    run_async(world.service.find_by_id(task.id()))
        .wrap_err("reload task")?
        .ok_or_else(|| eyre::eyre!("task disappeared"))
}

#[then("the tick enqueues {count:usize} runs")]
fn tick_enqueues(world: &mut ScheduledTaskWorld, count: usize) -> Result<(), eyre::Report> {
    let report = world
        .last_tick
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing tick report"))?;
    eyre::ensure!(
        report.enqueued_count() == count,
        "expected {count} runs, tick enqueued {}",
        report.enqueued_count()
    );
    Ok(())
}

#[then("the task is completed after {runs:u32} runs")]
fn task_completed(world: &mut ScheduledTaskWorld, runs: u32) -> Result<(), eyre::Report> {
    let task = reload(world)?;
    eyre::ensure!(
        matches!(task.state(), TaskState::Completed { .. }),
        "expected completed, found {}",
        task.state().as_str()
    );
    eyre::ensure!(task.run_count() == runs, "expected {runs} runs, found {}", task.run_count());
    Ok(())
}

#[then(r#"the task is pending until "{instant}""#)]
fn task_pending_until(world: &mut ScheduledTaskWorld, instant: String) -> Result<(), eyre::Report> {
    let expected = DateTime::parse_from_rfc3339(&instant)
        .wrap_err("parse expected instant")?
        .with_timezone(&Utc);
    let task = reload(world)?;
    eyre::ensure!(
        task.state()
            == TaskState::Pending {
                next_run_at: Some(expected)
            },
        "expected pending until {expected}, found {:?}",
        task.state()
    );
    Ok(())
}

#[then("task creation fails with an invalid cron expression")]
fn creation_fails_with_invalid_cron(world: &mut ScheduledTaskWorld) -> Result<(), eyre::Report> {
    let result = world
        .last_create_result
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing creation result"))?;
    if !matches!(
        result,
        Err(TaskLifecycleError::Domain(
            TaskDomainError::InvalidCronExpression { .. }
        ))
    ) {
        return Err(eyre::eyre!(
            "expected InvalidCronExpression error, got {result:?}"
        ));
    }
    Ok(())
}
