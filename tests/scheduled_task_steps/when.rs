//! When steps for scheduled task BDD scenarios.

use super::world::{ScheduledTaskWorld, run_async};
use chrono::{DateTime, Utc};
use concierge::task::services::{CreateTaskRequest, ScheduleRequest};
use eyre::WrapErr;
use rstest_bdd_macros::when;

#[when(r#"the clock reads "{instant}""#)]
fn clock_reads(world: &mut ScheduledTaskWorld, instant: String) -> Result<(), eyre::Report> {
    let parsed = DateTime::parse_from_rfc3339(&instant)
        .wrap_err("parse scenario instant")?
        .with_timezone(&Utc);
    world.clock.set(parsed);
    Ok(())
}

#[when("the scheduler ticks")]
fn scheduler_ticks(world: &mut ScheduledTaskWorld) -> Result<(), eyre::Report> {
    let report = run_async(world.scheduler().tick()).wrap_err("scheduler tick")?;
    world.last_tick = Some(report);
    Ok(())
}

#[when("the worker runs")]
fn worker_runs(world: &mut ScheduledTaskWorld) -> Result<(), eyre::Report> {
    world.model.push_reply("Here is your scheduled message.")?;
    let run = run_async(world.worker().run_once()).wrap_err("worker invocation")?;
    if let Some(failed) = run.results.iter().find(|report| !report.ok) {
        return Err(eyre::eyre!("job {} failed: {:?}", failed.job_id, failed.error));
    }
    Ok(())
}

#[when(r#"a recurring task "{name}" is created on "{cron_expr}" in "{timezone}""#)]
fn create_recurring(
    world: &mut ScheduledTaskWorld,
    name: String,
    cron_expr: String,
    timezone: String,
) -> Result<(), eyre::Report> {
    let session = world
        .session
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing session in scenario world"))?;
    let request = CreateTaskRequest::new(
        session.id(),
        name,
        "Say something nice",
        ScheduleRequest::Recurring {
            cron_expr,
            timezone,
        },
    );
    world.last_create_result = Some(run_async(world.service.create(request)));
    Ok(())
}
