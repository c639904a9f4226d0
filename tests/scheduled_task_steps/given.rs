//! Given steps for scheduled task BDD scenarios.

use super::world::{ScheduledTaskWorld, run_async};
use concierge::conversation::{domain::Session, ports::ConversationRepository};
use concierge::task::services::{CreateTaskRequest, ScheduleRequest};
use eyre::WrapErr;
use rstest_bdd_macros::given;

#[given(r#"a session on channel "{channel}" chat "{chat_id}""#)]
fn session_exists(
    world: &mut ScheduledTaskWorld,
    channel: String,
    chat_id: String,
) -> Result<(), eyre::Report> {
    let candidate = Session::new(&channel, &chat_id, &world.clock)?;
    let stored = run_async(world.conversations.upsert_session(&candidate))
        .wrap_err("store scenario session")?;
    world.session = Some(stored);
    Ok(())
}

fn create(
    world: &mut ScheduledTaskWorld,
    name: String,
    schedule: ScheduleRequest,
) -> Result<(), eyre::Report> {
    let session = world
        .session
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing session in scenario world"))?;
    let request = CreateTaskRequest::new(session.id(), name, "Say something nice", schedule);
    let task = run_async(world.service.create(request)).wrap_err("create scenario task")?;
    world.last_task = Some(task);
    Ok(())
}

#[given(r#"a one-shot task "{name}" due at "{run_at}""#)]
fn one_shot_task(
    world: &mut ScheduledTaskWorld,
    name: String,
    run_at: String,
) -> Result<(), eyre::Report> {
    create(world, name, ScheduleRequest::Once { run_at })
}

#[given(r#"a recurring task "{name}" on "{cron_expr}" in "{timezone}""#)]
fn recurring_task(
    world: &mut ScheduledTaskWorld,
    name: String,
    cron_expr: String,
    timezone: String,
) -> Result<(), eyre::Report> {
    create(
        world,
        name,
        ScheduleRequest::Recurring {
            cron_expr,
            timezone,
        },
    )
}

#[given("the task is disabled")]
fn task_is_disabled(world: &mut ScheduledTaskWorld) -> Result<(), eyre::Report> {
    let task = world
        .last_task
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing task in scenario world"))?;
    let disabled = run_async(world.service.disable(task.id())).wrap_err("disable task")?;
    world.last_task = Some(disabled);
    Ok(())
}
