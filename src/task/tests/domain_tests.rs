//! Unit tests for schedules and task state transitions.

use crate::clock::ManualClock;
use crate::conversation::domain::SessionId;
use crate::task::domain::{
    NewTask, Task, TaskDomainError, TaskName, TaskPrompt, TaskSchedule, TaskState,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use eyre::ensure;
use rstest::{fixture, rstest};

fn instant(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("valid instant")
}

#[fixture]
fn clock() -> ManualClock {
    ManualClock::new(instant(2024, 1, 1, 0, 0))
}

fn task_with(schedule: TaskSchedule, clock: &ManualClock) -> eyre::Result<Task> {
    Ok(Task::new(
        NewTask {
            session_id: SessionId::new(),
            name: TaskName::new("Morning brief")?,
            prompt: TaskPrompt::new("Summarise my calendar")?,
            schedule,
            enabled: true,
        },
        clock,
    )?)
}

#[rstest]
#[case("2024-01-01T00:00:00Z", instant(2024, 1, 1, 0, 0))]
#[case("2024-06-01T09:30:00+02:00", instant(2024, 6, 1, 7, 30))]
fn once_schedules_parse_rfc3339(#[case] input: &str, #[case] expected: DateTime<Utc>) {
    assert_eq!(
        TaskSchedule::once_at(input),
        Ok(TaskSchedule::Once { run_at: expected })
    );
}

#[rstest]
#[case("tomorrow at nine")]
#[case("2024-13-01T00:00:00Z")]
fn invalid_timestamps_are_rejected(#[case] input: &str) {
    assert!(matches!(
        TaskSchedule::once_at(input),
        Err(TaskDomainError::InvalidTimestamp { .. })
    ));
}

#[rstest]
fn invalid_cron_and_timezone_are_rejected() {
    assert!(matches!(
        TaskSchedule::recurring("61 * * * *", "UTC"),
        Err(TaskDomainError::InvalidCronExpression { .. })
    ));
    assert!(matches!(
        TaskSchedule::recurring("0 9 * * *", "Mars/Olympus_Mons"),
        Err(TaskDomainError::InvalidTimezone(_))
    ));
}

#[rstest]
fn cron_is_evaluated_in_its_timezone() -> eyre::Result<()> {
    let TaskSchedule::Recurring(cron) = TaskSchedule::recurring("0 9 * * *", "Europe/Paris")?
    else {
        eyre::bail!("expected a recurring schedule");
    };
    // 09:00 in Paris during winter is 08:00 UTC.
    let next = cron.next_after(instant(2024, 1, 1, 0, 0))?;
    ensure!(next == instant(2024, 1, 1, 8, 0));

    let after_fire = cron.next_after(next)?;
    ensure!(after_fire == instant(2024, 1, 2, 8, 0), "next must be strictly after");
    Ok(())
}

#[rstest]
fn sunday_is_zero_and_seven() -> eyre::Result<()> {
    // 2024-01-07 is a Sunday.
    let expected = instant(2024, 1, 7, 10, 0);
    for expression in ["0 10 * * 0", "0 10 * * 7", "0 10 * * SUN"] {
        let TaskSchedule::Recurring(cron) = TaskSchedule::recurring(expression, "UTC")? else {
            eyre::bail!("expected a recurring schedule");
        };
        ensure!(cron.next_after(instant(2024, 1, 1, 0, 0))? == expected, "{expression}");
    }
    Ok(())
}

#[rstest]
fn restricted_day_of_month_or_weekday_fires() -> eyre::Result<()> {
    let TaskSchedule::Recurring(cron) = TaskSchedule::recurring("0 9 13 * 5", "UTC")? else {
        eyre::bail!("expected a recurring schedule");
    };
    // 2024-01-05 is the first Friday; 2024-01-13 is a Saturday.
    let friday = cron.next_after(instant(2024, 1, 1, 0, 0))?;
    ensure!(friday == instant(2024, 1, 5, 9, 0), "got {friday}");
    let thirteenth = cron.next_after(instant(2024, 1, 12, 9, 0))?;
    ensure!(thirteenth == instant(2024, 1, 13, 9, 0), "got {thirteenth}");
    let next_friday = cron.next_after(thirteenth)?;
    ensure!(next_friday == instant(2024, 1, 19, 9, 0), "got {next_friday}");
    Ok(())
}

#[rstest]
fn once_task_dispatches_then_completes(clock: ManualClock) -> eyre::Result<()> {
    let run_at = instant(2024, 1, 1, 0, 0);
    let mut task = task_with(TaskSchedule::Once { run_at }, &clock)?;
    ensure!(task.state() == TaskState::Pending { next_run_at: Some(run_at) });

    clock.advance(Duration::seconds(1));
    let now = mockable::Clock::utc(&clock);
    ensure!(task.is_due(now));
    task.mark_dispatched(run_at, now)?;
    ensure!(task.next_run_at().is_none());
    ensure!(!task.is_due(now));

    task.record_run_success(&clock)?;
    ensure!(task.state() == TaskState::Completed { completed_at: now });
    ensure!(task.run_count() == 1);
    ensure!(task.last_run_at() == Some(now));
    ensure!(!task.is_runnable());
    Ok(())
}

#[rstest]
fn dispatch_requires_the_observed_instant(clock: ManualClock) -> eyre::Result<()> {
    let run_at = instant(2024, 1, 1, 0, 0);
    let mut task = task_with(TaskSchedule::Once { run_at }, &clock)?;
    let stale = run_at - Duration::minutes(5);
    ensure!(task.mark_dispatched(stale, run_at) == Err(TaskDomainError::NotDue(task.id())));
    Ok(())
}

#[rstest]
fn recurring_task_rearms_after_success(clock: ManualClock) -> eyre::Result<()> {
    let mut task = task_with(TaskSchedule::recurring("*/30 * * * *", "UTC")?, &clock)?;
    let first = instant(2024, 1, 1, 0, 30);
    ensure!(task.next_run_at() == Some(first));

    clock.set(first);
    task.mark_dispatched(first, first)?;
    clock.advance(Duration::minutes(2));
    task.record_run_success(&clock)?;
    ensure!(task.next_run_at() == Some(instant(2024, 1, 1, 1, 0)));
    ensure!(task.last_error().is_none());
    Ok(())
}

#[rstest]
fn terminal_failure_keeps_recurring_tasks_firing(clock: ManualClock) -> eyre::Result<()> {
    let mut recurring = task_with(TaskSchedule::recurring("0 * * * *", "UTC")?, &clock)?;
    let due = instant(2024, 1, 1, 1, 0);
    clock.set(due);
    recurring.mark_dispatched(due, due)?;
    recurring.record_run_failure("model unavailable", &clock);
    ensure!(recurring.next_run_at() == Some(instant(2024, 1, 1, 2, 0)));
    ensure!(recurring.last_error() == Some("model unavailable"));

    let run_at = instant(2024, 1, 1, 0, 0);
    let mut once = task_with(TaskSchedule::Once { run_at }, &clock)?;
    once.mark_dispatched(run_at, due)?;
    once.record_run_failure("model unavailable", &clock);
    ensure!(once.state() == TaskState::Pending { next_run_at: None });
    Ok(())
}

#[rstest]
fn disable_and_enable_round_trip(clock: ManualClock) -> eyre::Result<()> {
    let mut task = task_with(TaskSchedule::recurring("0 12 * * *", "UTC")?, &clock)?;
    task.disable(&clock);
    ensure!(task.state() == TaskState::Disabled);
    ensure!(task.enabled_at().is_none());
    ensure!(!task.is_due(instant(2030, 1, 1, 0, 0)));

    clock.advance(Duration::days(1));
    task.enable(&clock)?;
    ensure!(task.next_run_at() == Some(instant(2024, 1, 2, 12, 0)));
    Ok(())
}

#[rstest]
fn state_round_trips_through_storage_parts() -> eyre::Result<()> {
    let at = instant(2024, 1, 1, 0, 0);
    ensure!(
        TaskState::from_parts("dispatched", None, Some(at), None)?
            == TaskState::Dispatched { dispatched_at: at }
    );
    ensure!(TaskState::from_parts("completed", None, None, None).is_err());
    ensure!(TaskState::from_parts("paused", None, None, None).is_err());
    Ok(())
}
