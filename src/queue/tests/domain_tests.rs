//! Unit tests for job aggregate transitions, payload decoding and backoff.

use crate::clock::ManualClock;
use crate::queue::domain::{
    DedupeKey, EmbedTarget, FailureOutcome, Job, JobDomainError, JobPayload, JobStatus, NewJob,
    PayloadError, RetryPolicy, SuccessOutcome, WorkerId,
};
use chrono::{DateTime, TimeZone, Utc};
use eyre::{ensure, eyre};
use rstest::{fixture, rstest};
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

#[fixture]
fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid instant")
}

#[fixture]
fn clock(start: DateTime<Utc>) -> ManualClock {
    ManualClock::new(start)
}

fn queued_job(clock: &ManualClock, max_attempts: u32) -> eyre::Result<Job> {
    Ok(Job::new(
        NewJob {
            payload: JobPayload::process_message(Uuid::new_v4()),
            dedupe_key: DedupeKey::new("process_message:1")?,
            run_at: None,
            max_attempts: Some(max_attempts),
        },
        clock,
    )?)
}

#[rstest]
fn new_job_defaults_to_immediate_run(clock: ManualClock, start: DateTime<Utc>) -> eyre::Result<()> {
    let job = queued_job(&clock, 3)?;
    ensure!(job.status() == JobStatus::Queued);
    ensure!(job.run_at() == start);
    ensure!(job.attempts() == 0);
    ensure!(job.job_type() == "process_message");
    Ok(())
}

#[rstest]
fn zero_attempt_budget_is_rejected(clock: ManualClock) {
    let result = queued_job(&clock, 0);
    let Err(err) = result else {
        panic!("zero max_attempts should be rejected");
    };
    assert_eq!(
        err.downcast_ref::<JobDomainError>(),
        Some(&JobDomainError::InvalidMaxAttempts(0))
    );
}

#[rstest]
fn claim_sets_lease_fields(clock: ManualClock, start: DateTime<Utc>) -> eyre::Result<()> {
    let mut job = queued_job(&clock, 3)?;
    let worker = WorkerId::new("worker-a")?;
    job.claim(&worker, start, Duration::from_secs(300))?;

    ensure!(job.status() == JobStatus::Locked);
    ensure!(job.locked_by() == Some(&worker));
    ensure!(job.locked_at() == Some(start));
    ensure!(job.lease_expires_at() == Some(start + chrono::Duration::seconds(300)));
    Ok(())
}

#[rstest]
fn future_job_is_not_claimable(clock: ManualClock, start: DateTime<Utc>) -> eyre::Result<()> {
    let mut job = Job::new(
        NewJob {
            payload: JobPayload::Trigger(json!({})),
            dedupe_key: DedupeKey::new("later")?,
            run_at: Some(start + chrono::Duration::minutes(5)),
            max_attempts: None,
        },
        &clock,
    )?;
    let result = job.claim(&WorkerId::new("w")?, start, Duration::from_secs(60));
    ensure!(matches!(result, Err(JobDomainError::NotClaimable { .. })));
    Ok(())
}

#[rstest]
fn failure_requeues_until_budget_is_spent(clock: ManualClock) -> eyre::Result<()> {
    let worker = WorkerId::new("worker-a")?;
    let mut job = queued_job(&clock, 2)?;

    job.claim(&worker, clock_now(&clock), Duration::from_secs(60))?;
    let first = job.record_failure("boom", Duration::from_secs(30), &clock)?;
    let expected_run_at = clock_now(&clock) + chrono::Duration::seconds(30);
    ensure!(
        first
            == FailureOutcome::Retrying {
                run_at: expected_run_at
            }
    );
    ensure!(job.status() == JobStatus::Queued);
    ensure!(job.locked_by().is_none());

    clock.advance(chrono::Duration::seconds(30));
    job.claim(&worker, clock_now(&clock), Duration::from_secs(60))?;
    let second = job.record_failure("boom again", Duration::from_secs(30), &clock)?;
    ensure!(second == FailureOutcome::Exhausted);
    ensure!(job.status() == JobStatus::Failed);
    ensure!(job.attempts() == 2);
    ensure!(job.last_error() == Some("boom again"));
    Ok(())
}

#[rstest]
fn succeed_is_idempotent_and_failed_jobs_cannot_succeed(clock: ManualClock) -> eyre::Result<()> {
    let worker = WorkerId::new("worker-a")?;
    let mut job = queued_job(&clock, 1)?;
    job.claim(&worker, clock_now(&clock), Duration::from_secs(60))?;
    ensure!(job.mark_succeeded(&clock)? == SuccessOutcome::Recorded);
    ensure!(job.mark_succeeded(&clock)? == SuccessOutcome::AlreadySucceeded);

    let mut failing = queued_job(&clock, 1)?;
    failing.claim(&worker, clock_now(&clock), Duration::from_secs(60))?;
    failing.record_failure("nope", Duration::from_secs(1), &clock)?;
    ensure!(matches!(
        failing.mark_succeeded(&clock),
        Err(JobDomainError::AlreadyFinished { .. })
    ));
    Ok(())
}

#[rstest]
fn expired_lease_charges_an_attempt(clock: ManualClock) -> eyre::Result<()> {
    let worker = WorkerId::new("worker-a")?;
    let mut job = queued_job(&clock, 2)?;
    job.claim(&worker, clock_now(&clock), Duration::from_secs(60))?;

    ensure!(matches!(
        job.expire_lease(clock_now(&clock)),
        Err(JobDomainError::LeaseStillActive(_))
    ));

    clock.advance(chrono::Duration::seconds(61));
    let now = clock_now(&clock);
    ensure!(job.expire_lease(now)? == FailureOutcome::Retrying { run_at: now });
    ensure!(job.attempts() == 1);
    ensure!(job.last_error() == Some("lease expired"));
    ensure!(job.is_ready(now));
    Ok(())
}

#[rstest]
#[case(1, 10)]
#[case(2, 20)]
#[case(3, 40)]
#[case(4, 60)]
#[case(40, 60)]
fn backoff_doubles_and_caps(#[case] attempts: u32, #[case] expected_secs: u64) {
    let policy = RetryPolicy::new(Duration::from_secs(10), Duration::from_secs(60));
    assert_eq!(policy.delay_for(attempts), Duration::from_secs(expected_secs));
}

#[rstest]
fn backoff_is_monotonic_and_at_least_one_second() {
    let policy = RetryPolicy::new(Duration::from_millis(1), Duration::from_secs(3600));
    let delays: Vec<Duration> = (1..=20).map(|attempt| policy.delay_for(attempt)).collect();
    assert!(delays.windows(2).all(|pair| pair.first() <= pair.get(1)));
    assert!(delays.iter().all(|delay| *delay >= Duration::from_secs(1)));
}

#[rstest]
fn payload_decoding_validates_shapes() -> eyre::Result<()> {
    let task_id = Uuid::new_v4();
    let session_id = Uuid::new_v4();
    let run_task = JobPayload::run_task(task_id, "summarise my day", session_id);
    let decoded = JobPayload::from_parts(run_task.job_type(), &run_task.to_json())?;
    ensure!(decoded == run_task);

    let row_id = Uuid::new_v4();
    let embed = JobPayload::from_parts("embed_memory", &json!({ "rowId": row_id }))?;
    ensure!(
        embed
            == JobPayload::Embed {
                target: EmbedTarget::Memory,
                row_id
            }
    );

    let missing = JobPayload::from_parts("process_message", &json!({ "message": 1 }));
    ensure!(matches!(missing, Err(PayloadError::InvalidPayload { .. })));

    let unknown = JobPayload::from_parts("send_fax", &json!({}));
    ensure!(unknown == Err(PayloadError::UnknownType("send_fax".to_owned())));
    Ok(())
}

#[rstest]
fn dedupe_key_helpers_follow_documented_formats() -> eyre::Result<()> {
    let task_id = Uuid::nil();
    ensure!(DedupeKey::for_inbound_update("42")?.as_str() == "process_message:42");
    ensure!(
        DedupeKey::for_scheduled_run(task_id, 1_704_067_200).as_str()
            == "run_task:00000000-0000-0000-0000-000000000000:1704067200"
    );
    let first = DedupeKey::for_trigger("trigger", &json!({ "a": 1 }));
    let second = DedupeKey::for_trigger("trigger", &json!({ "a": 1 }));
    let other = DedupeKey::for_trigger("trigger", &json!({ "a": 2 }));
    ensure!(first == second);
    ensure!(first != other);
    ensure!(DedupeKey::new("   ").is_err());
    let key = DedupeKey::for_manual_run(task_id, 5);
    key.as_str()
        .ends_with(":manual:5")
        .then_some(())
        .ok_or_else(|| eyre!("unexpected manual key {key}"))
}

fn clock_now(clock: &ManualClock) -> DateTime<Utc> {
    use mockable::Clock;
    clock.utc()
}
