//! When steps for inbound ingestion BDD scenarios.

use super::world::{IngestionWorld, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::when;

fn ingest_pending(world: &mut IngestionWorld) -> Result<(), eyre::Report> {
    let envelope = world
        .pending
        .clone()
        .ok_or_else(|| eyre::eyre!("missing inbound update in scenario world"))?;
    world.last_result = Some(run_async(world.service.ingest(envelope)));
    Ok(())
}

#[when("the update is ingested")]
fn update_is_ingested(world: &mut IngestionWorld) -> Result<(), eyre::Report> {
    ingest_pending(world)
}

#[when("the update is ingested twice")]
fn update_is_ingested_twice(world: &mut IngestionWorld) -> Result<(), eyre::Report> {
    ingest_pending(world)?;
    ingest_pending(world)
}

#[when("the worker runs")]
fn worker_runs(world: &mut IngestionWorld) -> Result<(), eyre::Report> {
    run_async(world.worker().run_once()).wrap_err("worker invocation")?;
    Ok(())
}
