//! Behaviour tests for inbound message ingestion.

#[path = "inbound_ingestion_steps/mod.rs"]
mod inbound_ingestion_steps_defs;

use inbound_ingestion_steps_defs::world::{IngestionWorld, world};
use rstest_bdd_macros::scenario;

#[scenario(
    path = "tests/features/inbound_ingestion.feature",
    name = "Redelivered update is deduplicated"
)]
#[tokio::test(flavor = "multi_thread")]
async fn redelivered_update_is_deduplicated(world: IngestionWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/inbound_ingestion.feature",
    name = "Ingested message is answered once"
)]
#[tokio::test(flavor = "multi_thread")]
async fn ingested_message_is_answered_once(world: IngestionWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/inbound_ingestion.feature",
    name = "Update without an identifier is rejected"
)]
#[tokio::test(flavor = "multi_thread")]
async fn update_without_identifier_is_rejected(world: IngestionWorld) {
    let _ = world;
}
