//! Given steps for inbound ingestion BDD scenarios.

use super::world::IngestionWorld;
use concierge::conversation::services::InboundEnvelope;
use rstest_bdd_macros::given;

#[given(r#"an inbound update "{update_id}" from chat "{chat_id}" saying "{text}""#)]
fn an_inbound_update(world: &mut IngestionWorld, update_id: String, chat_id: String, text: String) {
    world.pending = Some(InboundEnvelope::text("telegram", chat_id, update_id, text));
}

#[given(r#"the model will reply "{text}""#)]
fn model_will_reply(world: &mut IngestionWorld, text: String) -> Result<(), eyre::Report> {
    world.model.push_reply(text)?;
    Ok(())
}
