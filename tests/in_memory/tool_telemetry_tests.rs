//! Tool-call telemetry observed end to end.

use super::helpers::{Stack, stack};
use concierge::agent::{adapters::ScriptStep, domain::TurnEvent};
use concierge::channel::{adapters::ChannelEvent, domain::ChannelTarget};
use concierge::conversation::{
    domain::{MessageKind, ToolStatus},
    services::InboundEnvelope,
};
use eyre::{OptionExt, ensure};
use rstest::rstest;
use serde_json::json;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tool_calls_are_logged_and_mirrored(stack: Stack) -> eyre::Result<()> {
    let outcome = stack
        .ingestion
        .ingest(InboundEnvelope::text("telegram", "900", "5", "find flights to Oslo"))
        .await?;
    stack.model.push_turn([
        ScriptStep::from(TurnEvent::tool_started(
            "call-1",
            "flights",
            json!({ "to": "OSL" }),
        )),
        TurnEvent::tool_started("call-2", "calendar", json!({ "week": 12 })).into(),
        TurnEvent::tool_failed("call-2", "calendar offline").into(),
        TurnEvent::tool_succeeded("call-1", json!({ "cheapest": 89 })).into(),
        TurnEvent::text("Cheapest flight is 89 EUR.").into(),
    ])?;

    let run = stack.worker().run_once().await?;
    ensure!(run.results.iter().all(|report| report.ok), "{:?}", run.results);

    let log = stack.conversations.session_log(outcome.session.id())?;
    let calls: Vec<_> = log
        .iter()
        .filter(|message| message.kind() == MessageKind::ToolCall)
        .filter_map(|message| message.tool_call().cloned())
        .collect();
    ensure!(calls.len() == 2, "one row per call, got {}", calls.len());
    let flights = calls
        .iter()
        .find(|call| call.call_id == "call-1")
        .ok_or_eyre("flights row")?;
    ensure!(flights.status == ToolStatus::Succeeded, "flights succeeded");
    ensure!(flights.result == Some(json!({ "cheapest": 89 })), "result kept");
    ensure!(flights.duration_ms.is_some(), "duration recorded");
    let calendar = calls
        .iter()
        .find(|call| call.call_id == "call-2")
        .ok_or_eyre("calendar row")?;
    ensure!(
        calendar.status == ToolStatus::Failed
            && calendar.error.as_deref() == Some("calendar offline"),
        "calendar failed"
    );

    let target = ChannelTarget::for_session(&outcome.session);
    let visible = stack.channel.visible(&target)?;
    ensure!(
        visible.iter().any(|text| text.starts_with("flights done")),
        "status edited to success, got {visible:?}"
    );
    ensure!(
        visible.contains(&"calendar failed: calendar offline".to_owned()),
        "status edited to failure, got {visible:?}"
    );
    ensure!(
        visible.last().map(String::as_str) == Some("Cheapest flight is 89 EUR."),
        "reply delivered last"
    );
    let edits = stack
        .channel
        .events()?
        .into_iter()
        .filter(|event| matches!(event, ChannelEvent::Edited { .. }))
        .count();
    ensure!(edits == 2, "each status edited once, got {edits}");
    Ok(())
}
