//! Status template rendering.

use crate::agent::domain::StatusTemplates;
use rstest::rstest;

#[rstest]
fn default_templates_render_tool_lifecycle() {
    let templates = StatusTemplates::default();
    assert_eq!(
        templates.render_started("search").expect("renders"),
        "Running search..."
    );
    assert_eq!(
        templates.render_succeeded("search", 42).expect("renders"),
        "search done (42 ms)"
    );
    assert_eq!(
        templates
            .render_failed("search", 7, "rate limited")
            .expect("renders"),
        "search failed: rate limited"
    );
}

#[rstest]
fn task_prompt_includes_name_and_prompt() {
    let rendered = StatusTemplates::default()
        .render_task_prompt("Digest", "Summarize my inbox")
        .expect("renders");
    assert_eq!(rendered, "Scheduled task \"Digest\":\nSummarize my inbox");
}

#[rstest]
fn malformed_template_reports_slot() {
    let templates = StatusTemplates {
        tool_started: "{{ tool_name".to_owned(),
        ..StatusTemplates::default()
    };
    let err = templates
        .render_started("search")
        .expect_err("unclosed expression");
    assert_eq!(err.template, "tool_started");
}
