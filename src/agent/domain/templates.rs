//! `minijinja` templates for channel status text and task prompts.

use minijinja::{Environment, context};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default status text posted when a tool call starts.
pub const DEFAULT_TOOL_STARTED: &str = "Running {{ tool_name }}...";
/// Default status text after a tool call succeeds.
pub const DEFAULT_TOOL_SUCCEEDED: &str = "{{ tool_name }} done ({{ duration_ms }} ms)";
/// Default status text after a tool call fails.
pub const DEFAULT_TOOL_FAILED: &str = "{{ tool_name }} failed: {{ error }}";
/// Default synthetic inbound text for a scheduled task run.
pub const DEFAULT_TASK_PROMPT: &str = "Scheduled task \"{{ name }}\":\n{{ prompt }}";

/// Error raised when a template cannot be rendered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed to render {template} template: {reason}")]
pub struct TemplateError {
    /// Template slot that failed.
    pub template: &'static str,
    /// Renderer diagnostic.
    pub reason: String,
}

/// Templates used for tool status messages and task prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusTemplates {
    /// Rendered with `tool_name`.
    pub tool_started: String,
    /// Rendered with `tool_name` and `duration_ms`.
    pub tool_succeeded: String,
    /// Rendered with `tool_name`, `duration_ms` and `error`.
    pub tool_failed: String,
    /// Rendered with `name` and `prompt`.
    pub task_prompt: String,
}

impl Default for StatusTemplates {
    fn default() -> Self {
        Self {
            tool_started: DEFAULT_TOOL_STARTED.to_owned(),
            tool_succeeded: DEFAULT_TOOL_SUCCEEDED.to_owned(),
            tool_failed: DEFAULT_TOOL_FAILED.to_owned(),
            task_prompt: DEFAULT_TASK_PROMPT.to_owned(),
        }
    }
}

impl StatusTemplates {
    /// Renders the tool start status.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the template is malformed.
    pub fn render_started(&self, tool_name: &str) -> Result<String, TemplateError> {
        render("tool_started", &self.tool_started, context! { tool_name })
    }

    /// Renders the tool success status.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the template is malformed.
    pub fn render_succeeded(
        &self,
        tool_name: &str,
        duration_ms: u64,
    ) -> Result<String, TemplateError> {
        render(
            "tool_succeeded",
            &self.tool_succeeded,
            context! { tool_name, duration_ms },
        )
    }

    /// Renders the tool failure status.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the template is malformed.
    pub fn render_failed(
        &self,
        tool_name: &str,
        duration_ms: u64,
        error: &str,
    ) -> Result<String, TemplateError> {
        render(
            "tool_failed",
            &self.tool_failed,
            context! { tool_name, duration_ms, error },
        )
    }

    /// Renders the synthetic inbound text of a scheduled task run.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when the template is malformed.
    pub fn render_task_prompt(&self, name: &str, prompt: &str) -> Result<String, TemplateError> {
        render("task_prompt", &self.task_prompt, context! { name, prompt })
    }
}

fn render(
    template: &'static str,
    source: &str,
    values: minijinja::Value,
) -> Result<String, TemplateError> {
    Environment::new()
        .render_str(source, values)
        .map_err(|error| TemplateError {
            template,
            reason: error.to_string(),
        })
}
