//! Tunables for turn execution.

use super::StatusTemplates;
use std::time::Duration;

/// Default number of history rows sent to the model.
pub const DEFAULT_HISTORY_LIMIT: usize = 30;
/// Default overall deadline of a model turn.
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(180);
/// Default bound on each event wait while a tool call is in flight.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);
/// Default interval between draft text flushes.
pub const DEFAULT_TEXT_FLUSH_INTERVAL: Duration = Duration::from_millis(750);
/// Default number of buffered characters forcing a draft flush.
pub const DEFAULT_TEXT_FLUSH_CHARS: usize = 400;

/// Settings for [`crate::agent::services::TurnExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSettings {
    /// History rows loaded per turn.
    pub history_limit: usize,
    /// Overall turn deadline.
    pub model_timeout: Duration,
    /// Per-event wait bound while a tool call is in flight.
    pub tool_timeout: Duration,
    /// Tool names offered to the model.
    pub tools: Vec<String>,
    /// Post a status message per tool call and edit it on completion.
    pub mirror_tool_calls: bool,
    /// Stream draft reply text to the channel while generating.
    pub stream_text: bool,
    /// Draft flush interval.
    pub text_flush_interval: Duration,
    /// Draft flush threshold in buffered characters.
    pub text_flush_chars: usize,
    /// Status message templates.
    pub templates: StatusTemplates,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            tools: Vec::new(),
            mirror_tool_calls: true,
            stream_text: false,
            text_flush_interval: DEFAULT_TEXT_FLUSH_INTERVAL,
            text_flush_chars: DEFAULT_TEXT_FLUSH_CHARS,
            templates: StatusTemplates::default(),
        }
    }
}
