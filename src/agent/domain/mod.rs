//! Domain types for agent turns.

mod events;
mod settings;
mod templates;

pub use events::{HistoryEntry, ModelRequest, TurnEvent};
pub use settings::{
    DEFAULT_HISTORY_LIMIT, DEFAULT_MODEL_TIMEOUT, DEFAULT_TEXT_FLUSH_CHARS,
    DEFAULT_TEXT_FLUSH_INTERVAL, DEFAULT_TOOL_TIMEOUT, TurnSettings,
};
pub use templates::{StatusTemplates, TemplateError};
