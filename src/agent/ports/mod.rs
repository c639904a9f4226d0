//! Port contracts for the language model and long-term context.

mod context;
mod model;

pub use context::{ContextError, ContextSource};
pub use model::{LanguageModel, ModelError, TurnEventStream};
