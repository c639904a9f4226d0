//! Adapter implementations for agent ports.

mod memory;
mod scripted;

pub use memory::InMemoryContextSource;
pub use scripted::{ScriptStep, ScriptedModel};
