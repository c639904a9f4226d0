//! Agent turn execution with live tool-call telemetry.
//!
//! A turn loads recent history and long-term context, streams model events,
//! persists every tool call as its own `tool-call` row, optionally mirrors
//! tool status and draft text to the chat channel, and accumulates the
//! final reply text.
//!
//! The language model and the context store are external collaborators and
//! are consumed through the ports in [`ports`].

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
