//! Outbound chat channel contract.
//!
//! Channel adapters (Telegram, Slack and friends) live outside this crate;
//! the execution core only needs `post`, `edit` and `delete`. The recording
//! adapter in [`adapters`] keeps a transcript for tests and local runs.

pub mod adapters;
pub mod domain;
pub mod ports;

#[cfg(test)]
mod tests;
