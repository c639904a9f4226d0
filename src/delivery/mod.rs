//! Idempotent reply delivery.
//!
//! Each inbound message gets at most one delivered assistant reply. The
//! reply row is written as an empty placeholder before generation, filled
//! once the turn finishes, and stamped with `channel_sent_at` only after the
//! channel accepted it. A retried job inspects that row and resumes from
//! whichever step was last completed.

pub mod services;

#[cfg(test)]
mod tests;
