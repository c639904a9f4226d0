//! Delivery services.

mod reply;

pub use reply::{DEFAULT_FALLBACK_REPLY, ReplyError, ReplyOutcome, ReplyService};
