//! Turn execution service.

mod executor;

pub use executor::{INCOMPLETE_TOOL_CALL, TOOL_TIMED_OUT, TurnError, TurnExecutor, TurnOutput};
