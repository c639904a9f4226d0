//! Step definitions for scheduled task scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
