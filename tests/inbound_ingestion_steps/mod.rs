//! Step definitions for inbound ingestion scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
