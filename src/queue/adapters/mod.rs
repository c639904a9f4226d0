//! Adapter implementations of the job queue ports.

pub mod memory;
pub mod postgres;
