//! Sessions and their ordered message logs.
//!
//! Ingestion writes inbound rows and enqueues their processing; the delivery
//! protocol reads and repairs assistant reply rows. The module follows
//! hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
