//! Durable job queue.
//!
//! Work enters through [`services::JobQueue::enqueue`] keyed by a dedupe key,
//! is leased to one worker at a time by [`services::JobQueue::claim`], and
//! leaves through `succeed` or `fail`. The module follows hexagonal
//! architecture:
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
