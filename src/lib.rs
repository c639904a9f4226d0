//! Concierge: the asynchronous execution core of a conversational agent.
//!
//! This crate provides a durable job queue, a cron-style task scheduler, a
//! worker dispatch loop and an idempotent reply delivery protocol with live
//! tool-call telemetry. Inbound chat messages and scheduled prompts become
//! queued jobs; workers claim them under leases, run agent turns and deliver
//! at most one reply per inbound message.
//!
//! # Architecture
//!
//! Concierge follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, channels, etc.)
//!
//! # Modules
//!
//! - [`queue`]: Jobs, deduplication, leases and retry backoff
//! - [`task`]: Scheduled tasks and the due-task scheduler tick
//! - [`conversation`]: Sessions, message logs and inbound ingestion
//! - [`agent`]: Model turns with tool-call telemetry
//! - [`channel`]: Outbound chat channel contract
//! - [`delivery`]: At-most-once reply delivery
//! - [`worker`]: Claim-and-dispatch loop and its HTTP surface
//! - [`config`]: TOML configuration with environment overrides
//! - [`telemetry`]: `tracing` subscriber setup
//! - [`clock`]: Settable clock for deterministic time

pub mod agent;
pub mod channel;
pub mod clock;
pub mod config;
pub mod conversation;
pub mod delivery;
pub mod queue;
pub mod task;
pub mod telemetry;
pub mod worker;
