//! Worker dispatch: claim a batch, route each job by type, report outcomes.
//!
//! A worker invocation is short-lived and stateless apart from the bounded
//! session cache. Concurrency comes from several invocations racing on the
//! claim; jobs within one batch run sequentially. The HTTP surface in
//! [`adapters::http`] exposes invocation, the scheduler tick and external
//! triggers.

pub mod adapters;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
