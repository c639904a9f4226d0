//! Adapter implementations for worker ports and the HTTP surface.

pub mod http;
mod memory;

pub use memory::InMemoryEmbeddingRefresher;
