//! Port contracts used by job handlers.

mod embedding;
mod handler;

#[cfg(test)]
pub use embedding::MockEmbeddingRefresher;
pub use embedding::{EmbeddingError, EmbeddingRefresher};
#[cfg(test)]
pub use handler::MockJobHandler;
pub use handler::{HandlerError, JobHandler};
