//! Retrieval indexes over the chunked corpus.
//!
//! Two independent structures are built from the same chunk sequence:
//!
//! * [`vector::VectorIndex`] — persisted chunk-level similarity search backed
//!   by SQLite with the `sqlite-vec` extension.
//! * [`summary::SummaryIndex`] — in-memory whole-corpus aggregation, rebuilt
//!   every session.

pub mod summary;
pub mod vector;

pub use summary::SummaryIndex;
pub use vector::{ChunkRow, VectorIndex};

use thiserror::Error;

/// Errors raised while building, loading, or querying an index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// An embedding call failed; the whole build is aborted.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The storage layer rejected an operation.
    #[error("index storage error: {0}")]
    Storage(String),

    /// The `sqlite-vec` extension could not be registered.
    #[error("vector extension unavailable: {0}")]
    VectorExtension(String),

    /// Filesystem error while persisting or loading the index.
    #[error("index io error: {0}")]
    Io(#[from] std::io::Error),
}
