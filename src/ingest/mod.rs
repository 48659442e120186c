//! Ingestion: loading source documents and cutting them into chunks.
//!
//! * [`reader`] — reads a directory of PDF/plain-text files into
//!   [`SourceDocument`](crate::types::SourceDocument)s.
//! * [`splitter`] — sentence-aligned chunking with a bounded token target.

pub mod reader;
pub mod splitter;

pub use reader::load_directory;
pub use splitter::{DEFAULT_CHUNK_TOKENS, SentenceSplitter};

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or splitting source documents.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The document directory does not exist or is not a directory.
    #[error("document directory {path} does not exist")]
    MissingDirectory { path: PathBuf },

    /// The directory exists but contains no loadable documents.
    #[error("document directory {path} contains no PDF or text files")]
    EmptyDirectory { path: PathBuf },

    /// A file could not be read from disk.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A PDF file could not be parsed into text.
    #[error("failed to extract text from {path}: {message}")]
    PdfParse { path: PathBuf, message: String },

    /// The chunking tokenizer could not be initialized.
    #[error("tokenizer initialization failed: {0}")]
    Tokenizer(String),
}
