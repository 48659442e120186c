//! Shared data model and the crate-level error type.

use std::borrow::Cow;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::GenerationError;
use crate::config::ConfigError;
use crate::index::IndexError;
use crate::ingest::IngestError;

/// A source document loaded from disk, read-only after ingestion.
#[derive(Clone, Debug)]
pub struct SourceDocument {
    /// Path the document was read from.
    pub path: PathBuf,
    /// Full extracted text content.
    pub text: String,
}

impl SourceDocument {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }

    /// File name used to label chunks cut from this document.
    pub fn label(&self) -> Cow<'_, str> {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_else(|| self.path.to_string_lossy())
    }
}

/// A sentence-aligned slice of a source document, the unit of retrieval.
///
/// Chunk ids are deterministic (`<source>:<position>`) so two builds over the
/// same corpus produce content-equivalent indexes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic identifier, unique within the corpus.
    pub id: String,
    /// Label of the document this chunk was cut from.
    pub source: String,
    /// Zero-based position of the chunk within its document.
    pub position: usize,
    /// The chunk text.
    pub text: String,
}

impl Chunk {
    pub fn new(source: impl Into<String>, position: usize, text: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            id: format!("{source}:{position}"),
            source,
            position,
            text: text.into(),
        }
    }
}

/// Top-level error for the application pipeline.
///
/// Startup-stage variants (config, ingest, index) are fatal; generation
/// errors are confined to the turn that produced them.
#[derive(Debug, Error)]
pub enum QaError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_ids_are_deterministic() {
        let a = Chunk::new("speech.pdf", 3, "Some text.");
        let b = Chunk::new("speech.pdf", 3, "Some text.");
        assert_eq!(a.id, "speech.pdf:3");
        assert_eq!(a, b);
    }

    #[test]
    fn document_label_uses_file_name() {
        let doc = SourceDocument::new("/tmp/corpus/budget_2024.pdf", "text");
        assert_eq!(doc.label(), "budget_2024.pdf");
    }
}
