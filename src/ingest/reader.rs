//! Directory reader for the source corpus.
//!
//! Reads every `*.pdf` and `*.txt` file in a directory, in file-name order so
//! repeated runs see the same document sequence. Reading has no side effects
//! beyond disk access; documents are immutable once loaded.

use std::path::Path;

use tokio::fs;
use tracing::{debug, info};

use super::IngestError;
use crate::types::SourceDocument;

/// Loads every supported document under `dir`.
///
/// # Errors
///
/// * [`IngestError::MissingDirectory`] when `dir` is absent or not a directory.
/// * [`IngestError::EmptyDirectory`] when no PDF or text file yields content.
/// * [`IngestError::Read`] / [`IngestError::PdfParse`] when a single file
///   cannot be read or parsed; one bad file aborts the whole load.
pub async fn load_directory(dir: impl AsRef<Path>) -> Result<Vec<SourceDocument>, IngestError> {
    let dir = dir.as_ref();
    let is_dir = fs::metadata(dir)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(IngestError::MissingDirectory {
            path: dir.to_path_buf(),
        });
    }

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(dir).await.map_err(|source| IngestError::Read {
        path: dir.to_path_buf(),
        source,
    })?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| IngestError::Read {
            path: dir.to_path_buf(),
            source,
        })?
    {
        let path = entry.path();
        if matches!(extension_of(&path).as_deref(), Some("pdf" | "txt")) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let text = match extension_of(&path).as_deref() {
            Some("pdf") => extract_pdf_text(&path).await?,
            _ => fs::read_to_string(&path)
                .await
                .map_err(|source| IngestError::Read {
                    path: path.clone(),
                    source,
                })?,
        };
        if text.trim().is_empty() {
            debug!(path = %path.display(), "skipping document with no extractable text");
            continue;
        }
        debug!(path = %path.display(), bytes = text.len(), "loaded document");
        documents.push(SourceDocument::new(path, text));
    }

    if documents.is_empty() {
        return Err(IngestError::EmptyDirectory {
            path: dir.to_path_buf(),
        });
    }

    info!(count = documents.len(), dir = %dir.display(), "corpus loaded");
    Ok(documents)
}

async fn extract_pdf_text(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path).await.map_err(|source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&bytes).map_err(|err| IngestError::PdfParse {
            path: owned,
            message: err.to_string(),
        })
    })
    .await
    .map_err(|err| IngestError::PdfParse {
        path: path.to_path_buf(),
        message: format!("extraction task failed: {err}"),
    })?
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}
