//! Persisted vector index over chunk embeddings.
//!
//! Storage is SQLite via `rig-sqlite`, with similarity search provided by the
//! `sqlite-vec` extension. The index is built at most once per corpus: when
//! the database file already exists it is opened as-is and no embedding calls
//! are issued. Staleness against the current document set is deliberately not
//! detected; delete the file to force a rebuild.

use std::os::raw::c_char;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use rig::OneOrMany;
use rig::embeddings::embedding::{Embedding, EmbeddingModel};
use rig_sqlite::{Column, ColumnValue, SqliteVectorStore, SqliteVectorStoreTable};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{Connection, ffi};
use tracing::{debug, info};

use super::IndexError;
use crate::types::Chunk;

/// Row stored for each chunk, mirrored by a `chunks_embeddings` vector table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChunkRow {
    pub id: String,
    pub source: String,
    #[serde(deserialize_with = "deserialize_position")]
    pub position: usize,
    pub content: String,
}

impl From<&Chunk> for ChunkRow {
    fn from(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id.clone(),
            source: chunk.source.clone(),
            position: chunk.position,
            content: chunk.text.clone(),
        }
    }
}

impl SqliteVectorStoreTable for ChunkRow {
    fn name() -> &'static str {
        "chunks"
    }

    fn schema() -> Vec<Column> {
        vec![
            Column::new("id", "TEXT PRIMARY KEY"),
            Column::new("source", "TEXT").indexed(),
            Column::new("position", "TEXT"),
            Column::new("content", "TEXT"),
        ]
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn column_values(&self) -> Vec<(&'static str, Box<dyn ColumnValue>)> {
        vec![
            ("id", Box::new(self.id.clone())),
            ("source", Box::new(self.source.clone())),
            ("position", Box::new(self.position.to_string())),
            ("content", Box::new(self.content.clone())),
        ]
    }
}

// Positions round-trip through TEXT columns, so accept either representation.
fn deserialize_position<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(u64),
        Text(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Num(value) => usize::try_from(value)
            .map_err(|_| de::Error::custom(format!("position {value} does not fit in usize"))),
        Repr::Text(text) => text
            .parse::<usize>()
            .map_err(|err| de::Error::custom(format!("unable to parse position '{text}': {err}"))),
    }
}

/// Chunk-level similarity index, persisted to a single SQLite file.
#[derive(Clone)]
pub struct VectorIndex<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    /// Cloned connection handle for direct SQL not covered by rig-sqlite.
    conn: Connection,
    model: E,
}

impl<E> VectorIndex<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    /// Opens the index at `path` if it exists, otherwise builds it from
    /// `chunks` and persists it.
    ///
    /// A fresh build embeds every chunk (batched) and is all-or-nothing: the
    /// index is assembled in a sibling `.partial` file and renamed into place
    /// only on success, so a concurrent reader never observes a half-written
    /// database. Opening an existing file issues no embedding calls.
    pub async fn load_or_build(
        path: impl AsRef<Path>,
        chunks: &[Chunk],
        model: E,
    ) -> Result<Self, IndexError> {
        register_sqlite_vec()?;
        let path = path.as_ref();

        if path.exists() {
            info!(path = %path.display(), "opening persisted vector index");
            return Self::open(path, model).await;
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let partial = partial_path(path);
        if partial.exists() {
            tokio::fs::remove_file(&partial).await?;
        }

        info!(path = %path.display(), chunks = chunks.len(), "building vector index");
        match Self::build_at(&partial, chunks, &model).await {
            Ok(()) => {
                tokio::fs::rename(&partial, path).await?;
                Self::open(path, model).await
            }
            Err(err) => {
                let _ = tokio::fs::remove_file(&partial).await;
                Err(err)
            }
        }
    }

    async fn open(path: &Path, model: E) -> Result<Self, IndexError> {
        let conn = Connection::open(path.to_path_buf())
            .await
            .map_err(|err| IndexError::Storage(err.to_string()))?;
        ensure_vec_loaded(&conn).await?;
        // Side effect only: creates the tables when they are missing.
        SqliteVectorStore::<E, ChunkRow>::new(conn.clone(), &model)
            .await
            .map_err(|err| IndexError::Storage(err.to_string()))?;
        Ok(Self { conn, model })
    }

    async fn build_at(path: &Path, chunks: &[Chunk], model: &E) -> Result<(), IndexError> {
        let conn = Connection::open(path.to_path_buf())
            .await
            .map_err(|err| IndexError::Storage(err.to_string()))?;
        ensure_vec_loaded(&conn).await?;
        let store = SqliteVectorStore::new(conn.clone(), model)
            .await
            .map_err(|err| IndexError::Storage(err.to_string()))?;

        let batch_size = E::MAX_DOCUMENTS.max(1);
        for batch in chunks.chunks(batch_size) {
            let embeddings = model
                .embed_texts(batch.iter().map(|chunk| chunk.text.clone()))
                .await
                .map_err(|err| IndexError::Embedding(err.to_string()))?;
            if embeddings.len() != batch.len() {
                return Err(IndexError::Embedding(format!(
                    "expected {} embeddings, model returned {}",
                    batch.len(),
                    embeddings.len()
                )));
            }
            let rows: Vec<(ChunkRow, OneOrMany<Embedding>)> = batch
                .iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| (ChunkRow::from(chunk), OneOrMany::one(embedding)))
                .collect();
            store
                .add_rows(rows)
                .await
                .map_err(|err| IndexError::Storage(err.to_string()))?;
            debug!(batch = batch.len(), "embedded and stored chunk batch");
        }

        drop(store);
        conn.close()
            .await
            .map_err(|err| IndexError::Storage(err.to_string()))?;
        Ok(())
    }

    /// Embeds `query` and returns the `top_k` most similar chunks with their
    /// cosine similarity, best first.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<(ChunkRow, f32)>, IndexError> {
        let embedding = self
            .model
            .embed_text(query)
            .await
            .map_err(|err| IndexError::Embedding(err.to_string()))?;
        let query_vec: Vec<f32> = embedding.vec.iter().map(|value| *value as f32).collect();
        let embedding_json = serde_json::to_string(&query_vec)
            .map_err(|err| IndexError::Storage(err.to_string()))?;

        self.conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT c.id, c.source, c.position, c.content, \
                         vec_distance_cosine(e.embedding, vec_f32(?)) AS distance \
                         FROM chunks c \
                         JOIN chunks_embeddings e ON c.rowid = e.rowid \
                         ORDER BY distance ASC \
                         LIMIT {top_k}"
                    ))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let rows = stmt
                    .query_map([&embedding_json], |row| {
                        let chunk = ChunkRow {
                            id: row.get(0)?,
                            source: row.get(1)?,
                            position: row.get::<_, String>(2)?.parse().unwrap_or(0),
                            content: row.get(3)?,
                        };
                        let distance: f32 = row.get(4)?;
                        Ok((chunk, 1.0 - distance))
                    })
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;

                let mut results = Vec::new();
                for row in rows {
                    results.push(row.map_err(tokio_rusqlite::Error::Rusqlite)?);
                }
                Ok(results)
            })
            .await
            .map_err(|err| IndexError::Storage(err.to_string()))
    }

    /// Number of chunks stored in the index.
    pub async fn chunk_count(&self) -> Result<usize, IndexError> {
        self.conn
            .call(|conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| IndexError::Storage(err.to_string()))
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index".to_string());
    path.with_file_name(format!("{name}.partial"))
}

/// Registers `sqlite-vec` as an auto-extension for every new connection.
/// Process-wide, at most once; the outcome is cached for later callers.
fn register_sqlite_vec() -> Result<(), IndexError> {
    static REGISTERED: OnceLock<Result<(), String>> = OnceLock::new();

    REGISTERED
        .get_or_init(|| unsafe {
            type SqliteExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *mut c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn = std::mem::transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != 0 {
                Err(format!("sqlite3_auto_extension returned {rc}"))
            } else {
                Ok(())
            }
        })
        .clone()
        .map_err(IndexError::VectorExtension)
}

async fn ensure_vec_loaded(conn: &Connection) -> Result<(), IndexError> {
    conn.call(|conn| {
        conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))
            .map(|_| ())
            .map_err(tokio_rusqlite::Error::Rusqlite)
    })
    .await
    .map_err(|err| IndexError::VectorExtension(err.to_string()))
}
