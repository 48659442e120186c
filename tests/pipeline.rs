//! Integration tests for the ingestion → index → retrieval pipeline.
//!
//! A deterministic counting embedder stands in for the hosted embedding
//! model, so these tests run offline and can observe exactly when embedding
//! calls happen.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rig::embeddings::embedding::{Embedding, EmbeddingError, EmbeddingModel};
use rig::tool::Tool;
use tempfile::tempdir;

use budget_qa::index::VectorIndex;
use budget_qa::ingest::{self, SentenceSplitter};
use budget_qa::tools::{RetrievalArgs, VectorSearchTool};
use budget_qa::types::Chunk;

/// Embedder producing a normalized character-frequency profile, counting how
/// many texts it was asked to embed.
#[derive(Clone)]
struct CountingEmbedder {
    calls: Arc<AtomicUsize>,
}

impl CountingEmbedder {
    fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingModel for CountingEmbedder {
    const MAX_DOCUMENTS: usize = 4;

    type Client = ();

    fn make(_client: &Self::Client, _model: impl Into<String>, _dims: Option<usize>) -> Self {
        Self::new()
    }

    fn ndims(&self) -> usize {
        16
    }

    fn embed_texts(
        &self,
        texts: impl IntoIterator<Item = String> + Send,
    ) -> impl std::future::Future<Output = Result<Vec<Embedding>, EmbeddingError>> + Send {
        let docs: Vec<String> = texts.into_iter().collect();
        let calls = Arc::clone(&self.calls);
        async move {
            calls.fetch_add(docs.len(), Ordering::SeqCst);
            Ok(docs
                .into_iter()
                .map(|document| Embedding {
                    vec: char_profile(&document),
                    document,
                })
                .collect())
        }
    }
}

fn char_profile(text: &str) -> Vec<f64> {
    let mut profile = vec![0.0f64; 16];
    for ch in text.chars().filter(char::is_ascii_alphanumeric) {
        profile[(ch.to_ascii_lowercase() as usize) % 16] += 1.0;
    }
    let norm = profile.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for value in &mut profile {
            *value /= norm;
        }
    }
    profile
}

/// Embedder whose every call fails, for all-or-nothing build tests.
#[derive(Clone)]
struct FailingEmbedder;

impl EmbeddingModel for FailingEmbedder {
    const MAX_DOCUMENTS: usize = 4;

    type Client = ();

    fn make(_client: &Self::Client, _model: impl Into<String>, _dims: Option<usize>) -> Self {
        Self
    }

    fn ndims(&self) -> usize {
        16
    }

    fn embed_texts(
        &self,
        _texts: impl IntoIterator<Item = String> + Send,
    ) -> impl std::future::Future<Output = Result<Vec<Embedding>, EmbeddingError>> + Send {
        async move { Err(EmbeddingError::ProviderError("quota exhausted".to_string())) }
    }
}

async fn sample_chunks() -> Vec<Chunk> {
    let corpus = tempdir().unwrap();
    tokio::fs::write(
        corpus.path().join("a_zones.txt"),
        "Zebra zone zoning zzz. Zonal zeal zigzag.",
    )
    .await
    .unwrap();
    tokio::fs::write(
        corpus.path().join("b_areas.txt"),
        "Aardvark area arena aaa. Arable acre arcade.",
    )
    .await
    .unwrap();

    let documents = ingest::load_directory(corpus.path()).await.unwrap();
    let splitter = SentenceSplitter::new(1024).unwrap();
    splitter.split_documents(&documents)
}

#[tokio::test]
async fn fresh_build_embeds_every_chunk_and_reopen_embeds_none() {
    let chunks = sample_chunks().await;
    assert!(!chunks.is_empty());

    let dir = tempdir().unwrap();
    let path = dir.path().join("index.sqlite");

    let builder = CountingEmbedder::new();
    let index = VectorIndex::load_or_build(&path, &chunks, builder.clone())
        .await
        .unwrap();
    assert_eq!(builder.call_count(), chunks.len());
    assert_eq!(index.chunk_count().await.unwrap(), chunks.len());
    drop(index);

    // Second startup: the persisted file is opened and the corpus is never
    // re-embedded, even though the chunk list is available.
    let reopener = CountingEmbedder::new();
    let reopened = VectorIndex::load_or_build(&path, &chunks, reopener.clone())
        .await
        .unwrap();
    assert_eq!(reopener.call_count(), 0);
    assert_eq!(reopened.chunk_count().await.unwrap(), chunks.len());
}

#[tokio::test]
async fn independent_builds_retrieve_the_same_chunks() {
    let chunks = sample_chunks().await;
    let dir = tempdir().unwrap();

    let first = VectorIndex::load_or_build(
        dir.path().join("first.sqlite"),
        &chunks,
        CountingEmbedder::new(),
    )
    .await
    .unwrap();
    let second = VectorIndex::load_or_build(
        dir.path().join("second.sqlite"),
        &chunks,
        CountingEmbedder::new(),
    )
    .await
    .unwrap();

    let query = "zebra zoning zone";
    let hits_first = first.search(query, 2).await.unwrap();
    let hits_second = second.search(query, 2).await.unwrap();

    let ids_first: Vec<&str> = hits_first.iter().map(|(c, _)| c.id.as_str()).collect();
    let ids_second: Vec<&str> = hits_second.iter().map(|(c, _)| c.id.as_str()).collect();
    assert_eq!(ids_first, ids_second);
    assert!(!ids_first.is_empty());
}

#[tokio::test]
async fn search_ranks_the_matching_document_first() {
    let chunks = sample_chunks().await;
    let dir = tempdir().unwrap();
    let index = VectorIndex::load_or_build(
        dir.path().join("index.sqlite"),
        &chunks,
        CountingEmbedder::new(),
    )
    .await
    .unwrap();

    let hits = index.search("zzz zebra zone", 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].0.source, "a_zones.txt");

    let hits = index.search("aaa aardvark area", 1).await.unwrap();
    assert_eq!(hits[0].0.source, "b_areas.txt");
}

#[tokio::test]
async fn vector_tool_returns_grounding_passages() {
    let chunks = sample_chunks().await;
    let dir = tempdir().unwrap();
    let index = Arc::new(
        VectorIndex::load_or_build(
            dir.path().join("index.sqlite"),
            &chunks,
            CountingEmbedder::new(),
        )
        .await
        .unwrap(),
    );

    let tool = VectorSearchTool::new(index, 2);
    let passages = tool
        .call(RetrievalArgs {
            query: "zebra zoning".to_string(),
        })
        .await
        .unwrap();

    assert!(passages.contains("Zebra"));
    assert!(passages.contains("a_zones.txt"));
}

#[tokio::test]
async fn embedding_failure_aborts_the_build_and_leaves_no_index() {
    let chunks = sample_chunks().await;
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.sqlite");

    let result = VectorIndex::load_or_build(&path, &chunks, FailingEmbedder).await;
    assert!(result.is_err());

    // All-or-nothing: neither the final file nor a partial build survives.
    assert!(!path.exists());
    assert!(!dir.path().join("index.sqlite.partial").exists());
}
