//! Sentence-aligned chunking with a bounded token target.
//!
//! Sentences are packed greedily into chunks until adding the next sentence
//! would exceed the token budget. A single sentence longer than the budget
//! becomes its own chunk rather than being cut mid-sentence. There is no
//! overlap between chunks.

use tiktoken_rs::{CoreBPE, cl100k_base};
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use super::IngestError;
use crate::types::{Chunk, SourceDocument};

/// Default chunk budget, in cl100k tokens.
pub const DEFAULT_CHUNK_TOKENS: usize = 1024;

/// Splits documents into sentence-aligned chunks.
pub struct SentenceSplitter {
    bpe: CoreBPE,
    max_tokens: usize,
}

impl SentenceSplitter {
    /// Creates a splitter with the given token budget per chunk.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Tokenizer`] when the cl100k vocabulary cannot
    /// be loaded.
    pub fn new(max_tokens: usize) -> Result<Self, IngestError> {
        let bpe = cl100k_base().map_err(|err| IngestError::Tokenizer(err.to_string()))?;
        Ok(Self {
            bpe,
            max_tokens: max_tokens.max(1),
        })
    }

    /// Splits every document, preserving document order and assigning
    /// strictly increasing positions within each document.
    pub fn split_documents(&self, documents: &[SourceDocument]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for document in documents {
            let before = chunks.len();
            self.split_into(document, &mut chunks);
            debug!(
                source = %document.label(),
                chunks = chunks.len() - before,
                "document split"
            );
        }
        chunks
    }

    /// Splits a single document.
    pub fn split_document(&self, document: &SourceDocument) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        self.split_into(document, &mut chunks);
        chunks
    }

    fn split_into(&self, document: &SourceDocument, chunks: &mut Vec<Chunk>) {
        let source = document.label().into_owned();
        let mut position = 0usize;
        let mut buffer = String::new();
        let mut buffer_tokens = 0usize;

        for sentence in document.text.split_sentence_bounds() {
            if sentence.trim().is_empty() {
                buffer.push_str(sentence);
                continue;
            }
            let sentence_tokens = self.token_len(sentence);
            if buffer_tokens > 0 && buffer_tokens + sentence_tokens > self.max_tokens {
                flush(&mut buffer, &source, &mut position, chunks);
                buffer_tokens = 0;
            }
            buffer.push_str(sentence);
            buffer_tokens += sentence_tokens;
        }
        flush(&mut buffer, &source, &mut position, chunks);
    }

    fn token_len(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

fn flush(buffer: &mut String, source: &str, position: &mut usize, chunks: &mut Vec<Chunk>) {
    let text = buffer.trim();
    if !text.is_empty() {
        chunks.push(Chunk::new(source, *position, text));
        *position += 1;
    }
    buffer.clear();
}
