//! Whole-corpus summary index.
//!
//! Unlike the vector index this structure is never persisted; it is rebuilt
//! from the chunk sequence at startup. Construction touches no external
//! service and cannot fail on content.

use crate::types::Chunk;

/// Character budget applied to the corpus digest before it is handed to a
/// summarization prompt.
pub const DEFAULT_DIGEST_CHARS: usize = 48_000;

/// Ordered, immutable view over the full chunk sequence.
#[derive(Clone, Debug, Default)]
pub struct SummaryIndex {
    chunks: Vec<Chunk>,
}

impl SummaryIndex {
    /// Builds the index from the chunk sequence, preserving its order.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Read-only access to the underlying chunk sequence.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Concatenates chunk texts in document order, labelling each source
    /// change, until `max_chars` would be exceeded. Always includes at least
    /// the first chunk (truncated on a char boundary if necessary).
    pub fn corpus_digest(&self, max_chars: usize) -> String {
        let mut digest = String::new();
        let mut current_source: Option<&str> = None;

        for chunk in &self.chunks {
            let mut section = String::new();
            if current_source != Some(chunk.source.as_str()) {
                section.push_str(&format!("\n=== {} ===\n", chunk.source));
            }
            section.push_str(&chunk.text);
            section.push('\n');

            if digest.len() + section.len() > max_chars {
                if digest.is_empty() {
                    let cut = section
                        .char_indices()
                        .take_while(|(idx, _)| *idx < max_chars)
                        .last()
                        .map(|(idx, ch)| idx + ch.len_utf8())
                        .unwrap_or(0);
                    digest.push_str(&section[..cut]);
                }
                break;
            }
            current_source = Some(chunk.source.as_str());
            digest.push_str(&section);
        }

        digest.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Chunk> {
        vec![
            Chunk::new("budget_2023.txt", 0, "Last year's speech opened with growth."),
            Chunk::new("budget_2023.txt", 1, "It closed with deficit targets."),
            Chunk::new("budget_2024.txt", 0, "This year's speech focuses on capex."),
        ]
    }

    #[test]
    fn digest_preserves_order_and_labels_sources() {
        let index = SummaryIndex::from_chunks(corpus());
        let digest = index.corpus_digest(DEFAULT_DIGEST_CHARS);

        let first = digest.find("growth").unwrap();
        let second = digest.find("deficit").unwrap();
        let third = digest.find("capex").unwrap();
        assert!(first < second && second < third);
        assert!(digest.contains("=== budget_2023.txt ==="));
        assert!(digest.contains("=== budget_2024.txt ==="));
    }

    #[test]
    fn digest_respects_the_char_budget() {
        let index = SummaryIndex::from_chunks(corpus());
        let digest = index.corpus_digest(80);
        assert!(digest.len() <= 80);
        assert!(!digest.is_empty(), "first chunk must survive truncation");
    }

    #[test]
    fn empty_index_digest_is_empty() {
        let index = SummaryIndex::from_chunks(Vec::new());
        assert!(index.is_empty());
        assert_eq!(index.corpus_digest(100), "");
    }
}
