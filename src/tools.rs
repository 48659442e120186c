//! The fixed two-tool retrieval registry presented to the routing agent.
//!
//! Each tool binds a name and a natural-language description to exactly one
//! index. The descriptions are the only routing signal the model sees, so
//! they must stay mutually distinguishing: `vector_tool` for narrow,
//! fact-specific questions, `summary_tool` for holistic requests.

use std::sync::Arc;

use rig::agent::Agent;
use rig::client::CompletionClient;
use rig::completion::{Prompt, ToolDefinition};
use rig::embeddings::embedding::EmbeddingModel;
use rig::providers::openai;
use rig::providers::openai::responses_api::ResponsesCompletionModel;
use rig::tool::Tool;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::index::summary::DEFAULT_DIGEST_CHARS;
use crate::index::{IndexError, SummaryIndex, VectorIndex};

/// How many chunks the vector tool feeds back to the agent per query.
pub const DEFAULT_TOP_K: usize = 5;

const VECTOR_TOOL_DESCRIPTION: &str =
    "Useful for questions about specific aspects, figures, allocations, or sections \
     of the Indian budget speeches. Call this with the user's question as the query.";

const SUMMARY_TOOL_DESCRIPTION: &str =
    "Useful for requests that need a holistic summary or overview of the Indian \
     budget speeches as a whole. For questions about specific sections or figures, \
     use vector_tool instead.";

const SUMMARIZER_PREAMBLE: &str =
    "You summarize Indian budget speeches. Answer the request using only the \
     provided speech text, clearly and concisely.";

/// Arguments accepted by both retrieval tools.
#[derive(Debug, Deserialize)]
pub struct RetrievalArgs {
    /// The question or request to retrieve against.
    pub query: String,
}

/// Errors surfaced from a tool invocation back to the agent loop.
#[derive(Debug, Error)]
pub enum RetrievalToolError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("summarization failed: {0}")]
    Summarize(String),
}

/// Targeted similarity search over the vector index.
pub struct VectorSearchTool<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    index: Arc<VectorIndex<E>>,
    top_k: usize,
}

impl<E> VectorSearchTool<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    pub fn new(index: Arc<VectorIndex<E>>, top_k: usize) -> Self {
        Self { index, top_k }
    }
}

impl<E> Tool for VectorSearchTool<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    const NAME: &'static str = "vector_tool";

    type Error = RetrievalToolError;
    type Args = RetrievalArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: VECTOR_TOOL_DESCRIPTION.to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Specific question to search the speeches for"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        debug!(query = %args.query, top_k = self.top_k, "vector_tool invoked");
        let hits = self.index.search(&args.query, self.top_k).await?;
        if hits.is_empty() {
            return Ok("No matching passages were found in the budget speeches.".to_string());
        }

        let mut passages = String::new();
        for (chunk, score) in hits {
            passages.push_str(&format!(
                "[{} #{} | similarity {score:.3}]\n{}\n\n",
                chunk.source, chunk.position, chunk.content
            ));
        }
        Ok(passages.trim_end().to_string())
    }
}

/// Whole-corpus summarization backed by the dedicated summary model.
pub struct SummaryQueryTool {
    index: Arc<SummaryIndex>,
    summarizer: Agent<ResponsesCompletionModel>,
    digest_chars: usize,
}

impl SummaryQueryTool {
    pub fn new(index: Arc<SummaryIndex>, client: &openai::Client, model: &str) -> Self {
        let summarizer = client.agent(model).preamble(SUMMARIZER_PREAMBLE).build();
        Self {
            index,
            summarizer,
            digest_chars: DEFAULT_DIGEST_CHARS,
        }
    }
}

impl Tool for SummaryQueryTool {
    const NAME: &'static str = "summary_tool";

    type Error = RetrievalToolError;
    type Args = RetrievalArgs;
    type Output = String;

    async fn definition(&self, _prompt: String) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: SUMMARY_TOOL_DESCRIPTION.to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The holistic summary request to fulfil"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
        debug!(query = %args.query, "summary_tool invoked");
        let digest = self.index.corpus_digest(self.digest_chars);
        if digest.is_empty() {
            return Ok("The corpus is empty; there is nothing to summarize.".to_string());
        }

        let prompt = format!(
            "Speech text:\n\n{digest}\n\nRequest: {query}",
            query = args.query
        );
        self.summarizer
            .prompt(prompt)
            .await
            .map_err(|err| RetrievalToolError::Summarize(err.to_string()))
    }
}

/// The registry: exactly these two tools, in this order. No dynamic
/// registration or removal.
pub struct RetrievalTools<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    pub vector: VectorSearchTool<E>,
    pub summary: SummaryQueryTool,
}

impl<E> RetrievalTools<E>
where
    E: EmbeddingModel + Clone + Send + Sync + 'static,
{
    pub fn new(
        vector_index: Arc<VectorIndex<E>>,
        summary_index: Arc<SummaryIndex>,
        client: &openai::Client,
        summary_model: &str,
    ) -> Self {
        Self {
            vector: VectorSearchTool::new(vector_index, DEFAULT_TOP_K),
            summary: SummaryQueryTool::new(summary_index, client, summary_model),
        }
    }
}
