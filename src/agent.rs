//! The routing agent: picks a retrieval tool and streams the answer.
//!
//! Tool selection is delegated to the model's function calling over the two
//! registered tool descriptions; this module only fixes the system prompt,
//! wires the registry into the agent, and adapts the provider stream into a
//! plain fragment stream.

use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use rig::agent::{Agent, MultiTurnStreamItem};
use rig::client::CompletionClient;
use rig::completion::Message as ModelMessage;
use rig::embeddings::embedding::EmbeddingModel;
use rig::message::Text;
use rig::providers::openai;
use rig::providers::openai::responses_api::ResponsesCompletionModel;
use rig::streaming::{StreamedAssistantContent, StreamingPrompt};
use thiserror::Error;
use tracing::{info, warn};

use crate::session::Turn;
use crate::tools::RetrievalTools;

/// Internal turns the streaming loop may take (tool calls plus the final
/// answer) before the provider stops.
const MAX_TOOL_ROUNDS: usize = 3;

const SYSTEM_PROMPT: &str = "\
You are a specialized assistant for questions about the Indian budget speeches \
in your knowledge base, including the previous year's speech for comparisons.

Rules:
1. Always use at least one of the provided tools when answering a question \
about the budget. Use vector_tool for specific sections, figures, or \
allocations; use summary_tool for holistic overviews.
2. If a question is unrelated to the Indian budget, politely decline, explain \
your role, and do not call any tool.
3. Present answers clearly: short headings, bullet points for lists, tables \
for comparisons between years.
4. Stay neutral; you are not affiliated with any government or organization.
5. Ground every claim in the retrieved speech text.";

/// Errors raised while generating an answer. Confined to the turn that
/// produced them; the session stays usable.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The underlying model or network call failed mid-stream.
    #[error("model stream failed: {0}")]
    Stream(String),
}

/// Lazy sequence of answer fragments. Partial output is provisional until the
/// stream ends; an `Err` item is terminal for the turn.
pub type AnswerStream<'a> =
    Pin<Box<dyn Stream<Item = Result<String, GenerationError>> + Send + 'a>>;

/// Agent that routes questions to the retrieval tools and streams answers.
pub struct RoutingAgent {
    agent: Agent<ResponsesCompletionModel>,
}

impl RoutingAgent {
    /// Builds the agent once per session: system prompt plus the fixed
    /// two-tool registry, answered by `qa_model`.
    pub fn new<E>(client: &openai::Client, qa_model: &str, tools: RetrievalTools<E>) -> Self
    where
        E: EmbeddingModel + Clone + Send + Sync + 'static,
    {
        let agent = client
            .agent(qa_model)
            .preamble(SYSTEM_PROMPT)
            .temperature(0.1)
            .tool(tools.vector)
            .tool(tools.summary)
            .build();
        Self { agent }
    }

    /// Streams the answer to `question` given the prior conversation turns.
    ///
    /// Fragments arrive incrementally; the concatenation of all `Ok` items is
    /// the final answer once the stream is exhausted. A provider failure
    /// yields one `Err` item after whatever fragments were already produced,
    /// so callers can keep the partial output.
    pub async fn respond<'a>(&'a self, question: &str, history: &[Turn]) -> AnswerStream<'a> {
        let history: Vec<ModelMessage> = history
            .iter()
            .map(|turn| {
                if turn.has_role(Turn::ASSISTANT) {
                    ModelMessage::assistant(&turn.content)
                } else {
                    ModelMessage::user(&turn.content)
                }
            })
            .collect();

        let stream = self
            .agent
            .stream_prompt(question)
            .with_history(history)
            .multi_turn(MAX_TOOL_ROUNDS)
            .await;

        Box::pin(stream.filter_map(|item| async move {
            match item {
                Ok(MultiTurnStreamItem::StreamAssistantItem(StreamedAssistantContent::Text(
                    Text { text },
                ))) => Some(Ok(text)),
                Ok(MultiTurnStreamItem::StreamAssistantItem(StreamedAssistantContent::ToolCall(
                    call,
                ))) => {
                    info!(tool = %call.function.name, "retrieval tool selected");
                    None
                }
                Ok(MultiTurnStreamItem::FinalResponse(_)) => None,
                Ok(_) => None,
                Err(err) => {
                    warn!(error = %err, "generation stream failed");
                    Some(Err(GenerationError::Stream(err.to_string())))
                }
            }
        }))
    }
}
