//! Conversation history and the per-session chat controller.
//!
//! History is append-only for the life of a session: each `ask` appends one
//! user turn and exactly one assistant turn, in that order, and no earlier
//! turn is ever edited. A failed generation is recorded fail-soft — the
//! partial answer plus an error note — and the session stays usable.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::agent::{AnswerStream, GenerationError, RoutingAgent};

/// One role-tagged message in a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Role of the sender; use the constants on [`Turn`].
    pub role: String,
    /// The message text.
    pub content: String,
}

impl Turn {
    /// User input role.
    pub const USER: &'static str = "user";
    /// Assistant response role.
    pub const ASSISTANT: &'static str = "assistant";

    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}

/// Result of one question/answer exchange.
#[derive(Debug)]
pub struct TurnOutcome {
    /// Concatenation of every fragment that streamed in.
    pub answer: String,
    /// Set when the stream failed; `answer` then holds the partial output.
    pub error: Option<GenerationError>,
}

impl TurnOutcome {
    /// Text recorded in the transcript: the full answer, or the partial
    /// output annotated with the failure.
    pub fn recorded(&self) -> String {
        match &self.error {
            None => self.answer.clone(),
            Some(err) if self.answer.is_empty() => {
                format!("The answer could not be generated: {err}")
            }
            Some(err) => format!("{}\n\n[answer interrupted: {err}]", self.answer),
        }
    }
}

/// Consumes an answer stream, invoking `render` for every fragment as it
/// arrives. An `Err` item ends the turn; fragments gathered before it are
/// kept.
pub(crate) async fn drain_answer(
    mut stream: AnswerStream<'_>,
    render: &mut dyn FnMut(&str),
) -> TurnOutcome {
    let mut answer = String::new();
    let mut error = None;

    while let Some(item) = stream.next().await {
        match item {
            Ok(fragment) => {
                render(&fragment);
                answer.push_str(&fragment);
            }
            Err(err) => {
                error = Some(err);
                break;
            }
        }
    }

    TurnOutcome { answer, error }
}

/// Ordered conversation state for one user session.
#[derive(Debug, Default)]
pub struct ChatSession {
    history: Vec<Turn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// The append-only transcript, oldest turn first.
    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    /// Runs one exchange: invokes the agent exactly once with the prior
    /// turns, renders fragments incrementally, then appends the user turn and
    /// one assistant turn with the full concatenated answer.
    pub async fn ask(
        &mut self,
        agent: &RoutingAgent,
        question: &str,
        mut render: impl FnMut(&str),
    ) -> TurnOutcome {
        let stream = agent.respond(question, &self.history).await;
        let outcome = drain_answer(stream, &mut render).await;
        self.apply_turn(question, &outcome);
        debug!(turns = self.history.len(), failed = outcome.error.is_some(), "turn recorded");
        outcome
    }

    fn apply_turn(&mut self, question: &str, outcome: &TurnOutcome) {
        self.history.push(Turn::user(question));
        self.history.push(Turn::assistant(&outcome.recorded()));
    }
}

/// Opaque session identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Explicit session registry: maps session ids to their conversation state,
/// constructing sessions on first access. All sessions share one routing
/// agent, built once for the process.
pub struct SessionRegistry {
    agent: Arc<RoutingAgent>,
    sessions: HashMap<SessionId, ChatSession>,
}

impl SessionRegistry {
    pub fn new(agent: Arc<RoutingAgent>) -> Self {
        Self {
            agent,
            sessions: HashMap::new(),
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Returns the session for `id`, creating it if absent.
    pub fn session(&mut self, id: SessionId) -> &mut ChatSession {
        self.sessions.entry(id).or_default()
    }

    /// Runs one exchange within the identified session.
    pub async fn ask(
        &mut self,
        id: SessionId,
        question: &str,
        render: impl FnMut(&str),
    ) -> TurnOutcome {
        let agent = Arc::clone(&self.agent);
        let session = self.sessions.entry(id).or_default();
        session.ask(&agent, question, render).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment_stream(
        items: Vec<Result<String, GenerationError>>,
    ) -> AnswerStream<'static> {
        Box::pin(async_stream::stream! {
            for item in items {
                yield item;
            }
        })
    }

    #[tokio::test]
    async fn streamed_fragments_reassemble_exactly() {
        let stream = fragment_stream(vec![
            Ok("The fiscal ".to_string()),
            Ok("deficit target ".to_string()),
            Ok("is 5.1%.".to_string()),
        ]);

        let mut rendered = String::new();
        let outcome = drain_answer(stream, &mut |frag| rendered.push_str(frag)).await;

        assert_eq!(outcome.answer, "The fiscal deficit target is 5.1%.");
        assert_eq!(rendered, outcome.answer);
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn partial_output_survives_a_stream_failure() {
        let stream = fragment_stream(vec![
            Ok("Capital expenditure ".to_string()),
            Err(GenerationError::Stream("connection reset".to_string())),
            Ok("never delivered".to_string()),
        ]);

        let outcome = drain_answer(stream, &mut |_| {}).await;

        assert_eq!(outcome.answer, "Capital expenditure ");
        assert!(outcome.error.is_some());
        let recorded = outcome.recorded();
        assert!(recorded.starts_with("Capital expenditure "));
        assert!(recorded.contains("connection reset"));
    }

    #[tokio::test]
    async fn failed_turn_with_no_output_records_an_error_message() {
        let stream = fragment_stream(vec![Err(GenerationError::Stream(
            "rate limited".to_string(),
        ))]);
        let outcome = drain_answer(stream, &mut |_| {}).await;
        assert!(outcome.answer.is_empty());
        assert!(outcome.recorded().contains("rate limited"));
    }

    #[test]
    fn history_is_append_only_and_alternating() {
        let mut session = ChatSession::new();
        let questions = ["What is the capex outlay?", "And the deficit target?", "Thanks"];

        for (index, question) in questions.iter().enumerate() {
            let outcome = TurnOutcome {
                answer: format!("answer {index}"),
                error: None,
            };
            let before: Vec<Turn> = session.history().to_vec();
            session.apply_turn(question, &outcome);

            // Earlier turns are untouched.
            assert_eq!(&session.history()[..before.len()], &before[..]);
            assert_eq!(session.history().len(), 2 * (index + 1));
        }

        for (index, turn) in session.history().iter().enumerate() {
            let expected = if index % 2 == 0 { Turn::USER } else { Turn::ASSISTANT };
            assert!(turn.has_role(expected), "turn {index} out of order");
        }
    }

    #[test]
    fn failed_turn_is_recorded_and_session_stays_usable() {
        let mut session = ChatSession::new();
        session.apply_turn(
            "first",
            &TurnOutcome {
                answer: "partial".to_string(),
                error: Some(GenerationError::Stream("timeout".to_string())),
            },
        );
        session.apply_turn(
            "second",
            &TurnOutcome {
                answer: "complete answer".to_string(),
                error: None,
            },
        );

        assert_eq!(session.history().len(), 4);
        assert!(session.history()[1].content.contains("timeout"));
        assert_eq!(session.history()[3].content, "complete answer");
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
