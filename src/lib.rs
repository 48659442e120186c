//! Conversational question answering over Indian budget speeches.
//!
//! ```text
//! pdfs/ ──► ingest::load_directory ──► SentenceSplitter ──► [Chunk]
//!                                                             │
//!                            ┌────────────────────────────────┤
//!                            ▼                                ▼
//!              VectorIndex::load_or_build            SummaryIndex::from_chunks
//!             (persisted, embeddings once)            (rebuilt every session)
//!                            │                                │
//!                            ▼                                ▼
//!                      vector_tool                      summary_tool
//!                            └────────────┬───────────────────┘
//!                                         ▼
//!                                   RoutingAgent ──► streamed answer
//!                                         ▲
//!                                  SessionRegistry (append-only turns)
//! ```
//!
//! The agent decides per question which retrieval tool to call; narrow
//! questions go through chunk-level similarity search, holistic requests
//! through whole-corpus summarization. Answers stream incrementally and the
//! full concatenation lands in the session transcript.

pub mod agent;
pub mod config;
pub mod index;
pub mod ingest;
pub mod session;
pub mod tools;
pub mod types;

pub use agent::{AnswerStream, GenerationError, RoutingAgent};
pub use config::AppConfig;
pub use index::{SummaryIndex, VectorIndex};
pub use ingest::{SentenceSplitter, load_directory};
pub use session::{ChatSession, SessionId, SessionRegistry, Turn, TurnOutcome};
pub use tools::RetrievalTools;
pub use types::{Chunk, QaError, SourceDocument};
