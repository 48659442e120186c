//! Terminal chat loop for budget speech Q&A.
//!
//! Startup is fail-fast: configuration, ingestion, and index build errors are
//! surfaced with a user-visible message and the process halts. Once the loop
//! is running, a failed generation only ends that turn.

use std::io::Write as _;
use std::sync::Arc;

use rig::client::EmbeddingsClient;
use rig::providers::openai;
use tokio::io::AsyncBufReadExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

use budget_qa::agent::RoutingAgent;
use budget_qa::config::{AppConfig, ConfigError, EMBEDDING_MODEL, QA_MODEL, SUMMARY_MODEL};
use budget_qa::index::{SummaryIndex, VectorIndex};
use budget_qa::ingest::{self, DEFAULT_CHUNK_TOKENS, SentenceSplitter};
use budget_qa::session::{SessionId, SessionRegistry};
use budget_qa::tools::RetrievalTools;
use budget_qa::types::QaError;

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("budget-qa: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), QaError> {
    let config = AppConfig::from_env()?;

    let documents = ingest::load_directory(&config.document_dir).await?;
    let splitter = SentenceSplitter::new(DEFAULT_CHUNK_TOKENS)?;
    let chunks = splitter.split_documents(&documents);
    info!(documents = documents.len(), chunks = chunks.len(), "corpus prepared");

    let client = openai::Client::new(&config.api_key)
        .map_err(|err| ConfigError::Client(err.to_string()))?;
    let embedding_model = client.embedding_model(EMBEDDING_MODEL);

    let vector_index =
        Arc::new(VectorIndex::load_or_build(&config.index_path, &chunks, embedding_model).await?);
    let summary_index = Arc::new(SummaryIndex::from_chunks(chunks));
    info!(
        indexed = vector_index.chunk_count().await?,
        "retrieval indexes ready"
    );

    let tools = RetrievalTools::new(vector_index, summary_index, &client, SUMMARY_MODEL);
    let agent = Arc::new(RoutingAgent::new(&client, QA_MODEL, tools));
    let mut registry = SessionRegistry::new(agent);
    let session_id = SessionId::new();

    println!("Indian Budget Q&A — ask about the budget speeches (type 'exit' to quit).");
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\nask> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        let outcome = registry
            .ask(session_id, question, |fragment| {
                print!("{fragment}");
                let _ = std::io::stdout().flush();
            })
            .await;
        println!();

        if let Some(err) = outcome.error {
            if outcome.answer.is_empty() {
                eprintln!("(no answer: {err})");
            } else {
                eprintln!("(answer interrupted: {err})");
            }
        }
    }

    println!("bye");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("budget_qa=info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
