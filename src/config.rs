//! Environment-backed application configuration.
//!
//! The one required secret is `OPENAI_API_KEY`; its absence is a fatal
//! startup condition. Directory locations can be overridden per deployment,
//! while the model identifiers for the three roles (question answering,
//! summarization, embedding) are fixed at build time.

use std::path::PathBuf;

use thiserror::Error;

/// Model used by the routing agent to answer questions.
pub const QA_MODEL: &str = "gpt-4o-mini";
/// Model used by the summary tool for whole-corpus requests.
pub const SUMMARY_MODEL: &str = "gpt-4o-mini";
/// Model used to embed chunks and queries.
pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";

const DEFAULT_DOCUMENT_DIR: &str = "pdfs";
const DEFAULT_INDEX_PATH: &str = "storage/budget_index.sqlite";

/// Errors raised while resolving configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The language-model API key is missing or blank.
    #[error("OPENAI_API_KEY is not set; add it to the environment or a .env file")]
    MissingApiKey,

    /// The provider client could not be constructed from the resolved
    /// configuration (for example, a key that is not a valid header value).
    #[error("unable to construct the model provider client: {0}")]
    Client(String),
}

/// Resolved runtime configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// API key for the hosted language-model provider.
    pub api_key: String,
    /// Directory holding the source documents.
    pub document_dir: PathBuf,
    /// SQLite file the vector index is persisted to.
    pub index_path: PathBuf,
}

impl AppConfig {
    /// Loads configuration from the process environment, reading a `.env`
    /// file first when one is present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingApiKey`] when no usable API key is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let document_dir = std::env::var("BUDGET_QA_PDF_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DOCUMENT_DIR));

        let index_path = std::env::var("BUDGET_QA_INDEX_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_INDEX_PATH));

        Ok(Self {
            api_key,
            document_dir,
            index_path,
        })
    }

    /// Builds a configuration from explicit values, bypassing the
    /// environment. Used by tests and embedding callers.
    pub fn new(
        api_key: impl Into<String>,
        document_dir: impl Into<PathBuf>,
        index_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            document_dir: document_dir.into(),
            index_path: index_path.into(),
        }
    }
}
