//! Runtime settings, read from command-line flags or `POLICY_RAG_*`
//! environment variables.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};
use policy_rag::config::DEFAULT_SIMILARITY_THRESHOLD;
use policy_rag::openai::{DEFAULT_CHAT_MODEL, DEFAULT_EMBEDDING_DIMENSIONS, DEFAULT_EMBEDDING_MODEL};
use policy_rag::{ChunkingConfig, HashingEmbeddingProvider, RagConfig, Result};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Everything needed to build and serve a pipeline.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Address to bind.
    #[arg(long, env = "POLICY_RAG_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind.
    #[arg(long, env = "POLICY_RAG_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Directory of `.md`/`.txt` policy documents to index at startup.
    #[arg(long, env = "POLICY_RAG_CORPUS_DIR", default_value = "corpus")]
    pub corpus_dir: PathBuf,

    #[arg(long, env = "POLICY_RAG_CHUNK_SIZE", default_value_t = 300)]
    pub chunk_size: usize,

    #[arg(long, env = "POLICY_RAG_CHUNK_OVERLAP", default_value_t = 30)]
    pub chunk_overlap: usize,

    #[arg(long, env = "POLICY_RAG_TOP_K", default_value_t = 4)]
    pub top_k: usize,

    /// Minimum top-match similarity for a question to be answered.
    #[arg(long, env = "POLICY_RAG_SIMILARITY_THRESHOLD", default_value_t = DEFAULT_SIMILARITY_THRESHOLD)]
    pub similarity_threshold: f32,

    /// Optional fraction of question terms that must appear in the top match.
    #[arg(long, env = "POLICY_RAG_MIN_TERM_OVERLAP")]
    pub min_term_overlap: Option<f32>,

    #[arg(long, env = "POLICY_RAG_MAX_CONTEXT_CHARS", default_value_t = 4000)]
    pub max_context_chars: usize,

    #[arg(long, env = "POLICY_RAG_MAX_TOKENS", default_value_t = 500)]
    pub max_tokens: u32,

    #[arg(long, env = "POLICY_RAG_TEMPERATURE", default_value_t = 0.0)]
    pub temperature: f32,

    #[arg(long, env = "POLICY_RAG_RETRIEVAL_TIMEOUT_MS", default_value_t = 10_000)]
    pub retrieval_timeout_ms: u64,

    #[arg(long, env = "POLICY_RAG_GENERATION_TIMEOUT_MS", default_value_t = 60_000)]
    pub generation_timeout_ms: u64,

    /// Override the decline message.
    #[arg(long, env = "POLICY_RAG_DECLINE_MESSAGE")]
    pub decline_message: Option<String>,

    /// Enables the OpenAI embedder and chat generator. Without it the
    /// service runs fully offline on hashed embeddings and extractive answers.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    #[arg(long, env = "POLICY_RAG_CHAT_MODEL", default_value = DEFAULT_CHAT_MODEL)]
    pub chat_model: String,

    #[arg(long, env = "POLICY_RAG_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    pub embedding_model: String,

    #[arg(long, env = "POLICY_RAG_EMBEDDING_DIMENSIONS", default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    pub embedding_dimensions: usize,

    /// Bucket count of the offline hashing embedder.
    #[arg(long, env = "POLICY_RAG_HASHING_DIMENSIONS", default_value_t = HashingEmbeddingProvider::DEFAULT_DIMENSIONS)]
    pub hashing_dimensions: usize,

    /// Largest accepted request body, in bytes.
    #[arg(long, env = "POLICY_RAG_MAX_BODY_BYTES", default_value_t = 64 * 1024)]
    pub max_body_bytes: usize,

    #[arg(long, env = "POLICY_RAG_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Settings {
    /// The OpenAI key, if one was supplied and is not blank.
    pub fn openai_key(&self) -> Option<&str> {
        self.openai_api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    /// Validated answering configuration.
    pub fn rag_config(&self) -> Result<RagConfig> {
        let mut builder = RagConfig::builder()
            .top_k(self.top_k)
            .similarity_threshold(self.similarity_threshold)
            .max_context_chars(self.max_context_chars)
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .retrieval_timeout(Duration::from_millis(self.retrieval_timeout_ms))
            .generation_timeout(Duration::from_millis(self.generation_timeout_ms));
        if let Some(overlap) = self.min_term_overlap {
            builder = builder.min_term_overlap(overlap);
        }
        if let Some(message) = &self.decline_message {
            builder = builder.decline_message(message.clone());
        }
        builder.build()
    }

    /// Validated chunking configuration.
    pub fn chunking(&self) -> Result<ChunkingConfig> {
        ChunkingConfig::new(self.chunk_size, self.chunk_overlap)
    }
}
