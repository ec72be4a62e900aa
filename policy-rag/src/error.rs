//! Error types for the `policy-rag` crate.
//!
//! Declining to answer is not an error. A question that the relevance gate
//! rejects produces an [`AnswerResult`](crate::AnswerResult) with
//! `in_corpus == false`; everything in this module is a genuine failure that
//! the caller must be able to tell apart from a decline.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Whether a failed collaborator call may succeed if the caller retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Timeouts, rate limits, connection resets, 5xx responses.
    Retryable,
    /// Invalid credentials, bad configuration, malformed responses.
    Fatal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retryable => f.write_str("retryable"),
            Self::Fatal => f.write_str("fatal"),
        }
    }
}

/// Why the vector index could not serve a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexUnavailableReason {
    /// The index holds no chunks. The pipeline turns this into a decline.
    Empty,
    /// The backing store could not be reached.
    Unreachable,
}

impl fmt::Display for IndexUnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty"),
            Self::Unreachable => f.write_str("unreachable"),
        }
    }
}

/// A pipeline stage that crosses a process or network boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Query embedding plus nearest-neighbour search.
    Retrieval,
    /// The language-model completion call.
    Generation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retrieval => f.write_str("retrieval"),
            Self::Generation => f.write_str("generation"),
        }
    }
}

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// The question was empty or malformed. Raised before any I/O.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The vector index was empty or could not be reached.
    #[error("Index unavailable ({backend}, {reason}): {message}")]
    IndexUnavailable {
        /// The vector index backend that produced the error.
        backend: String,
        /// Whether the index is empty or unreachable.
        reason: IndexUnavailableReason,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}, {kind}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// Whether the call may be retried.
        kind: FailureKind,
        /// A description of the failure.
        message: String,
    },

    /// The generation service failed.
    #[error("Generation service error ({provider}, {kind}): {message}")]
    GenerationServiceError {
        /// The generator that produced the error.
        provider: String,
        /// Whether the call may be retried.
        kind: FailureKind,
        /// A description of the failure.
        message: String,
    },

    /// A collaborator call exceeded its configured deadline.
    #[error("{stage} timed out after {}ms", .after.as_millis())]
    Timeout {
        /// The stage that timed out.
        stage: Stage,
        /// The configured deadline.
        after: Duration,
    },

    /// The query embedder is not the embedder the index was built with.
    #[error("Embedder mismatch: index built with '{index_model}', got '{provider_model}'")]
    EmbedderMismatch {
        /// Embedder identity recorded by the index.
        index_model: String,
        /// Embedder identity of the configured provider.
        provider_model: String,
    },

    /// An embedding had a different length than the index expects.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimensionality of the index.
        expected: usize,
        /// Dimensionality of the offending vector.
        actual: usize,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during document chunking or corpus loading.
    #[error("Chunking error: {0}")]
    ChunkingError(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl RagError {
    /// Whether the caller may reasonably retry the same question later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::IndexUnavailable { reason, .. } => *reason == IndexUnavailableReason::Unreachable,
            Self::EmbeddingError { kind, .. } | Self::GenerationServiceError { kind, .. } => {
                *kind == FailureKind::Retryable
            }
            _ => false,
        }
    }

    /// Stable machine-readable code for wire responses and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::IndexUnavailable { .. } => "index_unavailable",
            Self::EmbeddingError { .. } => "embedding_error",
            Self::GenerationServiceError { .. } => "generation_service_error",
            Self::Timeout { .. } => "timeout",
            Self::EmbedderMismatch { .. } => "embedder_mismatch",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::VectorStoreError { .. } => "vector_store_error",
            Self::ChunkingError(_) => "chunking_error",
            Self::ConfigError(_) => "config_error",
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
