//! Generator trait for the language-model completion call.

use async_trait::async_trait;

use crate::config::GenerationParams;
use crate::error::{FailureKind, Result};

/// A text-generation service.
///
/// Implementations report failures as
/// [`RagError::GenerationServiceError`](crate::RagError::GenerationServiceError)
/// with a [`FailureKind`] so the caller can decide whether to retry. They
/// must not retry internally, and must never turn a failure into text.
///
/// Dropping the returned future aborts the in-flight request for HTTP-based
/// implementations.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Complete `prompt` with the given decoding parameters.
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// Provider or model name for logs.
    fn name(&self) -> &str;
}

/// Classify an HTTP status code returned by a model or embedding service.
///
/// Request timeouts, rate limits and server errors are worth retrying;
/// authentication, permission and request-shape errors are not.
pub fn classify_status(status: u16) -> FailureKind {
    match status {
        408 | 409 | 425 | 429 => FailureKind::Retryable,
        500..=599 => FailureKind::Retryable,
        _ => FailureKind::Fatal,
    }
}
