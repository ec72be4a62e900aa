//! Configuration for the answering pipeline and the ingestion phase.
//!
//! Configuration is always passed in explicitly. Nothing in this crate reads
//! process environment; the server crate is responsible for assembling a
//! [`RagConfig`] from whatever source it likes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// The canonical text returned when a question falls outside the corpus.
pub const DEFAULT_DECLINE_MESSAGE: &str =
    "I can only answer questions about our company policies and procedures.";

/// Default minimum top-match cosine similarity for a question to count as
/// in-corpus.
///
/// Calibrated for short policy chunks (~300 characters). Lowering it lets
/// loosely related context through to the generator and raises the
/// hallucination risk; raising it makes the gate decline valid paraphrased
/// questions. Recalibrate per corpus and per embedder.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.30;

/// Decoding parameters sent to the generation service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationParams {
    /// Sampling temperature. `0.0` keeps repeated identical questions as
    /// close to reproducible as the service allows.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self { temperature: 0.0, max_tokens: 500 }
    }
}

/// Configuration parameters for the answering pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Number of nearest chunks to retrieve per question.
    pub top_k: usize,
    /// Minimum similarity of the top match for the question to be answered.
    pub similarity_threshold: f32,
    /// Optional lexical check: minimum fraction of the question's content
    /// terms that must appear in the top match.
    pub min_term_overlap: Option<f32>,
    /// Maximum total characters of chunk text placed in the prompt.
    pub max_context_chars: usize,
    /// Text returned verbatim when the gate declines.
    pub decline_message: String,
    /// Decoding parameters for the generation call.
    pub generation: GenerationParams,
    /// Deadline for query embedding plus index search.
    #[serde(with = "duration_millis")]
    pub retrieval_timeout: Duration,
    /// Deadline for the generation call.
    #[serde(with = "duration_millis")]
    pub generation_timeout: Duration,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            min_term_overlap: None,
            max_context_chars: 4000,
            decline_message: DEFAULT_DECLINE_MESSAGE.to_string(),
            generation: GenerationParams::default(),
            retrieval_timeout: Duration::from_secs(10),
            generation_timeout: Duration::from_secs(60),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that all parameters are within range.
    ///
    /// Called by [`RagConfigBuilder::build`]; call it directly on configs
    /// that were deserialized rather than built.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        let threshold = self.similarity_threshold;
        if !threshold.is_finite() || !(-1.0..=1.0).contains(&threshold) {
            return Err(RagError::ConfigError(format!(
                "similarity_threshold ({threshold}) must be within [-1, 1]"
            )));
        }
        if let Some(overlap) = self.min_term_overlap {
            if !(0.0..=1.0).contains(&overlap) {
                return Err(RagError::ConfigError(format!(
                    "min_term_overlap ({overlap}) must be within [0, 1]"
                )));
            }
        }
        if self.max_context_chars == 0 {
            return Err(RagError::ConfigError(
                "max_context_chars must be greater than zero".to_string(),
            ));
        }
        if self.decline_message.trim().is_empty() {
            return Err(RagError::ConfigError("decline_message must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(RagError::ConfigError(format!(
                "temperature ({}) must be within [0, 2]",
                self.generation.temperature
            )));
        }
        if self.generation.max_tokens == 0 {
            return Err(RagError::ConfigError("max_tokens must be greater than zero".to_string()));
        }
        if self.retrieval_timeout.is_zero() || self.generation_timeout.is_zero() {
            return Err(RagError::ConfigError("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the number of nearest chunks to retrieve.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum top-match similarity for answering.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Require a minimum fraction of question terms to appear in the top match.
    pub fn min_term_overlap(mut self, overlap: f32) -> Self {
        self.config.min_term_overlap = Some(overlap);
        self
    }

    /// Set the maximum characters of context placed in the prompt.
    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.config.max_context_chars = chars;
        self
    }

    /// Override the canonical decline message.
    pub fn decline_message(mut self, message: impl Into<String>) -> Self {
        self.config.decline_message = message.into();
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.generation.temperature = temperature;
        self
    }

    /// Set the maximum number of generated tokens.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.generation.max_tokens = max_tokens;
        self
    }

    /// Set the retrieval deadline.
    pub fn retrieval_timeout(mut self, timeout: Duration) -> Self {
        self.config.retrieval_timeout = timeout;
        self
    }

    /// Set the generation deadline.
    pub fn generation_timeout(mut self, timeout: Duration) -> Self {
        self.config.generation_timeout = timeout;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `top_k == 0` or `max_context_chars == 0`
    /// - `similarity_threshold` is outside `[-1, 1]`
    /// - `min_term_overlap` is outside `[0, 1]`
    /// - the decline message is blank
    /// - `temperature` is outside `[0, 2]` or `max_tokens == 0`
    /// - either timeout is zero
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Chunking parameters for the ingestion phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 300, chunk_overlap: 30 }
    }
}

impl ChunkingConfig {
    /// Create a validated chunking configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `chunk_size == 0` or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RagConfig::builder().build().unwrap();
        assert_eq!(config.top_k, 4);
        assert_eq!(config.generation.temperature, 0.0);
        assert_eq!(config.generation.max_tokens, 500);
        assert_eq!(config.decline_message, DEFAULT_DECLINE_MESSAGE);
    }

    #[test]
    fn rejects_zero_top_k() {
        let err = RagConfig::builder().top_k(0).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        assert!(RagConfig::builder().similarity_threshold(1.5).build().is_err());
        assert!(RagConfig::builder().similarity_threshold(f32::NAN).build().is_err());
        assert!(RagConfig::builder().similarity_threshold(-1.0).build().is_ok());
    }

    #[test]
    fn rejects_blank_decline_message() {
        assert!(RagConfig::builder().decline_message("   ").build().is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        assert!(RagConfig::builder().generation_timeout(Duration::ZERO).build().is_err());
    }

    #[test]
    fn deserializes_partial_json_with_defaults() {
        let config: RagConfig =
            serde_json::from_str(r#"{"top_k": 2, "retrieval_timeout": 1500}"#).unwrap();
        assert_eq!(config.top_k, 2);
        assert_eq!(config.retrieval_timeout, Duration::from_millis(1500));
        assert_eq!(config.similarity_threshold, DEFAULT_SIMILARITY_THRESHOLD);
        config.validate().unwrap();
    }

    #[test]
    fn chunking_overlap_must_be_smaller_than_size() {
        assert!(ChunkingConfig::new(100, 100).is_err());
        assert!(ChunkingConfig::new(0, 0).is_err());
        assert_eq!(ChunkingConfig::new(300, 30).unwrap(), ChunkingConfig::default());
    }
}
