//! Answering pipeline orchestrator.
//!
//! The [`RagPipeline`] turns a question into an [`AnswerResult`] by composing
//! an [`EmbeddingProvider`], a [`VectorIndex`], the [`RelevanceGate`], the
//! [`PromptComposer`], a [`Generator`] and citation extraction.
//!
//! ```text
//! START → EMBEDDED → RETRIEVED → DECLINED ──────────────→ DONE
//!                              ↘ GENERATING → (cite) → DONE
//! ```
//!
//! Declining and failing are distinct outcomes. A decline is an `Ok` result
//! with `in_corpus == false`; a collaborator failure is an `Err`. The only
//! failure that is converted into a decline is an empty index.
//!
//! # Example
//!
//! ```rust,ignore
//! use policy_rag::{RagPipeline, RagConfig, InMemoryVectorStore, HashingEmbeddingProvider};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_index(Arc::new(store))
//!     .generator(Arc::new(generator))
//!     .build()?;
//!
//! let result = pipeline.answer("What are the core working hours?").await?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::citation::extract_citations;
use crate::config::RagConfig;
use crate::document::{AnswerResult, RetrievedMatch};
use crate::embedding::EmbeddingProvider;
use crate::error::{FailureKind, IndexUnavailableReason, RagError, Result, Stage};
use crate::gate::{GateDecision, RelevanceGate};
use crate::generation::Generator;
use crate::prompt::PromptComposer;
use crate::retriever::Retriever;
use crate::vectorstore::VectorIndex;

/// Maximum accepted question length in characters.
pub const MAX_QUESTION_CHARS: usize = 2000;

/// States an `answer` call moves through, recorded in debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Start,
    Embedded,
    Retrieved,
    Declined,
    Generating,
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "START",
            Self::Embedded => "EMBEDDED",
            Self::Retrieved => "RETRIEVED",
            Self::Declined => "DECLINED",
            Self::Generating => "GENERATING",
            Self::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// The answering pipeline.
///
/// Holds only read-only collaborators and configuration, so one instance
/// can serve concurrent `answer` calls. Construct one via
/// [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    retriever: Retriever,
    gate: RelevanceGate,
    composer: PromptComposer,
    generator: Arc<dyn Generator>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the vector index.
    pub fn vector_index(&self) -> &Arc<dyn VectorIndex> {
        self.retriever.index()
    }

    /// Answer `question` from the corpus, or decline.
    ///
    /// Surrounding whitespace is ignored for retrieval; the result echoes
    /// `question` exactly as passed in.
    ///
    /// Dropping the returned future cancels any in-flight retrieval or
    /// generation call; no pipeline state survives between calls.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidInput`] for a blank or oversized question, before
    ///   any I/O
    /// - [`RagError::Timeout`] if retrieval or generation exceeds its deadline
    /// - [`RagError::IndexUnavailable`] (unreachable), embedding and
    ///   [`RagError::GenerationServiceError`] failures, unchanged
    pub async fn answer(&self, question: &str) -> Result<AnswerResult> {
        let span = info_span!("answer", question_chars = question.chars().count());
        self.answer_inner(question).instrument(span).await
    }

    async fn answer_inner(&self, received: &str) -> Result<AnswerResult> {
        let started = Instant::now();
        let question = validate_question(received)?;
        debug!(state = %PipelineState::Start, "answering");

        let matches = match self.retrieve(question).await {
            Ok(matches) => matches,
            Err(RagError::IndexUnavailable { reason: IndexUnavailableReason::Empty, .. }) => {
                warn!("index is empty, declining");
                return Ok(self.decline(received, started));
            }
            Err(e) => {
                error!(error = %e, retryable = e.is_retryable(), "retrieval failed");
                return Err(e);
            }
        };
        info!(
            state = %PipelineState::Retrieved,
            match_count = matches.len(),
            top_score = matches.first().map(|m| m.score),
            "retrieval completed"
        );

        let admitted = match self.gate.decide(question, &matches) {
            GateDecision::InCorpus(admitted) => admitted,
            GateDecision::OutOfCorpus { top_score } => {
                info!(?top_score, threshold = self.gate.threshold(), "question is out of corpus");
                return Ok(self.decline(received, started));
            }
        };
        debug!(state = %PipelineState::Generating, admitted = admitted.len(), "gate passed");

        let composed = self.composer.compose(question, &admitted);
        let used: Vec<RetrievedMatch> = admitted
            .into_iter()
            .filter(|m| composed.context.entries.iter().any(|e| e.rank == m.rank))
            .collect();

        let answer = self.generate(&composed.prompt).await.map_err(|e| {
            error!(
                generator = self.generator.name(),
                error = %e,
                retryable = e.is_retryable(),
                "generation failed"
            );
            e
        })?;

        let citations = extract_citations(&used);
        info!(
            state = %PipelineState::Done,
            in_corpus = true,
            citation_count = citations.len(),
            answer_len = answer.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "answered"
        );
        Ok(AnswerResult::answered(received, answer, citations))
    }

    async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedMatch>> {
        let top_k = self.config.top_k;
        with_deadline(Stage::Retrieval, self.config.retrieval_timeout, async {
            self.retriever.ensure_populated().await?;
            let embedding = self.retriever.embed_question(question).await?;
            debug!(state = %PipelineState::Embedded, dimensions = embedding.len(), "embedded");
            self.retriever.search(&embedding, top_k).await
        })
        .await
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let params = &self.config.generation;
        let text = with_deadline(
            Stage::Generation,
            self.config.generation_timeout,
            self.generator.generate(prompt, params),
        )
        .await?;

        let text = text.trim();
        if text.is_empty() {
            return Err(RagError::GenerationServiceError {
                provider: self.generator.name().to_string(),
                kind: FailureKind::Retryable,
                message: "generator returned an empty completion".to_string(),
            });
        }
        Ok(text.to_string())
    }

    fn decline(&self, question: &str, started: Instant) -> AnswerResult {
        info!(
            state = %PipelineState::Declined,
            in_corpus = false,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "declined"
        );
        AnswerResult::declined(question, self.config.decline_message.clone())
    }
}

/// Trim the question and reject blank or oversized input.
fn validate_question(question: &str) -> Result<&str> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(RagError::InvalidInput("question must not be empty".to_string()));
    }
    let chars = trimmed.chars().count();
    if chars > MAX_QUESTION_CHARS {
        return Err(RagError::InvalidInput(format!(
            "question is {chars} characters, the limit is {MAX_QUESTION_CHARS}"
        )));
    }
    Ok(trimmed)
}

async fn with_deadline<T>(
    stage: Stage,
    after: Duration,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(after, future).await {
        Ok(result) => result,
        Err(_) => Err(RagError::Timeout { stage, after }),
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `embedding_provider`, `vector_index` and `generator` are required; `config`
/// defaults to [`RagConfig::default()`]. Call
/// [`build()`](RagPipelineBuilder::build) to validate and produce the pipeline.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_index: Option<Arc<dyn VectorIndex>>,
    generator: Option<Arc<dyn Generator>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider. Must be the embedder the index was built with.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector index.
    pub fn vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vector_index = Some(index);
        self
    }

    /// Set the generation service.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the [`RagPipeline`], validating configuration and collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required collaborator is
    /// missing or the configuration is invalid, and
    /// [`RagError::EmbedderMismatch`] / [`RagError::DimensionMismatch`] if
    /// the embedder does not match the index.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_index = self
            .vector_index
            .ok_or_else(|| RagError::ConfigError("vector_index is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;

        let retriever = Retriever::new(embedding_provider, vector_index)?;
        let gate = RelevanceGate::from_config(&config);
        let composer = PromptComposer::new(config.max_context_chars, config.generation.max_tokens);

        Ok(RagPipeline { config, retriever, gate, composer, generator })
    }
}
