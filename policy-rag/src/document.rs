//! Data types for documents, chunks, retrieval matches and answers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A source document as read from the corpus, before chunking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// The identifier cited back to users, e.g. `remote_work_policy.md`.
    pub source_id: String,
}

impl Document {
    /// Create a document whose id doubles as its source identifier.
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        let source_id = source_id.into();
        Self { id: source_id.clone(), text: text.into(), source_id }
    }
}

/// An immutable unit of indexed text with its vector embedding.
///
/// Chunks are created once during ingestion and owned by the vector index.
/// Everything downstream of the index holds them through an [`Arc`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier, stable across runs (`{document_id}#{index}`).
    pub id: String,
    /// The text content of the chunk. Never empty.
    pub text: String,
    /// The identifier of the originating document.
    pub source_id: String,
    /// The vector embedding for this chunk's text.
    pub embedding: Vec<f32>,
}

/// A raw nearest-neighbour hit as returned by a [`VectorIndex`](crate::VectorIndex).
#[derive(Debug, Clone)]
pub struct IndexHit {
    /// The matched chunk, shared with the index.
    pub chunk: Arc<Chunk>,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// A chunk retrieved for one question, with its similarity and 1-based rank.
///
/// Ephemeral: created per query and discarded once the answer is built.
#[derive(Debug, Clone)]
pub struct RetrievedMatch {
    /// The retrieved chunk. The index owns its lifetime.
    pub chunk: Arc<Chunk>,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
    /// Position in the result list, starting at 1.
    pub rank: usize,
}

impl RetrievedMatch {
    /// The source identifier of the matched chunk.
    pub fn source_id(&self) -> &str {
        &self.chunk.source_id
    }
}

/// One entry of the prompt context: a whole chunk, never a fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextEntry {
    /// Source identifier shown to the generator and cited back.
    pub source_id: String,
    /// Full chunk text.
    pub text: String,
    /// Retrieval rank of the chunk.
    pub rank: usize,
}

/// The ordered context handed to the generator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptContext {
    /// Entries in rank order.
    pub entries: Vec<ContextEntry>,
    /// Sum of the character counts of all entry texts.
    pub total_chars: usize,
    /// Number of lower-ranked matches left out to respect the budget.
    pub dropped: usize,
}

impl PromptContext {
    /// Whether no chunk made it into the context.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The outcome of answering one question.
///
/// If `in_corpus` is false, `citations` is empty and `answer` is the
/// configured decline message. If it is true, `citations` is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerResult {
    /// The question as received.
    pub question: String,
    /// Generated text, or the decline message.
    pub answer: String,
    /// Distinct source identifiers, most relevant first.
    pub citations: Vec<String>,
    /// The relevance gate's decision.
    pub in_corpus: bool,
}

impl AnswerResult {
    /// A decline: no generation happened and nothing is cited.
    pub fn declined(question: impl Into<String>, decline_message: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: decline_message.into(),
            citations: Vec::new(),
            in_corpus: false,
        }
    }

    /// A generated answer backed by at least one citation.
    pub fn answered(
        question: impl Into<String>,
        answer: impl Into<String>,
        citations: Vec<String>,
    ) -> Self {
        debug_assert!(!citations.is_empty(), "an in-corpus answer must cite a source");
        Self { question: question.into(), answer: answer.into(), citations, in_corpus: true }
    }
}
