//! Corpus-bounded question answering over a fixed document collection.
//!
//! `policy-rag` answers natural-language questions strictly from a pre-indexed
//! set of policy documents. It refuses to answer when the corpus does not
//! support an answer, and cites the documents every answer was drawn from.
//!
//! A question flows through:
//!
//! 1. [`Retriever`]: embed the question, fetch the top-k chunks
//! 2. [`RelevanceGate`]: decide in-corpus vs. out-of-corpus
//! 3. [`PromptComposer`]: build a bounded, whole-chunk grounding prompt
//! 4. [`Generator`]: one completion call, failures classified
//! 5. [`extract_citations`]: distinct sources of the context actually used
//!
//! [`RagPipeline`] wires these together. [`Ingestor`] and
//! [`load_corpus_dir`] build the index offline, and [`run_evaluation`]
//! measures a pipeline against labelled questions.
//!
//! # Features
//!
//! | Feature  | Enables |
//! |----------|---------|
//! | `openai` | [`openai::OpenAIEmbeddingProvider`] and [`openai::OpenAIGenerator`] |
//! | `full`   | everything |
//!
//! Without any feature the crate is fully offline: the
//! [`HashingEmbeddingProvider`], [`InMemoryVectorStore`] and
//! [`ExtractiveGenerator`] need no network.

pub mod chunking;
pub mod citation;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod evaluation;
pub mod extractive;
pub mod gate;
pub mod generation;
pub mod hashing;
pub mod inmemory;
pub mod ingest;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod vectorstore;

#[cfg(feature = "openai")]
pub mod openai;

pub use chunking::{Chunker, RecursiveChunker};
pub use citation::extract_citations;
pub use config::{ChunkingConfig, GenerationParams, RagConfig, RagConfigBuilder};
pub use document::{
    AnswerResult, Chunk, ContextEntry, Document, IndexHit, PromptContext, RetrievedMatch,
};
pub use embedding::EmbeddingProvider;
pub use error::{FailureKind, IndexUnavailableReason, RagError, Result, Stage};
pub use evaluation::{EvalCase, EvalCaseResult, EvalReport, parse_eval_cases, run_evaluation};
pub use extractive::ExtractiveGenerator;
pub use gate::{GateDecision, RelevanceGate};
pub use generation::Generator;
pub use hashing::HashingEmbeddingProvider;
pub use inmemory::InMemoryVectorStore;
pub use ingest::{Ingestor, load_corpus_dir};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use prompt::{ComposedPrompt, PromptComposer};
pub use retriever::Retriever;
pub use vectorstore::VectorIndex;
