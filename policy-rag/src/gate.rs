//! Relevance gate: decides whether a question is answerable from the corpus.
//!
//! The gate runs after retrieval and before any generation call. A question
//! is in-corpus iff its best match scores at least the configured similarity
//! threshold (and, when enabled, shares enough content terms with that
//! match). Zero matches always means out-of-corpus.

use std::collections::HashSet;

use tracing::debug;

use crate::config::RagConfig;
use crate::document::RetrievedMatch;
use crate::hashing::content_terms;

/// The gate's verdict for one question.
#[derive(Debug, Clone)]
pub enum GateDecision {
    /// Answer from these matches: every retrieved match scoring at or above
    /// the threshold, in rank order. Never empty.
    InCorpus(Vec<RetrievedMatch>),
    /// Decline without generating.
    OutOfCorpus {
        /// Score of the best match, if there was one.
        top_score: Option<f32>,
    },
}

impl GateDecision {
    /// Whether the question passed the gate.
    pub fn is_in_corpus(&self) -> bool {
        matches!(self, Self::InCorpus(_))
    }
}

/// Threshold-based relevance gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceGate {
    threshold: f32,
    min_term_overlap: Option<f32>,
}

impl RelevanceGate {
    /// A gate that admits questions whose top match scores `>= threshold`.
    pub fn new(threshold: f32) -> Self {
        Self { threshold, min_term_overlap: None }
    }

    /// Build the gate described by a pipeline configuration.
    pub fn from_config(config: &RagConfig) -> Self {
        Self { threshold: config.similarity_threshold, min_term_overlap: config.min_term_overlap }
    }

    /// Additionally require that at least `fraction` of the question's
    /// distinct content terms occur in the top match's text.
    pub fn with_min_term_overlap(mut self, fraction: f32) -> Self {
        self.min_term_overlap = Some(fraction);
        self
    }

    /// The similarity threshold.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Score-only policy: true iff the top match reaches the threshold.
    ///
    /// `matches` must be in rank order, as returned by the retriever.
    pub fn is_in_corpus(&self, matches: &[RetrievedMatch]) -> bool {
        matches.first().is_some_and(|top| top.score >= self.threshold)
    }

    /// Full decision for `question`, including the optional term-overlap
    /// check, and the set of matches to hand to the prompt composer.
    pub fn decide(&self, question: &str, matches: &[RetrievedMatch]) -> GateDecision {
        let top_score = matches.first().map(|m| m.score);
        if !self.is_in_corpus(matches) {
            debug!(?top_score, threshold = self.threshold, "gate: below threshold");
            return GateDecision::OutOfCorpus { top_score };
        }

        if let (Some(required), Some(top)) = (self.min_term_overlap, matches.first()) {
            let overlap = term_overlap(question, &top.chunk.text);
            if overlap < required {
                debug!(overlap, required, "gate: insufficient term overlap");
                return GateDecision::OutOfCorpus { top_score };
            }
        }

        let admitted: Vec<RetrievedMatch> =
            matches.iter().filter(|m| m.score >= self.threshold).cloned().collect();
        GateDecision::InCorpus(admitted)
    }
}

/// Fraction of the question's distinct content terms present in `text`.
fn term_overlap(question: &str, text: &str) -> f32 {
    let question_terms: HashSet<String> = content_terms(question).into_iter().collect();
    if question_terms.is_empty() {
        return 0.0;
    }
    let text_terms: HashSet<String> = content_terms(text).into_iter().collect();
    let shared = question_terms.intersection(&text_terms).count();
    shared as f32 / question_terms.len() as f32
}
