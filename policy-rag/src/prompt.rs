//! Prompt composition with a bounded, whole-chunk context.

use tracing::debug;

use crate::document::{ContextEntry, PromptContext, RetrievedMatch};

/// What the composer hands to the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedPrompt {
    /// The chunks that were actually placed in the prompt.
    pub context: PromptContext,
    /// The full prompt text.
    pub prompt: String,
}

/// Builds the grounded-answer prompt from gated matches.
///
/// Chunks are added in rank order while they fit in `max_context_chars`;
/// the first chunk that does not fit ends the context, so truncation always
/// drops the lowest-ranked chunks and never cuts a chunk in half. The top
/// match is always included even if it alone exceeds the budget, because an
/// in-corpus answer without any context would have nothing to cite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptComposer {
    max_context_chars: usize,
    max_output_tokens: u32,
}

impl PromptComposer {
    /// Create a composer with a context budget (in characters) and the
    /// output length the generator is asked to respect.
    pub fn new(max_context_chars: usize, max_output_tokens: u32) -> Self {
        Self { max_context_chars, max_output_tokens }
    }

    /// Select context from `matches` and render the prompt for `question`.
    pub fn compose(&self, question: &str, matches: &[RetrievedMatch]) -> ComposedPrompt {
        let context = self.select_context(matches);
        let prompt = render_prompt(question, &context, self.max_output_tokens);
        debug!(
            entries = context.entries.len(),
            dropped = context.dropped,
            context_chars = context.total_chars,
            prompt_len = prompt.len(),
            "composed prompt"
        );
        ComposedPrompt { context, prompt }
    }

    fn select_context(&self, matches: &[RetrievedMatch]) -> PromptContext {
        let mut context = PromptContext::default();
        for (i, m) in matches.iter().enumerate() {
            let chars = m.chunk.text.chars().count();
            let fits = context.total_chars + chars <= self.max_context_chars;
            if !fits && !context.entries.is_empty() {
                context.dropped = matches.len() - i;
                break;
            }
            context.total_chars += chars;
            context.entries.push(ContextEntry {
                source_id: m.chunk.source_id.clone(),
                text: m.chunk.text.clone(),
                rank: m.rank,
            });
        }
        context
    }
}

pub(crate) const CONTEXT_MARKER: &str = "--- CONTEXT ---";
pub(crate) const QUESTION_MARKER: &str = "--- QUESTION ---";
pub(crate) const SOURCE_LABEL: &str = "Source: ";

fn render_prompt(question: &str, context: &PromptContext, max_output_tokens: u32) -> String {
    let mut blocks = String::new();
    for (i, entry) in context.entries.iter().enumerate() {
        if i > 0 {
            blocks.push_str("\n\n");
        }
        blocks.push_str(&format!(
            "[{}] {SOURCE_LABEL}{}\n{}",
            i + 1,
            entry.source_id,
            entry.text.trim()
        ));
    }

    format!(
        r#"You are a question-answering assistant for company policies. Answer the question using ONLY the information in the CONTEXT below.

RULES:
1. Use only facts stated explicitly in the context. Do not use outside knowledge.
2. If the context does not contain the information needed, say that you cannot answer from the provided documents.
3. After each claim, cite the document it came from by its source name in square brackets, e.g. [remote_work_policy.md].
4. Keep the answer under {max_output_tokens} tokens.

{CONTEXT_MARKER}
{blocks}
---

{QUESTION_MARKER}
{question}
"#
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::document::Chunk;

    fn matched(rank: usize, source: &str, text: &str) -> RetrievedMatch {
        RetrievedMatch {
            chunk: Arc::new(Chunk {
                id: format!("{source}#{rank}"),
                text: text.to_string(),
                source_id: source.to_string(),
                embedding: Vec::new(),
            }),
            score: 1.0 - rank as f32 * 0.1,
            rank,
        }
    }

    #[test]
    fn prompt_carries_instructions_context_and_question() {
        let composer = PromptComposer::new(1000, 500);
        let composed = composer.compose(
            "What are core hours?",
            &[matched(1, "remote_work_policy.md", "Core working hours are 10:00 AM to 3:00 PM.")],
        );
        let prompt = &composed.prompt;
        assert!(prompt.contains("ONLY the information in the CONTEXT"));
        assert!(prompt.contains("cannot answer"));
        assert!(prompt.contains("cite the document"));
        assert!(prompt.contains("[1] Source: remote_work_policy.md"));
        assert!(prompt.contains("10:00 AM to 3:00 PM"));
        assert!(prompt.contains("What are core hours?"));
        assert!(prompt.contains("under 500 tokens"));
    }

    #[test]
    fn drops_lowest_ranked_chunks_whole() {
        let composer = PromptComposer::new(25, 100);
        let composed = composer.compose(
            "q",
            &[
                matched(1, "a.md", "0123456789"),
                matched(2, "b.md", "0123456789"),
                matched(3, "c.md", "0123456789"),
            ],
        );
        let sources: Vec<&str> =
            composed.context.entries.iter().map(|e| e.source_id.as_str()).collect();
        assert_eq!(sources, vec!["a.md", "b.md"]);
        assert_eq!(composed.context.total_chars, 20);
        assert_eq!(composed.context.dropped, 1);
        assert!(!composed.prompt.contains("c.md"));
    }

    #[test]
    fn stops_at_first_chunk_that_does_not_fit() {
        let composer = PromptComposer::new(15, 100);
        let composed = composer.compose(
            "q",
            &[
                matched(1, "a.md", "0123456789"),
                matched(2, "b.md", "0123456789"),
                matched(3, "c.md", "x"),
            ],
        );
        assert_eq!(composed.context.entries.len(), 1);
        assert_eq!(composed.context.dropped, 2);
    }

    #[test]
    fn oversized_top_chunk_is_kept_intact() {
        let composer = PromptComposer::new(5, 100);
        let text = "a chunk much longer than the budget";
        let composed = composer.compose("q", &[matched(1, "a.md", text)]);
        assert_eq!(composed.context.entries.len(), 1);
        assert_eq!(composed.context.entries[0].text, text);
    }

    #[test]
    fn budget_counts_characters_not_bytes() {
        let composer = PromptComposer::new(4, 100);
        let composed =
            composer.compose("q", &[matched(1, "a.md", "ééé"), matched(2, "b.md", "é")]);
        assert_eq!(composed.context.entries.len(), 2);
        assert_eq!(composed.context.total_chars, 4);
    }
}
