//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and the [`RecursiveChunker`],
//! which splits text hierarchically (paragraphs → lines → sentences → words
//! → characters) and merges the pieces back into chunks of at most
//! `chunk_size` characters, carrying up to `chunk_overlap` characters of
//! trailing context into the next chunk.
//!
//! All sizes are counted in `char`s, so multi-byte text is never split
//! inside a code point.

use std::collections::VecDeque;

use crate::config::ChunkingConfig;
use crate::document::{Chunk, Document};

/// Separators tried in order, coarsest first.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and a source identifier but
/// no embeddings. Embeddings are attached later by the ingestor.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has no non-whitespace text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text hierarchically by separator, then merges with overlap.
///
/// Chunk IDs are generated as `{document_id}#{chunk_index}` and every chunk
/// inherits the document's `source_id`.
///
/// # Example
///
/// ```rust,ignore
/// use policy_rag::{ChunkingConfig, RecursiveChunker};
///
/// let chunker = RecursiveChunker::new(ChunkingConfig::default());
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecursiveChunker {
    config: ChunkingConfig,
}

impl RecursiveChunker {
    /// Create a chunker from a validated [`ChunkingConfig`].
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// The chunk size and overlap in use.
    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Split raw text into chunk strings, trimmed and non-empty.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        split_recursive(text, self.config.chunk_size, self.config.chunk_overlap, &SEPARATORS)
            .into_iter()
            .map(|chunk| chunk.trim().to_string())
            .filter(|chunk| !chunk.is_empty())
            .collect()
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.trim().is_empty() {
            return Vec::new();
        }

        self.split_text(&document.text)
            .into_iter()
            .enumerate()
            .map(|(i, text)| Chunk {
                id: format!("{}#{i}", document.id),
                text,
                source_id: document.source_id.clone(),
                embedding: Vec::new(),
            })
            .collect()
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split `text` at the first separator it contains, recursing into pieces
/// that are still too large, and merge neighbouring small pieces.
fn split_recursive(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    if char_len(text) <= chunk_size {
        return vec![text.to_string()];
    }

    let Some(position) = separators.iter().position(|sep| text.contains(sep)) else {
        return split_by_chars(text, chunk_size, chunk_overlap);
    };
    let separator = separators[position];
    let finer = &separators[position + 1..];

    let mut chunks = Vec::new();
    let mut pending: Vec<&str> = Vec::new();
    for piece in split_keeping_separator(text, separator) {
        if char_len(piece) <= chunk_size {
            pending.push(piece);
            continue;
        }
        chunks.extend(merge_pieces(&pending, chunk_size, chunk_overlap));
        pending.clear();
        chunks.extend(split_recursive(piece, chunk_size, chunk_overlap, finer));
    }
    chunks.extend(merge_pieces(&pending, chunk_size, chunk_overlap));
    chunks
}

/// Greedily pack pieces into chunks of at most `chunk_size` characters.
///
/// When a chunk is emitted, pieces are dropped from the front of the window
/// until at most `chunk_overlap` characters remain to seed the next chunk.
fn merge_pieces(pieces: &[&str], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<(&str, usize)> = VecDeque::new();
    let mut window_len = 0;

    for &piece in pieces {
        let len = char_len(piece);
        if window_len + len > chunk_size && !window.is_empty() {
            chunks.push(window.iter().map(|(p, _)| *p).collect::<String>());
            while window_len > chunk_overlap || (window_len > 0 && window_len + len > chunk_size) {
                match window.pop_front() {
                    Some((_, dropped)) => window_len -= dropped,
                    None => break,
                }
            }
        }
        window.push_back((piece, len));
        window_len += len;
    }

    if !window.is_empty() {
        chunks.push(window.iter().map(|(p, _)| *p).collect::<String>());
    }
    chunks
}

/// Split `text` at `separator`, keeping the separator on the preceding piece.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        pieces.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

/// Last resort for text without separators: fixed character windows.
fn split_by_chars(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(size: usize, overlap: usize) -> RecursiveChunker {
        RecursiveChunker::new(ChunkingConfig::new(size, overlap).unwrap())
    }

    #[test]
    fn short_document_is_one_chunk() {
        let doc = Document::new("remote_work_policy.md", "Core hours are 10:00 AM to 3:00 PM.");
        let chunks = RecursiveChunker::default().chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "remote_work_policy.md#0");
        assert_eq!(chunks[0].source_id, "remote_work_policy.md");
        assert!(chunks[0].embedding.is_empty());
    }

    #[test]
    fn blank_document_has_no_chunks() {
        let doc = Document::new("empty.md", "  \n\n  ");
        assert!(RecursiveChunker::default().chunk(&doc).is_empty());
    }

    #[test]
    fn paragraphs_split_before_sentences() {
        let text = "First paragraph about leave.\n\nSecond paragraph about costs.";
        let pieces = chunker(40, 0).split_text(text);
        assert_eq!(pieces, vec!["First paragraph about leave.", "Second paragraph about costs."]);
    }

    #[test]
    fn chunks_respect_size_and_ids_are_sequential() {
        let text = "Employees may work remotely up to three days per week. ".repeat(20);
        let doc = Document::new("remote.md", text);
        let chunks = chunker(100, 10).chunk(&doc);
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert!(chunk.text.chars().count() <= 100);
            assert_eq!(chunk.id, format!("remote.md#{i}"));
        }
    }

    #[test]
    fn character_windows_overlap() {
        let pieces = split_by_chars("abcdefghij", 4, 1);
        assert_eq!(pieces, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn word_windows_carry_overlap() {
        let pieces = chunker(11, 6).split_text("one two three four");
        assert_eq!(pieces, vec!["one two", "two three", "three four"]);
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let text = "é".repeat(25);
        let pieces = chunker(10, 2).split_text(&text);
        assert!(pieces.iter().all(|p| p.chars().count() <= 10));
        assert_eq!(pieces[0], "é".repeat(10));
    }
}
