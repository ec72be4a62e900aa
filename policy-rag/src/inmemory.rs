//! In-memory vector store using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a zero-dependency vector store
//! backed by an insertion-ordered `Vec` protected by a `tokio::sync::RwLock`.
//! It is suitable for corpora of a few thousand chunks, tests and demos.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{Chunk, IndexHit};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorIndex;

const BACKEND: &str = "InMemory";

#[derive(Debug, Default)]
struct Entries {
    /// Chunks in first-insertion order.
    chunks: Vec<Arc<Chunk>>,
    /// Chunk id → position in `chunks`.
    positions: HashMap<String, usize>,
}

/// An in-memory vector index using cosine similarity for search.
///
/// Upserting an existing chunk id replaces the chunk in place, so it keeps
/// its original insertion position for tie-breaking.
///
/// # Example
///
/// ```rust,ignore
/// use policy_rag::InMemoryVectorStore;
///
/// let store = InMemoryVectorStore::new(512, "hashing-bow-v1/512");
/// store.upsert(&chunks).await?;
/// ```
#[derive(Debug)]
pub struct InMemoryVectorStore {
    dimensions: usize,
    embedding_model: String,
    entries: RwLock<Entries>,
}

impl InMemoryVectorStore {
    /// Create an empty store for embeddings of the given dimensionality,
    /// produced by the embedder identified by `embedding_model`.
    pub fn new(dimensions: usize, embedding_model: impl Into<String>) -> Self {
        Self { dimensions, embedding_model: embedding_model.into(), entries: RwLock::default() }
    }

    /// Insert or replace chunks. Every chunk must carry an embedding of the
    /// store's dimensionality and non-empty text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] or
    /// [`RagError::VectorStoreError`] without storing anything from the batch.
    pub async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        for chunk in chunks {
            if chunk.embedding.len() != self.dimensions {
                return Err(RagError::DimensionMismatch {
                    expected: self.dimensions,
                    actual: chunk.embedding.len(),
                });
            }
            if chunk.text.trim().is_empty() {
                return Err(RagError::VectorStoreError {
                    backend: BACKEND.to_string(),
                    message: format!("chunk '{}' has empty text", chunk.id),
                });
            }
        }

        let mut entries = self.entries.write().await;
        for chunk in chunks {
            let chunk = Arc::new(chunk.clone());
            let existing = entries.positions.get(&chunk.id).copied();
            match existing {
                Some(position) => entries.chunks[position] = chunk,
                None => {
                    let position = entries.chunks.len();
                    entries.positions.insert(chunk.id.clone(), position);
                    entries.chunks.push(chunk);
                }
            }
        }
        debug!(backend = BACKEND, upserted = chunks.len(), total = entries.chunks.len(), "upsert");
        Ok(())
    }

    /// Drop chunks of `source_id` whose id is not in `keep`. Returns how
    /// many were removed. Surviving chunks keep their relative order.
    pub async fn prune_source(&self, source_id: &str, keep: &HashSet<&str>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.chunks.len();
        entries
            .chunks
            .retain(|chunk| chunk.source_id != source_id || keep.contains(chunk.id.as_str()));
        let removed = before - entries.chunks.len();
        if removed > 0 {
            let positions =
                entries.chunks.iter().enumerate().map(|(i, c)| (c.id.clone(), i)).collect();
            entries.positions = positions;
            debug!(backend = BACKEND, source_id, removed, "pruned stale chunks");
        }
        removed
    }

    /// Remove every chunk, e.g. before a full re-ingestion.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.chunks.clear();
        entries.positions.clear();
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryVectorStore {
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        if embedding.len() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.len(),
            });
        }

        let entries = self.entries.read().await;
        let mut scored: Vec<IndexHit> = entries
            .chunks
            .iter()
            .map(|chunk| IndexHit {
                chunk: Arc::clone(chunk),
                score: cosine_similarity(&chunk.embedding, embedding),
            })
            .collect();

        // `sort_by` is stable: equal scores keep insertion order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Ok(scored)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.read().await.chunks.len())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embedding_model(&self) -> Option<&str> {
        Some(&self.embedding_model)
    }

    fn backend(&self) -> &str {
        BACKEND
    }
}
