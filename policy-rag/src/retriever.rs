//! Question → ranked chunk matches.

use std::sync::Arc;

use tracing::debug;

use crate::document::RetrievedMatch;
use crate::embedding::EmbeddingProvider;
use crate::error::{IndexUnavailableReason, RagError, Result};
use crate::vectorstore::VectorIndex;

/// Embeds a question and looks up its nearest chunks.
///
/// Construction verifies that the embedder is the one the index was built
/// with (by [`model_id`](EmbeddingProvider::model_id) and dimensionality).
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    /// Pair an embedder with an index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbedderMismatch`] if the index recorded a
    /// different embedder identity, or [`RagError::DimensionMismatch`] if the
    /// vector sizes disagree.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Result<Self> {
        if let Some(index_model) = index.embedding_model() {
            if index_model != embedder.model_id() {
                return Err(RagError::EmbedderMismatch {
                    index_model: index_model.to_string(),
                    provider_model: embedder.model_id().to_string(),
                });
            }
        }
        if index.dimensions() != embedder.dimensions() {
            return Err(RagError::DimensionMismatch {
                expected: index.dimensions(),
                actual: embedder.dimensions(),
            });
        }
        Ok(Self { embedder, index })
    }

    /// The index this retriever reads from.
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Return at most `k` matches for `question`, best first, ranked from 1.
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if `k == 0`
    /// - [`RagError::IndexUnavailable`] with reason `Empty` if the index holds
    ///   no chunks (checked before embedding), or as reported by the index
    /// - embedding errors from the provider, unchanged
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<RetrievedMatch>> {
        if k == 0 {
            return Err(RagError::ConfigError("k must be greater than zero".to_string()));
        }
        self.ensure_populated().await?;
        let embedding = self.embed_question(question).await?;
        self.search(&embedding, k).await
    }

    /// Fail with reason `Empty` if the index holds no chunks.
    pub async fn ensure_populated(&self) -> Result<()> {
        if self.index.is_empty().await? {
            return Err(RagError::IndexUnavailable {
                backend: self.index.backend().to_string(),
                reason: IndexUnavailableReason::Empty,
                message: "index contains no chunks".to_string(),
            });
        }
        Ok(())
    }

    /// Embed `question` with the index's embedder.
    pub async fn embed_question(&self, question: &str) -> Result<Vec<f32>> {
        let embedding = self.embedder.embed(question).await?;
        if embedding.len() != self.index.dimensions() {
            return Err(RagError::DimensionMismatch {
                expected: self.index.dimensions(),
                actual: embedding.len(),
            });
        }
        Ok(embedding)
    }

    /// Nearest `k` chunks to an already-embedded question, ranked from 1.
    pub async fn search(&self, embedding: &[f32], k: usize) -> Result<Vec<RetrievedMatch>> {
        if k == 0 {
            return Err(RagError::ConfigError("k must be greater than zero".to_string()));
        }
        let hits = self.index.query(embedding, k).await?;
        let matches: Vec<RetrievedMatch> = hits
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(i, hit)| RetrievedMatch { chunk: hit.chunk, score: hit.score, rank: i + 1 })
            .collect();

        debug!(
            backend = self.index.backend(),
            match_count = matches.len(),
            top_score = matches.first().map(|m| m.score),
            "retrieved matches"
        );

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Chunk;
    use crate::hashing::HashingEmbeddingProvider;
    use crate::inmemory::InMemoryVectorStore;

    async fn store_with(
        texts: &[(&str, &str)],
        provider: &HashingEmbeddingProvider,
    ) -> InMemoryVectorStore {
        let store = InMemoryVectorStore::new(provider.dimensions(), provider.model_id());
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, (source, text))| Chunk {
                id: format!("{source}#{i}"),
                text: text.to_string(),
                source_id: source.to_string(),
                embedding: provider.embed_text(text),
            })
            .collect();
        store.upsert(&chunks).await.unwrap();
        store
    }

    #[tokio::test]
    async fn ranks_start_at_one_and_scores_descend() {
        let provider = HashingEmbeddingProvider::new(256);
        let store = store_with(
            &[
                ("pto.md", "Employees accrue paid time off monthly."),
                ("remote.md", "Remote employees keep core working hours."),
                ("expenses.md", "Expense reports require receipts."),
            ],
            &provider,
        )
        .await;
        let retriever = Retriever::new(Arc::new(provider), Arc::new(store)).unwrap();

        let matches = retriever.retrieve("remote working hours", 2).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].rank, 1);
        assert_eq!(matches[1].rank, 2);
        assert_eq!(matches[0].source_id(), "remote.md");
        assert!(matches[0].score >= matches[1].score);
    }

    #[tokio::test]
    async fn empty_index_is_unavailable() {
        let provider = HashingEmbeddingProvider::new(16);
        let store = InMemoryVectorStore::new(16, provider.model_id());
        let retriever = Retriever::new(Arc::new(provider), Arc::new(store)).unwrap();

        let err = retriever.retrieve("anything", 3).await.unwrap_err();
        assert!(matches!(
            err,
            RagError::IndexUnavailable { reason: IndexUnavailableReason::Empty, .. }
        ));
    }

    #[test]
    fn rejects_foreign_embedder() {
        let provider = HashingEmbeddingProvider::new(16);
        let store = InMemoryVectorStore::new(16, "text-embedding-3-small");
        let err = Retriever::new(Arc::new(provider), Arc::new(store)).err().unwrap();
        assert!(matches!(err, RagError::EmbedderMismatch { .. }));
    }

    #[test]
    fn rejects_dimension_disagreement() {
        let provider = HashingEmbeddingProvider::new(16);
        let store = InMemoryVectorStore::new(32, provider.model_id());
        let err = Retriever::new(Arc::new(provider), Arc::new(store)).err().unwrap();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 32, actual: 16 }));
    }

    #[tokio::test]
    async fn zero_k_is_rejected() {
        let provider = HashingEmbeddingProvider::new(16);
        let store = store_with(&[("a.md", "alpha policy")], &provider).await;
        let retriever = Retriever::new(Arc::new(provider), Arc::new(store)).unwrap();
        assert!(matches!(retriever.retrieve("alpha", 0).await, Err(RagError::ConfigError(_))));
    }
}
