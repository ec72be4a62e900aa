//! The read-only vector index contract consumed at question time.

use async_trait::async_trait;

use crate::document::IndexHit;
use crate::error::Result;

/// A nearest-neighbour index over ingested chunks.
///
/// The answering pipeline only ever reads through this trait. Populating
/// the index is the ingestion phase's job (see [`Ingestor`](crate::Ingestor)),
/// which talks to the concrete store directly.
///
/// Implementations must be safe for concurrent queries.
///
/// # Example
///
/// ```rust,ignore
/// use policy_rag::{InMemoryVectorStore, VectorIndex};
///
/// let store = InMemoryVectorStore::new(512, "hashing-bow-v1/512");
/// let hits = store.query(&query_embedding, 4).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Return at most `k` chunks most similar to `embedding`.
    ///
    /// Results are ordered by descending similarity score. Equal scores keep
    /// the order in which chunks were inserted, so identical queries against
    /// an unchanged index always return identical lists.
    ///
    /// An empty index returns an empty list. Failure to reach the backing
    /// store is reported as [`RagError::IndexUnavailable`](crate::RagError::IndexUnavailable)
    /// with reason `Unreachable`.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<IndexHit>>;

    /// Number of chunks currently stored.
    async fn len(&self) -> Result<usize>;

    /// Whether the index holds no chunks.
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Dimensionality of stored embeddings.
    fn dimensions(&self) -> usize;

    /// Identity of the embedder the index was built with, if recorded.
    fn embedding_model(&self) -> Option<&str>;

    /// Short backend name for logs and errors.
    fn backend(&self) -> &str;
}
