//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// The same provider (same [`model_id`](EmbeddingProvider::model_id)) must be
/// used at ingestion and at query time. Vectors from different models live in
/// different spaces and produce meaningless similarities without any error,
/// so the pipeline compares this identity against the one the index records.
///
/// # Example
///
/// ```rust,ignore
/// use policy_rag::EmbeddingProvider;
///
/// let provider = HashingEmbeddingProvider::new(512);
/// let embedding = provider.embed("remote work hours").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input. Override this method if the backend
    /// supports native batch embedding for better throughput.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Identity of the embedding model, including anything that changes the
    /// vector space (model name, version, output dimensions).
    fn model_id(&self) -> &str;
}
