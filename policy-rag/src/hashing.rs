//! Offline bag-of-words embedder based on feature hashing.
//!
//! [`HashingEmbeddingProvider`] needs no network access and is fully
//! deterministic, which makes it the embedder of choice for tests, demos and
//! deployments without an embedding API key. Similarity reduces to weighted
//! content-word overlap, so it is far weaker than a neural embedder on
//! paraphrases, but it keeps unrelated questions cleanly at zero.

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Function words that carry no topical signal.
const STOP_WORDS: &[&str] = &[
    "a", "about", "all", "am", "an", "and", "any", "are", "as", "at", "be", "been", "but", "by",
    "can", "could", "did", "do", "does", "for", "from", "had", "has", "have", "how", "i", "if",
    "in", "into", "is", "it", "its", "may", "me", "must", "my", "no", "not", "of", "on", "or",
    "our", "should", "so", "than", "that", "the", "their", "them", "then", "there", "these",
    "they", "this", "those", "to", "us", "was", "we", "were", "what", "when", "where", "which",
    "who", "why", "will", "with", "would", "you", "your",
];

/// Split text into lower-cased, lightly stemmed content terms.
///
/// Tokens are maximal alphanumeric runs. Stop words and single characters
/// are dropped.
pub fn content_terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() > 1)
        .map(str::to_lowercase)
        .filter(|token| !STOP_WORDS.contains(&token.as_str()))
        .map(|token| stem(&token))
        .collect()
}

/// Strip the most common English inflections so "working" meets "work".
fn stem(token: &str) -> String {
    let len = token.len();
    if len > 5 && token.ends_with("ing") {
        return token[..len - 3].to_string();
    }
    if len > 4 && token.ends_with("ed") {
        return token[..len - 2].to_string();
    }
    if len > 3 && token.ends_with('s') && !token.ends_with("ss") {
        return token[..len - 1].to_string();
    }
    token.to_string()
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME))
}

/// A deterministic [`EmbeddingProvider`] that hashes content terms into a
/// fixed number of buckets and L2-normalises the counts.
///
/// # Example
///
/// ```rust,ignore
/// use policy_rag::HashingEmbeddingProvider;
///
/// let provider = HashingEmbeddingProvider::new(512);
/// let a = provider.embed("core working hours").await?;
/// ```
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
    model_id: String,
}

impl HashingEmbeddingProvider {
    /// Default bucket count.
    pub const DEFAULT_DIMENSIONS: usize = 512;

    /// Create a provider with the given number of buckets (at least 1).
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self { dimensions, model_id: format!("hashing-bow-v1/{dimensions}") }
    }

    /// Embed synchronously; the async trait methods delegate here.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for term in content_terms(text) {
            let bucket = (fnv1a(term.as_bytes()) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
