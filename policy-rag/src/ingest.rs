//! Offline ingestion: load a corpus, chunk it, embed it, index it.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::ChunkingConfig;
use crate::document::{Chunk, Document};
use crate::embedding::EmbeddingProvider;
use crate::error::{FailureKind, RagError, Result};
use crate::inmemory::InMemoryVectorStore;
use crate::vectorstore::VectorIndex;

/// File extensions picked up by [`load_corpus_dir`].
pub const CORPUS_EXTENSIONS: [&str; 3] = ["md", "markdown", "txt"];

/// Chunks, embeds and stores documents into an [`InMemoryVectorStore`].
pub struct Ingestor {
    chunker: RecursiveChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<InMemoryVectorStore>,
}

impl Ingestor {
    /// Create an ingestor.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbedderMismatch`] or [`RagError::DimensionMismatch`]
    /// if `embedder` is not the embedder `store` was created for.
    pub fn new(
        chunking: ChunkingConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<InMemoryVectorStore>,
    ) -> Result<Self> {
        if let Some(model) = store.embedding_model() {
            if model != embedder.model_id() {
                return Err(RagError::EmbedderMismatch {
                    index_model: model.to_string(),
                    provider_model: embedder.model_id().to_string(),
                });
            }
        }
        if store.dimensions() != embedder.dimensions() {
            return Err(RagError::DimensionMismatch {
                expected: store.dimensions(),
                actual: embedder.dimensions(),
            });
        }
        Ok(Self { chunker: RecursiveChunker::new(chunking), embedder, store })
    }

    /// Chunk, embed and upsert `documents`. Returns the number of chunks stored.
    ///
    /// Re-ingesting a document replaces its chunks with the same ids and
    /// drops any of its chunks the new text no longer produces.
    pub async fn ingest(&self, documents: &[Document]) -> Result<usize> {
        let mut total = 0;
        for document in documents {
            let mut chunks: Vec<Chunk> = self.chunker.chunk(document);
            if chunks.is_empty() {
                warn!(document.id = %document.id, "document produced no chunks, skipping");
                self.store.prune_source(&document.source_id, &HashSet::new()).await;
                continue;
            }

            let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            if embeddings.len() != chunks.len() {
                return Err(RagError::EmbeddingError {
                    provider: self.embedder.model_id().to_string(),
                    kind: FailureKind::Fatal,
                    message: format!(
                        "expected {} embeddings, got {}",
                        chunks.len(),
                        embeddings.len()
                    ),
                });
            }
            for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
                chunk.embedding = embedding;
            }

            self.store.upsert(&chunks).await?;
            let keep: HashSet<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
            self.store.prune_source(&document.source_id, &keep).await;
            debug!(document.id = %document.id, chunk_count = chunks.len(), "ingested document");
            total += chunks.len();
        }

        info!(document_count = documents.len(), chunk_count = total, "ingestion complete");
        Ok(total)
    }

    /// The store this ingestor writes to.
    pub fn store(&self) -> &Arc<InMemoryVectorStore> {
        &self.store
    }
}

/// Read every `.md`, `.markdown` and `.txt` file under `dir`, recursively.
///
/// Documents are returned sorted by path, so ingestion order (and therefore
/// tie-breaking in retrieval) is reproducible. Each document's id and
/// `source_id` is its path relative to `dir`, using `/` separators. Files
/// that are empty after trimming are skipped.
///
/// # Errors
///
/// Returns [`RagError::ChunkingError`] if `dir` or a file in it cannot be read.
pub async fn load_corpus_dir(dir: impl AsRef<Path>) -> Result<Vec<Document>> {
    let root = dir.as_ref();
    let mut paths = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await.map_err(|e| {
            RagError::ChunkingError(format!("failed to read {}: {e}", current.display()))
        })?;
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            RagError::ChunkingError(format!("failed to read {}: {e}", current.display()))
        })? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|e| {
                RagError::ChunkingError(format!("failed to stat {}: {e}", path.display()))
            })?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() && has_corpus_extension(&path) {
                paths.push(path);
            }
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
            RagError::ChunkingError(format!("failed to read {}: {e}", path.display()))
        })?;
        if text.trim().is_empty() {
            debug!(path = %path.display(), "skipping empty file");
            continue;
        }
        documents.push(Document::new(source_id_for(root, &path), text));
    }

    info!(dir = %root.display(), document_count = documents.len(), "loaded corpus");
    Ok(documents)
}

fn has_corpus_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| CORPUS_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

fn source_id_for(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
