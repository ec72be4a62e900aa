//! Startup wiring: corpus → index → pipeline.

use std::sync::Arc;

use anyhow::Context;
use policy_rag::openai::{OpenAIEmbeddingProvider, OpenAIGenerator};
use policy_rag::{
    EmbeddingProvider, ExtractiveGenerator, Generator, HashingEmbeddingProvider,
    InMemoryVectorStore, Ingestor, RagConfig, RagPipeline, load_corpus_dir,
};
use tracing::{info, warn};

use crate::settings::Settings;

/// A pipeline ready to serve, and what went into its index.
pub struct Bootstrapped {
    pub pipeline: RagPipeline,
    pub documents: usize,
    pub chunks: usize,
}

/// An indexed corpus and the collaborators it was indexed with.
///
/// Several pipelines with different answering configurations can share one
/// index, which is how the evaluator compares `top_k` profiles.
pub struct IndexedCorpus {
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn Generator>,
    store: Arc<InMemoryVectorStore>,
    pub documents: usize,
    pub chunks: usize,
}

impl IndexedCorpus {
    /// A pipeline over this index with the given configuration.
    pub fn pipeline(&self, config: RagConfig) -> anyhow::Result<RagPipeline> {
        let pipeline = RagPipeline::builder()
            .config(config)
            .embedding_provider(self.embedder.clone())
            .vector_index(self.store.clone())
            .generator(self.generator.clone())
            .build()?;
        Ok(pipeline)
    }
}

/// Load the corpus and index it.
///
/// With an OpenAI key both embedding and generation go through the API;
/// without one they use [`HashingEmbeddingProvider`] and
/// [`ExtractiveGenerator`] and need no network.
pub async fn index_corpus(settings: &Settings) -> anyhow::Result<IndexedCorpus> {
    let chunking = settings.chunking().context("invalid chunking settings")?;

    let (embedder, generator) = collaborators(settings)?;
    let documents = load_corpus_dir(&settings.corpus_dir)
        .await
        .with_context(|| format!("failed to load corpus from {}", settings.corpus_dir.display()))?;
    if documents.is_empty() {
        warn!(dir = %settings.corpus_dir.display(), "corpus is empty, every question will be declined");
    }

    let store = Arc::new(InMemoryVectorStore::new(embedder.dimensions(), embedder.model_id()));
    let ingestor = Ingestor::new(chunking, embedder.clone(), store.clone())?;
    let chunks = ingestor.ingest(&documents).await.context("failed to index corpus")?;
    info!(
        documents = documents.len(),
        chunks,
        embedder = embedder.model_id(),
        generator = generator.name(),
        "corpus indexed"
    );

    Ok(IndexedCorpus { embedder, generator, store, documents: documents.len(), chunks })
}

/// Index the corpus and assemble the pipeline configured by `settings`.
pub async fn build_pipeline(settings: &Settings) -> anyhow::Result<Bootstrapped> {
    let config = settings.rag_config().context("invalid answering settings")?;
    let corpus = index_corpus(settings).await?;
    let pipeline = corpus.pipeline(config)?;
    Ok(Bootstrapped { pipeline, documents: corpus.documents, chunks: corpus.chunks })
}

fn collaborators(
    settings: &Settings,
) -> anyhow::Result<(Arc<dyn EmbeddingProvider>, Arc<dyn Generator>)> {
    let Some(key) = settings.openai_key() else {
        info!("no OpenAI key configured, running offline");
        return Ok((
            Arc::new(HashingEmbeddingProvider::new(settings.hashing_dimensions)),
            Arc::new(ExtractiveGenerator::default()),
        ));
    };

    let mut embedder = OpenAIEmbeddingProvider::new(key)?
        .with_model(settings.embedding_model.clone())
        .with_dimensions(settings.embedding_dimensions);
    let mut generator = OpenAIGenerator::new(key)?.with_model(settings.chat_model.clone());
    if let Some(base_url) = &settings.openai_base_url {
        embedder = embedder.with_base_url(base_url.clone());
        generator = generator.with_base_url(base_url.clone());
    }
    Ok((Arc::new(embedder), Arc::new(generator)))
}
