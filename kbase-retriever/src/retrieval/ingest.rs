//! Offline ingestion pipeline that builds the knowledge base artifacts.
//!
//! This module coordinates the one-shot build: loading documents, chunking,
//! embedding and persisting. It always rebuilds from scratch; there is no
//! incremental update.
//!
//! ## Pipeline Flow
//!
//! ```text
//! docs dir → load_corpus → ChunkingStrategy → EmbeddingProvider (batched)
//!                                                   ↓
//!              ArtifactStore ← MetadataStore + FlatL2Index (fingerprinted)
//! ```
//!
//! Any error aborts the run before anything is written, and the final write is
//! atomic, so a failed run leaves previously saved artifacts untouched.

use super::chunking_strategy::{ChunkingConfig, ChunkingStrategy};
use super::corpus::load_corpus;
use crate::error::{Result, RetrieverError};
use crate::storage::{
    ArtifactStore, EmbeddingModelMetadata, FlatL2Index, Manifest, MetadataStore,
    corpus_fingerprint,
};
use kbase_embed::EmbeddingProvider;
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default number of chunks sent to the embedder at once
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Configuration for an ingestion run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Directory containing the source documents
    pub docs_dir: PathBuf,
    /// Directory the artifacts are written to
    pub output_dir: PathBuf,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Chunks per embedding call
    pub batch_size: usize,
}

impl IngestConfig {
    /// Create a new ingestion configuration with default chunking and batching.
    pub fn new(docs_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            docs_dir: docs_dir.into(),
            output_dir: output_dir.into(),
            chunking: ChunkingConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// Summary of a completed ingestion run
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub files_processed: usize,
    pub chunk_count: usize,
    pub dimension: usize,
    /// Chunks per source file
    pub source_counts: Vec<(String, usize)>,
    pub chunking: String,
    pub model_id: String,
    pub fingerprint: String,
    pub elapsed: Duration,
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// Builds the knowledge base from a directory of documents
#[derive(Debug, Clone)]
pub struct IngestionPipeline {
    config: IngestConfig,
    chunking_strategy: ChunkingStrategy,
    store: ArtifactStore,
}

impl IngestionPipeline {
    /// Validates the configuration; no files are touched yet.
    pub fn new(config: IngestConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(RetrieverError::config("batch size must be greater than zero"));
        }
        let chunking_strategy = ChunkingStrategy::new(config.chunking.clone())?;
        let store = ArtifactStore::new(config.output_dir.clone());
        Ok(Self {
            config,
            chunking_strategy,
            store,
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Runs the full pipeline with `embedder` and persists the result.
    pub async fn run(&self, embedder: &dyn EmbeddingProvider) -> Result<IngestReport> {
        let start_time = Instant::now();
        info!(
            "Starting ingestion of {} with {} and {}",
            self.config.docs_dir.display(),
            self.chunking_strategy.descriptor(),
            embedder.model_id()
        );

        let corpus = load_corpus(&self.config.docs_dir, &self.chunking_strategy).await?;
        if corpus.is_empty() {
            return Err(RetrieverError::config(format!(
                "no .{} documents with text found in {}; nothing to index",
                self.chunking_strategy.extension(),
                self.config.docs_dir.display()
            )));
        }
        let files_processed = corpus.files().len();
        let source_counts = corpus.source_counts();

        let vectors = self.embed_corpus(corpus.docs(), embedder).await?;
        let model = EmbeddingModelMetadata::from_provider(embedder);
        let index = FlatL2Index::build(vectors)?;
        if index.dimension() != model.dimension {
            return Err(RetrieverError::config(format!(
                "embedder reports dimension {} but produced vectors of dimension {}",
                model.dimension,
                index.dimension()
            )));
        }

        let (docs, sources) = corpus.into_parts();
        let descriptor = self.chunking_strategy.descriptor();
        let fingerprint =
            corpus_fingerprint(&descriptor, &model.model_id, model.dimension, &docs, &sources);
        let index = index.with_fingerprint(fingerprint);
        let manifest = Manifest::new(&fingerprint, descriptor.clone(), model.clone(), docs.len());
        let metadata = MetadataStore::new(manifest, docs, sources)?;

        self.store.save(&index, &metadata).await?;

        let report = IngestReport {
            files_processed,
            chunk_count: metadata.len(),
            dimension: index.dimension(),
            source_counts,
            chunking: descriptor,
            model_id: model.model_id,
            fingerprint: metadata.manifest.fingerprint.clone(),
            elapsed: start_time.elapsed(),
            index_path: self.store.index_path(),
            metadata_path: self.store.metadata_path(),
        };

        info!(
            "Ingested {} chunks from {} files in {:?}",
            report.chunk_count, report.files_processed, report.elapsed
        );
        Ok(report)
    }

    async fn embed_corpus(
        &self,
        docs: &[String],
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(docs.len());
        let batch_count = docs.len().div_ceil(self.config.batch_size);

        for (batch_number, batch) in docs.chunks(self.config.batch_size).enumerate() {
            debug!(
                "Embedding batch {}/{} ({} chunks)",
                batch_number + 1,
                batch_count,
                batch.len()
            );
            let result = embedder.embed_texts(batch).await?;
            if result.len() != batch.len() {
                return Err(RetrieverError::integrity(format!(
                    "embedder returned {} vectors for {} chunks",
                    result.len(),
                    batch.len()
                )));
            }
            vectors.extend(result.into_embeddings());
        }

        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kbase_context::ChunkMode;
    use kbase_embed::{EmbedError, EmbeddingResult};
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Embeds text as (word count, character count, vowel count) and records batch sizes.
    #[derive(Default)]
    struct CountingEmbedder {
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        async fn embed_texts(&self, texts: &[String]) -> kbase_embed::Result<EmbeddingResult> {
            self.batches.lock().unwrap().push(texts.len());
            EmbeddingResult::try_new(
                texts
                    .iter()
                    .map(|t| {
                        vec![
                            t.split_whitespace().count() as f32,
                            t.len() as f32,
                            t.chars().filter(|c| "aeiou".contains(*c)).count() as f32,
                        ]
                    })
                    .collect(),
            )
        }

        fn embedding_dimension(&self) -> usize {
            3
        }

        fn provider_name(&self) -> &str {
            "counting"
        }

        fn model_id(&self) -> String {
            "counting:v1:raw".to_string()
        }
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl EmbeddingProvider for BrokenEmbedder {
        async fn embed_texts(&self, _texts: &[String]) -> kbase_embed::Result<EmbeddingResult> {
            Err(EmbedError::embedding_gen(anyhow::anyhow!("out of memory")))
        }

        fn embedding_dimension(&self) -> usize {
            3
        }

        fn provider_name(&self) -> &str {
            "broken"
        }

        fn model_id(&self) -> String {
            "broken:v1:raw".to_string()
        }
    }

    async fn write_docs(dir: &std::path::Path) {
        tokio::fs::write(dir.join("a.txt"), "Refunds are issued within 14 days.")
            .await
            .unwrap();
        tokio::fs::write(dir.join("b.txt"), "Line one\nLine two\nLine three")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_builds_openable_artifacts() {
        let docs = tempdir().unwrap();
        let out = tempdir().unwrap();
        write_docs(docs.path()).await;

        let pipeline = IngestionPipeline::new(
            IngestConfig::new(docs.path(), out.path().join("vector_db")).with_batch_size(2),
        )
        .unwrap();
        let embedder = CountingEmbedder::default();
        let report = pipeline.run(&embedder).await.unwrap();

        assert_eq!(report.files_processed, 2);
        assert_eq!(report.chunk_count, 2);
        assert_eq!(report.dimension, 3);
        assert_eq!(report.chunking, "words:150:30");
        assert_eq!(report.model_id, "counting:v1:raw");
        assert!(report.index_path.is_file());
        assert!(report.metadata_path.is_file());

        let kb = pipeline.store().open().await.unwrap();
        assert_eq!(kb.metadata.sources, vec!["a.txt", "b.txt"]);
        assert_eq!(kb.metadata.docs[1], "Line one Line two Line three");
        assert_eq!(kb.manifest().fingerprint, report.fingerprint);
        assert_eq!(kb.index.vector(0).unwrap(), &[6.0, 34.0, 10.0]);
    }

    #[tokio::test]
    async fn test_embeds_in_configured_batches() {
        let docs = tempdir().unwrap();
        let out = tempdir().unwrap();
        write_docs(docs.path()).await;
        tokio::fs::write(docs.path().join("c.txt"), "x\ny\nz").await.unwrap();

        let pipeline = IngestionPipeline::new(
            IngestConfig::new(docs.path(), out.path())
                .with_chunking(ChunkingConfig::new(ChunkMode::Lines))
                .with_batch_size(4),
        )
        .unwrap();
        let embedder = CountingEmbedder::default();
        let report = pipeline.run(&embedder).await.unwrap();

        // a.txt: 1 line, b.txt: 3 lines, c.txt: 3 lines
        assert_eq!(report.chunk_count, 7);
        assert_eq!(*embedder.batches.lock().unwrap(), vec![4, 3]);
        assert_eq!(
            report.source_counts,
            vec![
                ("a.txt".to_string(), 1),
                ("b.txt".to_string(), 3),
                ("c.txt".to_string(), 3)
            ]
        );
    }

    #[tokio::test]
    async fn test_invalid_configuration_rejected_up_front() {
        let chunking = ChunkingConfig::default().with_chunk_size(10).with_overlap(12);
        let err = IngestionPipeline::new(IngestConfig::new("docs", "out").with_chunking(chunking))
            .unwrap_err();
        assert!(err.is_config_error());

        let err = IngestionPipeline::new(IngestConfig::new("docs", "out").with_batch_size(0))
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[tokio::test]
    async fn test_empty_docs_directory_is_an_error() {
        let docs = tempdir().unwrap();
        let out = tempdir().unwrap();

        let pipeline = IngestionPipeline::new(IngestConfig::new(docs.path(), out.path())).unwrap();
        let err = pipeline.run(&CountingEmbedder::default()).await.unwrap_err();

        assert!(err.is_config_error());
        assert!(!pipeline.store().exists());
    }

    #[tokio::test]
    async fn test_failed_run_keeps_previous_artifacts() {
        let docs = tempdir().unwrap();
        let out = tempdir().unwrap();
        write_docs(docs.path()).await;

        let pipeline = IngestionPipeline::new(IngestConfig::new(docs.path(), out.path())).unwrap();
        pipeline.run(&CountingEmbedder::default()).await.unwrap();
        let before = pipeline.store().open().await.unwrap();

        tokio::fs::write(docs.path().join("c.txt"), "new document").await.unwrap();
        let err = pipeline.run(&BrokenEmbedder).await.unwrap_err();
        assert!(matches!(err, RetrieverError::Embed(_)));

        let after = pipeline.store().open().await.unwrap();
        assert_eq!(after, before);
    }
}
