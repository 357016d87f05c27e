//! Query-time retrieval: embed a query and map its nearest vectors back to chunks.

use crate::error::{Result, RetrieverError};
use crate::storage::{EmbeddingModelMetadata, KnowledgeBase};
use itertools::Itertools;
use kbase_embed::EmbeddingProvider;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// A chunk returned for a query, with its rank information
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    /// Position of the chunk in the corpus
    pub position: usize,
    /// Squared L2 distance between the query and the chunk's vector
    pub distance: f32,
    pub text: String,
    /// File the chunk was cut from
    pub source: String,
}

/// Finds the chunks nearest to a free-text query.
///
/// Holds the embedder and the loaded knowledge base by shared handle. The
/// embedder must be the same model (and settings) the index was built with;
/// [`check_compatible`](Self::check_compatible) verifies that against the
/// manifest.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    knowledge_base: Arc<KnowledgeBase>,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder.model_id())
            .field("chunks", &self.knowledge_base.len())
            .finish()
    }
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, knowledge_base: Arc<KnowledgeBase>) -> Self {
        Self {
            embedder,
            knowledge_base,
        }
    }

    /// Like [`new`](Self::new), but fails if the embedder doesn't match the index.
    pub fn new_checked(
        embedder: Arc<dyn EmbeddingProvider>,
        knowledge_base: Arc<KnowledgeBase>,
    ) -> Result<Self> {
        let retriever = Self::new(embedder, knowledge_base);
        retriever.check_compatible()?;
        Ok(retriever)
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.knowledge_base
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Verifies the live embedder against the model recorded at ingestion.
    pub fn check_compatible(&self) -> Result<()> {
        let stored = &self.knowledge_base.manifest().embedding_model;
        let live = EmbeddingModelMetadata::from_provider(self.embedder.as_ref());
        if !stored.is_compatible(&live) {
            return Err(RetrieverError::config(format!(
                "embedder {} (dimension {}) does not match the index, which was built with {} (dimension {})",
                live.model_id, live.dimension, stored.model_id, stored.dimension
            )));
        }
        Ok(())
    }

    /// Returns up to `k` chunks nearest to `query`, nearest first.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Err(RetrieverError::config("k must be at least 1"));
        }
        let vector = self.embedder.embed_text(query).await?;
        let results = self.retrieve_by_vector(&vector, k)?;
        debug!(
            "Retrieved {} chunks for query ({} chars), best distance {:?}",
            results.len(),
            query.len(),
            results.first().map(|r| r.distance)
        );
        Ok(results)
    }

    /// Returns up to `k` chunks nearest to an already-embedded query.
    pub fn retrieve_by_vector(&self, vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let neighbors = self.knowledge_base.index.search(vector, k)?;

        if !neighbors.iter().map(|n| n.position).all_unique() {
            return Err(RetrieverError::integrity("index returned a position twice"));
        }

        neighbors
            .into_iter()
            .map(|neighbor| {
                let (text, source) = self
                    .knowledge_base
                    .metadata
                    .get(neighbor.position)
                    .ok_or_else(|| {
                        RetrieverError::integrity(format!(
                            "index returned position {} but the corpus has {} chunks",
                            neighbor.position,
                            self.knowledge_base.metadata.len()
                        ))
                    })?;
                Ok(RetrievedChunk {
                    position: neighbor.position,
                    distance: neighbor.distance,
                    text: text.to_string(),
                    source: source.to_string(),
                })
            })
            .collect()
    }
}
