//! Embedding provider implementations

use crate::config::{EmbedConfig, canonical_model_name};
use crate::error::{EmbedError, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};

/// Result of embedding generation
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vec<f32>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result, checking that every vector has the same dimension.
    ///
    /// The dimension is inferred from the first embedding vector. An empty
    /// result has dimension 0.
    ///
    /// # Errors
    /// Returns [`EmbedError::DimensionMismatch`] if any vector differs in
    /// length from the first.
    pub fn try_new(embeddings: Vec<Vec<f32>>) -> Result<Self> {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(EmbedError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }
        Ok(Self {
            embeddings,
            dimension,
        })
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    /// Consumes the result, returning the vectors in input order.
    pub fn into_embeddings(self) -> Vec<Vec<f32>> {
        self.embeddings
    }
}

/// Trait for embedding providers that can generate embeddings from text.
///
/// The same provider (same model, same settings) must embed both the corpus and
/// the queries run against it; vectors from different models are not
/// comparable, and nothing about the numbers themselves reveals a mix-up.
/// [`model_id`](Self::model_id) exists so that callers can record and check
/// which model produced a set of vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let result = self.embed_texts(&[text.to_string()]).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::invalid_config("No embedding generated for text"))
    }

    /// Generate embeddings for multiple texts, one vector per text in input order
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Get the dimension of embeddings produced by this provider
    fn embedding_dimension(&self) -> usize;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;

    /// Identifier of the model and settings producing the vectors
    fn model_id(&self) -> String;
}

/// Maps a model name to one of fastembed's built-in models.
///
/// Names are matched case-insensitively, and a leading organisation prefix
/// such as `sentence-transformers/` or `BAAI/` is ignored.
pub fn resolve_model(name: &str) -> Result<EmbeddingModel> {
    let model = match canonical_model_name(name).as_str() {
        "all-minilm-l6-v2" => EmbeddingModel::AllMiniLML6V2,
        "all-minilm-l12-v2" => EmbeddingModel::AllMiniLML12V2,
        "bge-small-en-v1.5" => EmbeddingModel::BGESmallENV15,
        "bge-base-en-v1.5" => EmbeddingModel::BGEBaseENV15,
        "snowflake-arctic-embed-xs" => EmbeddingModel::SnowflakeArcticEmbedXS,
        "nomic-embed-text-v1.5" => EmbeddingModel::NomicEmbedTextV15,
        _ => {
            return Err(EmbedError::invalid_config(format!(
                "Unknown embedding model '{name}'. Supported models: all-MiniLM-L6-v2, \
                 all-MiniLM-L12-v2, bge-small-en-v1.5, bge-base-en-v1.5, \
                 snowflake-arctic-embed-xs, nomic-embed-text-v1.5"
            )));
        }
    };
    Ok(model)
}

/// FastEmbed-based embedding provider using local ONNX models
#[derive(Clone)]
pub struct FastEmbedProvider {
    config: EmbedConfig,
    model: Arc<Mutex<TextEmbedding>>,
    dimension: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("config", &self.config)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedProvider {
    /// Loads the configured model, downloading it into the cache directory if needed.
    ///
    /// The returned provider owns the loaded model; construct it once per
    /// process and share it (it is cheap to clone).
    pub async fn create(config: EmbedConfig) -> Result<Self> {
        config.validate()?;
        let model_kind = resolve_model(config.model_name())?;

        tracing::info!(
            "Initializing FastEmbed provider for model: {}",
            config.model_name()
        );

        tokio::fs::create_dir_all(&config.cache_dir)
            .await
            .map_err(|source| EmbedError::CacheDir {
                path: config.cache_dir.clone(),
                source,
            })?;

        let init_config = config.clone();
        let (model, dimension) =
            tokio::task::spawn_blocking(move || -> Result<(TextEmbedding, usize)> {
                let init_options = InitOptions::new(model_kind)
                    .with_cache_dir(init_config.cache_dir.clone())
                    .with_show_download_progress(init_config.show_download_progress);

                let mut model =
                    TextEmbedding::try_new(init_options).map_err(EmbedError::model_init)?;

                // Probe the dimension with a throwaway embedding
                let probe = model
                    .embed(vec!["dimension probe"], None)
                    .map_err(EmbedError::model_init)?;
                let dimension = probe.first().map(|emb| emb.len()).unwrap_or(0);
                if dimension == 0 {
                    return Err(EmbedError::invalid_config(
                        "Model validation failed: empty embedding",
                    ));
                }

                Ok((model, dimension))
            })
            .await??;

        tracing::info!(
            "Model {} loaded successfully. Dimension: {}",
            config.model_name(),
            dimension
        );

        Ok(Self {
            config,
            model: Arc::new(Mutex::new(model)),
            dimension,
        })
    }

    /// The configuration this provider was created with
    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    fn normalize_in_place(embedding: &mut [f32]) {
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in embedding.iter_mut() {
                *value /= norm;
            }
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return EmbeddingResult::try_new(vec![]);
        }

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.config.batch_size) {
            let batch = batch.to_vec();
            let model = Arc::clone(&self.model);

            let batch_embeddings = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
                tracing::debug!("Processing batch of {} texts", batch.len());

                let mut model_guard = model.lock().map_err(|_| EmbedError::ModelPoisoned)?;
                model_guard
                    .embed(batch, None)
                    .map_err(EmbedError::embedding_gen)
            })
            .await??;

            all_embeddings.extend(batch_embeddings);
        }

        if self.config.normalize {
            for embedding in &mut all_embeddings {
                Self::normalize_in_place(embedding);
            }
        }

        let result = EmbeddingResult::try_new(all_embeddings)?;
        if result.dimension != self.dimension {
            return Err(EmbedError::DimensionMismatch {
                expected: self.dimension,
                actual: result.dimension,
            });
        }

        tracing::debug!("Generated {} embeddings", result.len());
        Ok(result)
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }

    fn model_id(&self) -> String {
        self.config.model_id()
    }
}
