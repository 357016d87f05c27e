//! Configuration for embedding models

use crate::error::{EmbedError, Result};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Model used when no other is configured.
pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Directory fastembed downloads model files into by default.
pub const DEFAULT_CACHE_DIR: &str = ".fastembed_cache";

/// Configuration for embedding models.
///
/// The same configuration must be used when embedding the corpus and when
/// embedding queries. [`model_id`](Self::model_id) captures everything that
/// affects the produced vectors, and is recorded alongside a built index so
/// that a mismatch can be detected when the index is opened.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct EmbedConfig {
    /// Name of the embedding model to use (e.g. "all-MiniLM-L6-v2")
    #[builder(default = "DEFAULT_MODEL_NAME.to_string()")]
    pub model_name: String,
    /// Directory where model files are downloaded and cached
    #[builder(default = "PathBuf::from(DEFAULT_CACHE_DIR)")]
    pub cache_dir: PathBuf,
    /// Maximum batch size for embedding generation
    #[builder(default = "32")]
    pub batch_size: usize,
    /// Whether to L2-normalize embeddings. Off by default: the index ranks by
    /// raw squared L2, so magnitude is part of the ranking.
    #[builder(default = "false")]
    pub normalize: bool,
    /// Whether to print download progress the first time a model is fetched
    #[builder(default = "true")]
    pub show_download_progress: bool,
}

impl EmbedConfig {
    /// Create a new embedding configuration using the builder
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder::default()
    }

    /// Create a configuration for the named model with default settings
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Self::default()
        }
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set whether to normalize embeddings (builder style)
    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    /// Set the model cache directory (builder style)
    pub fn with_cache_dir<P: AsRef<Path>>(self, cache_dir: P) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            ..self
        }
    }

    /// Get the model name
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Identifier for everything in this configuration that changes the vectors.
    ///
    /// Built from [`canonical_model_name`], so spellings that load the same
    /// model produce the same id.
    pub fn model_id(&self) -> String {
        let normalized_part = if self.normalize { "norm" } else { "raw" };
        format!(
            "fastembed:{}:{}",
            canonical_model_name(&self.model_name),
            normalized_part
        )
    }

    /// Validate the configuration before any model is loaded
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(EmbedError::invalid_config("model name must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config(
                "batch size must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Lowercased model name without any organisation prefix
/// (`sentence-transformers/all-MiniLM-L6-v2` becomes `all-minilm-l6-v2`).
pub fn canonical_model_name(name: &str) -> String {
    let name = name.trim();
    name.rsplit_once('/')
        .map(|(_, short)| short)
        .unwrap_or(name)
        .to_lowercase()
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            batch_size: 32,
            normalize: false,
            show_download_progress: true,
        }
    }
}
