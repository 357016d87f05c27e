//! Errors raised while loading a model or embedding text

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, EmbedError>;

/// Failure of an embedding operation.
///
/// Configuration problems (unknown model names, bad batch sizes, vectors whose
/// dimension disagrees with the rest of the batch) are kept apart from runtime
/// failures inside the model, so callers can treat the former as fatal
/// startup errors.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("Invalid embedding configuration: {message}")]
    InvalidConfig { message: String },

    /// A produced or supplied vector does not have the expected dimensionality
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Could not load the embedding model: {source}")]
    ModelLoad {
        #[source]
        source: anyhow::Error,
    },

    #[error("Embedding inference failed: {source}")]
    Inference {
        #[source]
        source: anyhow::Error,
    },

    /// The model lock was poisoned by a panic in another inference call
    #[error("Embedding model is unavailable: a previous inference call panicked")]
    ModelPoisoned,

    #[error("Model cache directory {} is not usable: {source}", path.display())]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Embedding worker thread failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl EmbedError {
    pub fn model_init(source: impl Into<anyhow::Error>) -> Self {
        Self::ModelLoad {
            source: source.into(),
        }
    }

    pub fn embedding_gen(source: impl Into<anyhow::Error>) -> Self {
        Self::Inference {
            source: source.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// True for errors caused by configuration rather than by the model at runtime.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. } | Self::DimensionMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_classification() {
        assert!(EmbedError::invalid_config("batch size must be at least 1").is_config_error());
        assert!(
            EmbedError::DimensionMismatch {
                expected: 384,
                actual: 768
            }
            .is_config_error()
        );
        assert!(!EmbedError::embedding_gen(anyhow::anyhow!("onnx failure")).is_config_error());
        assert!(!EmbedError::ModelPoisoned.is_config_error());
    }

    #[test]
    fn test_cache_dir_error_names_path() {
        let err = EmbedError::CacheDir {
            path: PathBuf::from("/nonexistent/.fastembed_cache"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().contains("/nonexistent/.fastembed_cache"));
    }
}
