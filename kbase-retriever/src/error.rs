//! Error types for ingestion, persistence and retrieval

use kbase_context::ChunkError;
use kbase_embed::EmbedError;
use std::path::{Path, PathBuf};

/// Result type for retriever operations.
pub type Result<T> = std::result::Result<T, RetrieverError>;

/// Error type for all retriever operations.
///
/// The variants fall into three groups: configuration (bad parameters, an
/// embedder that doesn't match the index), data access (a file that can't be
/// read or written), and integrity (artifacts that disagree with each other).
/// All three are fatal for the operation that raised them.
#[derive(Debug, thiserror::Error)]
pub enum RetrieverError {
    /// Invalid parameters, detected before any work starts
    #[error("Configuration error: {0}")]
    Config(String),

    /// A file or directory could not be read or written
    #[error("Failed to access {}: {source}", path.display())]
    DataAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted artifact expected on disk is absent
    #[error("Missing artifact {}; run `kbase-retriever ingest` first", path.display())]
    MissingArtifact { path: PathBuf },

    /// Persisted artifacts are malformed or disagree with each other
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// The metadata file could not be parsed or serialized
    #[error("Malformed metadata in {}: {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error(transparent)]
    Embed(#[from] EmbedError),

    /// Async task join errors
    #[error("Background task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },
}

impl RetrieverError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn integrity<S: Into<String>>(message: S) -> Self {
        Self::Integrity(message.into())
    }

    /// Wraps an IO error with the path it was raised for.
    pub fn data_access(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::DataAccess {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Returns `true` for errors caused by bad parameters rather than bad data.
    pub fn is_config_error(&self) -> bool {
        match self {
            Self::Config(_) | Self::Chunk(_) => true,
            Self::Embed(e) => e.is_config_error(),
            _ => false,
        }
    }

    /// Returns `true` when persisted artifacts are damaged or inconsistent.
    pub fn is_integrity_error(&self) -> bool {
        matches!(self, Self::Integrity(_) | Self::Metadata { .. })
    }
}
