use super::Fingerprint;
use crate::retrieval::corpus::source_counts;
use crate::error::{Result, RetrieverError};
use chrono::{DateTime, Utc};
use kbase_embed::EmbeddingProvider;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Version of the metadata file layout
pub const METADATA_FORMAT_VERSION: u32 = 1;

/// Metadata about the embedding model used for generating embeddings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingModelMetadata {
    /// Identifier covering the model and every setting that changes its vectors
    /// (e.g. "fastembed:all-minilm-l6-v2:raw")
    pub model_id: String,
    /// Provider of the embedding model (e.g. "fastembed")
    pub provider: String,
    /// Dimension of the embedding vectors
    pub dimension: usize,
}

impl EmbeddingModelMetadata {
    pub fn new(model_id: impl Into<String>, provider: impl Into<String>, dimension: usize) -> Self {
        Self {
            model_id: model_id.into(),
            provider: provider.into(),
            dimension,
        }
    }

    /// Describes the model behind a live provider
    pub fn from_provider(provider: &dyn EmbeddingProvider) -> Self {
        Self::new(
            provider.model_id(),
            provider.provider_name(),
            provider.embedding_dimension(),
        )
    }

    /// Whether vectors from `other` can be compared against vectors from `self`
    pub fn is_compatible(&self, other: &EmbeddingModelMetadata) -> bool {
        self.model_id == other.model_id && self.dimension == other.dimension
    }
}

/// Description of one ingestion run, stored with its output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    /// Version of kbase-retriever that created the artifacts
    pub retriever_version: String,
    /// Hex-encoded corpus fingerprint, also stored in the index header
    pub fingerprint: String,
    /// Chunking strategy descriptor, e.g. "words:150:30"
    pub chunking: String,
    pub embedding_model: EmbeddingModelMetadata,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

impl Manifest {
    pub fn new(
        fingerprint: &Fingerprint,
        chunking: impl Into<String>,
        embedding_model: EmbeddingModelMetadata,
        chunk_count: usize,
    ) -> Self {
        Self {
            format_version: METADATA_FORMAT_VERSION,
            retriever_version: env!("CARGO_PKG_VERSION").to_string(),
            fingerprint: hex::encode(fingerprint),
            chunking: chunking.into(),
            embedding_model,
            chunk_count,
            created_at: Utc::now(),
        }
    }

    /// Decodes the stored fingerprint
    pub fn fingerprint_bytes(&self) -> Result<Fingerprint> {
        let bytes = hex::decode(&self.fingerprint).map_err(|_| {
            RetrieverError::integrity(format!(
                "manifest fingerprint is not valid hex: {}",
                self.fingerprint
            ))
        })?;
        bytes.try_into().map_err(|_| {
            RetrieverError::integrity("manifest fingerprint must be 32 bytes (64 hex characters)")
        })
    }
}

/// Chunk texts and their sources, positionally aligned with the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataStore {
    pub manifest: Manifest,
    pub docs: Vec<String>,
    pub sources: Vec<String>,
}

impl MetadataStore {
    /// Creates a store, checking that every chunk has exactly one source.
    pub fn new(manifest: Manifest, docs: Vec<String>, sources: Vec<String>) -> Result<Self> {
        let store = Self {
            manifest,
            docs,
            sources,
        };
        store.validate()?;
        Ok(store)
    }

    /// Checks the internal consistency of the store.
    pub fn validate(&self) -> Result<()> {
        if self.manifest.format_version != METADATA_FORMAT_VERSION {
            return Err(RetrieverError::integrity(format!(
                "unsupported metadata format version {} (expected {METADATA_FORMAT_VERSION})",
                self.manifest.format_version
            )));
        }
        if self.docs.len() != self.sources.len() {
            return Err(RetrieverError::integrity(format!(
                "{} docs but {} sources",
                self.docs.len(),
                self.sources.len()
            )));
        }
        if self.manifest.chunk_count != self.docs.len() {
            return Err(RetrieverError::integrity(format!(
                "manifest records {} chunks but {} are stored",
                self.manifest.chunk_count,
                self.docs.len()
            )));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// The `(doc, source)` pair at `position`
    pub fn get(&self, position: usize) -> Option<(&str, &str)> {
        let doc = self.docs.get(position)?;
        let source = self.sources.get(position)?;
        Some((doc.as_str(), source.as_str()))
    }

    /// Number of chunks per source file, in corpus order
    pub fn source_counts(&self) -> Vec<(String, usize)> {
        source_counts(&self.sources)
    }

    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    /// Parses and validates a store; `path` is only used for error messages.
    pub fn from_json_bytes(bytes: &[u8], path: &Path) -> Result<Self> {
        let store: Self = serde_json::from_slice(bytes).map_err(|source| RetrieverError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;
        store.validate()?;
        Ok(store)
    }

    /// Reads a store from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RetrieverError::MissingArtifact {
                path: path.to_path_buf(),
            },
            _ => RetrieverError::data_access(path, e),
        })?;
        Self::from_json_bytes(&bytes, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_store() -> MetadataStore {
        let model = EmbeddingModelMetadata::new("fastembed:all-minilm-l6-v2:raw", "fastembed", 384);
        MetadataStore::new(
            Manifest::new(&[3; 32], "words:150:30", model, 3),
            vec!["alpha".into(), "beta".into(), "gamma".into()],
            vec!["a.txt".into(), "a.txt".into(), "b.txt".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_misaligned_sources() {
        let store = sample_store();
        let err = MetadataStore::new(store.manifest.clone(), store.docs.clone(), vec!["a.txt".into()])
            .unwrap_err();
        assert!(err.is_integrity_error());
    }

    #[test]
    fn test_json_roundtrip_and_lookup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meta.json");
        let store = sample_store();
        std::fs::write(&path, store.to_json_bytes().unwrap()).unwrap();

        let loaded = MetadataStore::load(&path).unwrap();
        assert_eq!(loaded, store);
        assert_eq!(loaded.get(2), Some(("gamma", "b.txt")));
        assert_eq!(loaded.get(3), None);
        assert_eq!(loaded.manifest.fingerprint_bytes().unwrap(), [3; 32]);
        assert_eq!(
            loaded.source_counts(),
            vec![("a.txt".to_string(), 2), ("b.txt".to_string(), 1)]
        );
    }

    #[test]
    fn test_malformed_json_is_integrity_error() {
        let err = MetadataStore::from_json_bytes(b"{ not json", Path::new("meta.json")).unwrap_err();
        assert!(err.is_integrity_error());
        assert!(err.to_string().contains("meta.json"));
    }

    #[test]
    fn test_bad_fingerprint_hex() {
        let mut store = sample_store();
        store.manifest.fingerprint = "zz".into();
        assert!(store.manifest.fingerprint_bytes().unwrap_err().is_integrity_error());
        store.manifest.fingerprint = "abcd".into();
        assert!(store.manifest.fingerprint_bytes().unwrap_err().is_integrity_error());
    }

    #[test]
    fn test_model_compatibility() {
        let stored = EmbeddingModelMetadata::new("fastembed:all-minilm-l6-v2:raw", "fastembed", 384);
        assert!(stored.is_compatible(&stored.clone()));
        assert!(!stored.is_compatible(&EmbeddingModelMetadata::new(
            "fastembed:all-minilm-l6-v2:norm",
            "fastembed",
            384
        )));
        assert!(!stored.is_compatible(&EmbeddingModelMetadata::new(
            "fastembed:all-minilm-l6-v2:raw",
            "fastembed",
            768
        )));
    }
}
