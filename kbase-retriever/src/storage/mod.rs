//! Persistence for the knowledge base
//!
//! A built knowledge base is two files in one artifact directory:
//!
//! - **`index.bin`**: the [`FlatL2Index`] vectors, see [`flat_index`]
//! - **`meta.json`**: the chunk texts, their sources and the [`Manifest`]
//!
//! Both carry the same [`Fingerprint`] of the corpus build, so a pair written
//! by different ingestion runs is rejected when opened.
//!
//! ## Architecture
//!
//! ```text
//! FlatL2Index ──┐
//!               ├─ ArtifactStore (locking, atomic writes) ── KnowledgeBase
//! MetadataStore ┘
//! ```

pub mod artifacts;
pub mod flat_index;
pub mod metadata;

pub use artifacts::{ArtifactStore, INDEX_FILE, KnowledgeBase, LOCK_FILE, METADATA_FILE};
pub use flat_index::{FlatL2Index, Neighbor};
pub use metadata::{EmbeddingModelMetadata, Manifest, MetadataStore};

/// Blake3 digest binding an index file and a metadata file to one corpus build (32 bytes).
pub type Fingerprint = [u8; 32];

/// Computes the fingerprint of a corpus build.
///
/// Covers the chunking descriptor, the embedding model id and dimension, and
/// every `(doc, source)` pair in order. Each field is length-prefixed so that
/// moving text between adjacent fields changes the digest.
pub fn corpus_fingerprint(
    chunking: &str,
    model_id: &str,
    dimension: usize,
    docs: &[String],
    sources: &[String],
) -> Fingerprint {
    let mut hasher = blake3::Hasher::new();
    hash_field(&mut hasher, chunking.as_bytes());
    hash_field(&mut hasher, model_id.as_bytes());
    hasher.update(&(dimension as u64).to_le_bytes());
    hasher.update(&(docs.len() as u64).to_le_bytes());
    for (doc, source) in docs.iter().zip(sources) {
        hash_field(&mut hasher, doc.as_bytes());
        hash_field(&mut hasher, source.as_bytes());
    }
    *hasher.finalize().as_bytes()
}

fn hash_field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
