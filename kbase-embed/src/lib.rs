//! # kbase-embed
//!
//! Text embedding for the knowledge base, backed by local ONNX models via
//! FastEmbed. The crate exposes a small async [`EmbeddingProvider`] trait so
//! that ingestion and query-time retrieval can share one provider, and so that
//! tests can substitute a deterministic fake.
//!
//! ## Quick Start
//!
//! ```no_run
//! use kbase_embed::{EmbedConfig, EmbeddingProvider, FastEmbedProvider};
//!
//! # async fn example() -> kbase_embed::Result<()> {
//! let provider = FastEmbedProvider::create(
//!     EmbedConfig::default().with_cache_dir("/tmp/models")
//! ).await?;
//!
//! let texts = vec!["Refund policy".to_string(), "Leave policy".to_string()];
//! let result = provider.embed_texts(&texts).await?;
//!
//! println!("Generated {} embeddings of dimension {}",
//!          result.len(), result.dimension);
//! # Ok(())
//! # }
//! ```
//!
//! ## Supported Models
//!
//! [`provider::resolve_model`] maps names onto FastEmbed's built-in models.
//! The default is `all-MiniLM-L6-v2` (384 dimensions).
//!
//! ## Model Lifetime
//!
//! Loading a model is expensive. [`FastEmbedProvider::create`] loads it once
//! and the provider is then passed around explicitly; there is no hidden
//! process-wide cache.

pub mod config;
pub mod error;
pub mod provider;

// Re-export main types for easy access
pub use config::{DEFAULT_CACHE_DIR, DEFAULT_MODEL_NAME, EmbedConfig};
pub use error::{EmbedError, Result};
pub use provider::{EmbeddingProvider, EmbeddingResult, FastEmbedProvider};
