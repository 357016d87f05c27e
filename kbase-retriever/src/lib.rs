//! kbase-retriever: document ingestion and nearest-neighbor retrieval
//!
//! This crate turns a directory of plain-text documents into a persisted,
//! searchable knowledge base, and answers free-text queries against it with
//! ranked, source-attributed chunks.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: corpus loading, chunking, the ingestion pipeline and the [`Retriever`]
//! - **[`storage`]**: the flat L2 index, the metadata store and artifact persistence
//! - **[`error`]**: the [`RetrieverError`] taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kbase_embed::{EmbedConfig, FastEmbedProvider};
//! use kbase_retriever::retrieval::{IngestConfig, IngestionPipeline, Retriever};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let embedder = Arc::new(FastEmbedProvider::create(EmbedConfig::default()).await?);
//!
//! // Offline: build the artifacts
//! let pipeline = IngestionPipeline::new(IngestConfig::new("data/docs", "backend/vector_db"))?;
//! let report = pipeline.run(embedder.as_ref()).await?;
//! println!("indexed {} chunks", report.chunk_count);
//!
//! // Online: load once and query many times
//! let knowledge_base = Arc::new(pipeline.store().open().await?);
//! let retriever = Retriever::new_checked(embedder, knowledge_base)?;
//! for hit in retriever.retrieve("What is the refund policy?", 4).await? {
//!     println!("{:.3} {} {}", hit.distance, hit.source, hit.text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! docs → Corpus Loader → Chunker → Embedder → FlatL2Index + MetadataStore → ArtifactStore
//!                                                                              ↓
//!                                 query → Embedder → Retriever ← KnowledgeBase
//! ```

pub mod error;
pub mod retrieval;
pub mod storage;

pub use error::{Result, RetrieverError};
pub use retrieval::{RetrievedChunk, Retriever};
pub use storage::KnowledgeBase;
