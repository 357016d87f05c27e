pub mod chunking_strategy;
pub mod corpus;
pub mod ingest;
pub mod retriever;

pub use chunking_strategy::{ChunkingConfig, ChunkingStrategy, DEFAULT_EXTENSION};
pub use corpus::{Corpus, load_corpus};
pub use ingest::{IngestConfig, IngestReport, IngestionPipeline};
pub use retriever::{RetrievedChunk, Retriever};
