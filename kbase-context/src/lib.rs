pub mod text;

// Re-export the chunking entry points for external use
pub use text::{
    ChunkError, ChunkMode, ChunkStrategy, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, TextChunk,
    chunk_lines, chunk_with_overlap,
};
