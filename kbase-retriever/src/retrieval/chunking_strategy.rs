use crate::error::Result;
use kbase_context::{ChunkMode, ChunkStrategy, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, TextChunk};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File extension indexed when no other is configured
pub const DEFAULT_EXTENSION: &str = "txt";

/// Configuration for chunking files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Which strategy splits documents
    pub mode: ChunkMode,
    /// Words per window (word mode only)
    pub chunk_size: usize,
    /// Words shared by consecutive windows (word mode only)
    pub overlap: usize,
    /// Only files with this extension are indexed
    pub extension: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            mode: ChunkMode::Words,
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

impl ChunkingConfig {
    pub fn new(mode: ChunkMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }
}

/// Strategy for chunking files - delegates the splitting to kbase-context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingStrategy {
    strategy: ChunkStrategy,
    extension: String,
}

impl Default for ChunkingStrategy {
    fn default() -> Self {
        Self::from_strategy(ChunkStrategy::default())
    }
}

impl ChunkingStrategy {
    /// Create a new chunking strategy, rejecting impossible window parameters
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        let strategy = config.mode.into_strategy(config.chunk_size, config.overlap)?;
        Ok(Self {
            strategy,
            extension: config.extension.trim_start_matches('.').to_string(),
        })
    }

    /// Wrap an already-validated strategy, indexing the default extension
    pub fn from_strategy(strategy: ChunkStrategy) -> Self {
        Self {
            strategy,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn strategy(&self) -> &ChunkStrategy {
        &self.strategy
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Stable descriptor recorded in the manifest and fingerprint
    pub fn descriptor(&self) -> String {
        self.strategy.descriptor()
    }

    /// Chunk a document's content, dropping chunks with no visible text
    pub fn chunk_content(&self, source: &str, content: &str) -> Result<Vec<TextChunk>> {
        let chunks: Vec<TextChunk> = self
            .strategy
            .chunks_for(source, content)?
            .into_iter()
            .filter(|chunk| !chunk.text.trim().is_empty())
            .collect();

        tracing::debug!(
            "Chunked {} into {} chunks ({})",
            source,
            chunks.len(),
            self.strategy
        );

        Ok(chunks)
    }

    /// Check if a file should be indexed based on its path
    pub fn should_index_file(&self, file_path: &Path) -> bool {
        // Skip hidden files such as editor swap files
        if let Some(filename) = file_path.file_name().and_then(|n| n.to_str()) {
            if filename.starts_with('.') {
                return false;
            }
        }

        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RetrieverError;

    #[test]
    fn test_chunking_strategy() {
        let strategy = ChunkingStrategy::new(
            ChunkingConfig::new(ChunkMode::Words)
                .with_chunk_size(4)
                .with_overlap(1),
        )
        .unwrap();

        let chunks = strategy
            .chunk_content("policy.txt", "one two three four five six seven")
            .unwrap();

        assert_eq!(strategy.descriptor(), "words:4:1");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "one two three four");
        assert_eq!(chunks[1].text, "four five six seven");
        assert_eq!(chunks[2].text, "seven");
        assert!(chunks.iter().all(|c| c.source == "policy.txt"));
    }

    #[test]
    fn test_lines_strategy_drops_blank_lines() {
        let strategy = ChunkingStrategy::new(ChunkingConfig::new(ChunkMode::Lines)).unwrap();
        let chunks = strategy
            .chunk_content("faq.txt", "Q: hours?\n\n   \nA: nine to five\n")
            .unwrap();

        assert_eq!(strategy.descriptor(), "lines");
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Q: hours?", "A: nine to five"]);
    }

    #[test]
    fn test_invalid_window_rejected() {
        let err = ChunkingStrategy::new(
            ChunkingConfig::default()
                .with_chunk_size(30)
                .with_overlap(30),
        )
        .unwrap_err();
        assert!(matches!(err, RetrieverError::Chunk(_)));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_should_index_file() {
        let strategy = ChunkingStrategy::default();

        assert!(strategy.should_index_file(Path::new("docs/refunds.txt")));
        assert!(strategy.should_index_file(Path::new("LEAVE.TXT")));

        assert!(!strategy.should_index_file(Path::new("notes.md")));
        assert!(!strategy.should_index_file(Path::new("README")));
        assert!(!strategy.should_index_file(Path::new(".draft.txt")));

        let markdown = ChunkingStrategy::new(ChunkingConfig::default().with_extension(".md")).unwrap();
        assert!(markdown.should_index_file(Path::new("notes.md")));
        assert!(!markdown.should_index_file(Path::new("refunds.txt")));
    }
}
