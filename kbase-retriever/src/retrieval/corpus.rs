//! Loading a directory of documents into an index-aligned chunk corpus.

use super::chunking_strategy::ChunkingStrategy;
use crate::error::{Result, RetrieverError};
use std::path::Path;
use tracing::{debug, info};

/// Chunks and their source files, aligned by position.
///
/// `sources[i]` is always the file name `docs[i]` was cut from. Both vectors
/// are only ever extended together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    docs: Vec<String>,
    sources: Vec<String>,
    files: Vec<String>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one chunk and the file it came from.
    pub fn push(&mut self, doc: impl Into<String>, source: impl Into<String>) {
        self.docs.push(doc.into());
        self.sources.push(source.into());
    }

    pub fn docs(&self) -> &[String] {
        &self.docs
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Names of every file that was read, including ones that produced no chunks
    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Iterates over `(doc, source)` pairs in corpus order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.docs
            .iter()
            .map(String::as_str)
            .zip(self.sources.iter().map(String::as_str))
    }

    /// Number of chunks per source file, in the order the files were read.
    pub fn source_counts(&self) -> Vec<(String, usize)> {
        source_counts(&self.sources)
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<String>) {
        (self.docs, self.sources)
    }
}

/// Counts chunks per source name, keeping first-seen order.
pub fn source_counts(sources: &[String]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for source in sources {
        match counts.iter_mut().find(|(name, _)| name == source) {
            Some((_, count)) => *count += 1,
            None => counts.push((source.clone(), 1)),
        }
    }
    counts
}

/// Loads every matching file directly under `dir` and chunks it.
///
/// Files are processed in sorted name order so that the same directory always
/// produces the same corpus. Subdirectories are not descended into. A directory
/// with no matching files yields an empty corpus.
///
/// # Errors
/// Returns [`RetrieverError::DataAccess`] naming the path if the directory
/// cannot be listed, or a matching file has a non-UTF-8 name or cannot be
/// read as UTF-8 text.
pub async fn load_corpus(dir: &Path, strategy: &ChunkingStrategy) -> Result<Corpus> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| RetrieverError::data_access(dir, e))?;

    let mut file_names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| RetrieverError::data_access(dir, e))?
    {
        let path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| RetrieverError::data_access(&path, e))?;
        if !file_type.is_file() || !strategy.should_index_file(&path) {
            continue;
        }
        let name = entry.file_name().into_string().map_err(|_| {
            RetrieverError::data_access(
                &path,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "file name is not valid UTF-8",
                ),
            )
        })?;
        file_names.push(name);
    }
    file_names.sort();

    let mut corpus = Corpus::new();
    for name in file_names {
        let path = dir.join(&name);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| RetrieverError::data_access(&path, e))?;

        let chunks = strategy.chunk_content(&name, &content)?;
        debug!("Loaded {} ({} chunks)", name, chunks.len());
        for chunk in chunks {
            corpus.push(chunk.text, chunk.source);
        }
        corpus.files.push(name);
    }

    info!(
        "Loaded {} chunks from {} files in {}",
        corpus.len(),
        corpus.files.len(),
        dir.display()
    );

    Ok(corpus)
}
