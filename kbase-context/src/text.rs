//! This module splits raw document text into the chunks that get embedded and
//! indexed by the retrieval system.
//!
//! Two strategies are available, and the caller picks one per corpus:
//!
//! - **Word windows** ([`chunk_with_overlap`]): the text is split on whitespace
//!   and cut into fixed-size windows of `chunk_size` words. Consecutive windows
//!   share `overlap` words so that context spanning a boundary is not lost.
//! - **Lines** ([`chunk_lines`]): every non-blank line becomes one chunk.
//!
//! Both are wrapped by [`ChunkStrategy`], which also produces a stable
//! [`descriptor`](ChunkStrategy::descriptor) that the index records alongside
//! its artifacts. A corpus indexed with one strategy can then always be told
//! apart from a corpus indexed with another.
//!
//! # Window Arithmetic
//!
//! With `N` words and `step = chunk_size - overlap`, windows start at
//! `0, step, 2*step, ...` while the start is below `N`, so the strategy yields
//! `ceil(N / step)` chunks. The last windows may be shorter than `chunk_size`.
//!
//! ```
//! use kbase_context::text::chunk_with_overlap;
//!
//! let text = "one two three four five six seven";
//! let chunks = chunk_with_overlap(text, 4, 2).unwrap();
//!
//! assert_eq!(
//!     chunks,
//!     vec![
//!         "one two three four",
//!         "three four five six",
//!         "five six seven",
//!         "seven",
//!     ]
//! );
//! ```
//!
//! # Usage
//!
//! ```
//! use kbase_context::text::ChunkStrategy;
//!
//! let strategy = ChunkStrategy::word_window(150, 30).unwrap();
//! let chunks = strategy.chunks_for("a.txt", "the cat sat").unwrap();
//!
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].source, "a.txt");
//! assert_eq!(chunks[0].text, "the cat sat");
//! assert_eq!(strategy.descriptor(), "words:150:30");
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default number of words per window.
pub const DEFAULT_CHUNK_SIZE: usize = 150;

/// Default number of words shared by consecutive windows.
pub const DEFAULT_OVERLAP: usize = 30;

/// Errors raised when a chunking strategy is configured with impossible parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    /// The window would never advance (`overlap >= chunk_size`) or has no width.
    #[error(
        "invalid word window: chunk_size={chunk_size}, overlap={overlap} (need chunk_size > 0 and overlap < chunk_size)"
    )]
    InvalidWindow { chunk_size: usize, overlap: usize },

    /// A strategy name that doesn't correspond to any known strategy.
    #[error("unknown chunking strategy '{0}'. Valid values are: words, lines")]
    UnknownStrategy(String),
}

/// Splits `text` into overlapping windows of `chunk_size` whitespace-delimited words.
///
/// Consecutive windows start `chunk_size - overlap` words apart. Each window is
/// the words joined by a single space, so runs of whitespace in the source
/// collapse.
///
/// # Errors
///
/// Returns [`ChunkError::InvalidWindow`] when `chunk_size == 0` or
/// `overlap >= chunk_size`, since the window would never advance.
pub fn chunk_with_overlap(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<String>, ChunkError> {
    if chunk_size == 0 || overlap >= chunk_size {
        return Err(ChunkError::InvalidWindow {
            chunk_size,
            overlap,
        });
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    let step = chunk_size - overlap;

    let chunks = (0..words.len())
        .step_by(step)
        .map(|start| {
            let end = (start + chunk_size).min(words.len());
            words[start..end].join(" ")
        })
        .collect();

    Ok(chunks)
}

/// Splits `text` on line breaks, keeping every non-blank line (trimmed) as a chunk.
pub fn chunk_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// A caller-selectable chunking strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// Overlapping windows of whitespace-delimited words.
    WordWindow { chunk_size: usize, overlap: usize },
    /// One chunk per non-blank line.
    Lines,
}

impl Default for ChunkStrategy {
    fn default() -> Self {
        Self::WordWindow {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkStrategy {
    /// Creates a validated word-window strategy.
    pub fn word_window(chunk_size: usize, overlap: usize) -> Result<Self, ChunkError> {
        let strategy = Self::WordWindow {
            chunk_size,
            overlap,
        };
        strategy.validate()?;
        Ok(strategy)
    }

    /// Creates the line-based strategy.
    pub fn lines() -> Self {
        Self::Lines
    }

    /// Checks the strategy parameters without chunking anything.
    pub fn validate(&self) -> Result<(), ChunkError> {
        match *self {
            Self::WordWindow {
                chunk_size,
                overlap,
            } if chunk_size == 0 || overlap >= chunk_size => Err(ChunkError::InvalidWindow {
                chunk_size,
                overlap,
            }),
            _ => Ok(()),
        }
    }

    /// Splits `text` according to this strategy.
    pub fn chunk(&self, text: &str) -> Result<Vec<String>, ChunkError> {
        match *self {
            Self::WordWindow {
                chunk_size,
                overlap,
            } => chunk_with_overlap(text, chunk_size, overlap),
            Self::Lines => Ok(chunk_lines(text)),
        }
    }

    /// Splits `text` and attaches `source` and a sequence number to every chunk.
    pub fn chunks_for(&self, source: &str, text: &str) -> Result<Vec<TextChunk>, ChunkError> {
        let chunks = self
            .chunk(text)?
            .into_iter()
            .enumerate()
            .map(|(sequence, text)| TextChunk {
                source: source.to_string(),
                sequence,
                text,
            })
            .collect();
        Ok(chunks)
    }

    /// Stable textual form of the strategy and its parameters.
    ///
    /// This string is folded into the corpus fingerprint, so it must not change
    /// for a given strategy.
    pub fn descriptor(&self) -> String {
        match *self {
            Self::WordWindow {
                chunk_size,
                overlap,
            } => format!("words:{chunk_size}:{overlap}"),
            Self::Lines => "lines".to_string(),
        }
    }
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}

/// Name of a chunking strategy, as accepted on command lines and in the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChunkMode {
    #[default]
    Words,
    Lines,
}

impl ChunkMode {
    /// Combines the mode with window parameters into a validated strategy.
    ///
    /// `chunk_size` and `overlap` are ignored for [`ChunkMode::Lines`].
    pub fn into_strategy(self, chunk_size: usize, overlap: usize) -> Result<ChunkStrategy, ChunkError> {
        match self {
            ChunkMode::Words => ChunkStrategy::word_window(chunk_size, overlap),
            ChunkMode::Lines => Ok(ChunkStrategy::lines()),
        }
    }
}

impl FromStr for ChunkMode {
    type Err = ChunkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "words" | "word" | "word-window" | "word_window" => Ok(ChunkMode::Words),
            "lines" | "line" => Ok(ChunkMode::Lines),
            _ => Err(ChunkError::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for ChunkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkMode::Words => write!(f, "words"),
            ChunkMode::Lines => write!(f, "lines"),
        }
    }
}

/// A single chunk of a document together with its origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    /// Identifier of the originating document (its file name).
    pub source: String,
    /// Position of this chunk within the document (0-indexed).
    pub sequence: usize,
    /// The chunk text.
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_empty_text_produces_no_chunks() {
        assert!(chunk_with_overlap("", 150, 30).unwrap().is_empty());
        assert!(chunk_with_overlap("   \n\t ", 150, 30).unwrap().is_empty());
        assert!(chunk_lines("").is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = chunk_with_overlap("the cat sat", 150, 30).unwrap();
        assert_eq!(chunks, vec!["the cat sat".to_string()]);
    }

    #[test]
    fn test_windows_overlap_by_requested_amount() {
        let text = words(10);
        let chunks = chunk_with_overlap(&text, 4, 1).unwrap();

        // step = 3 -> starts at 0, 3, 6, 9
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], "w0 w1 w2 w3");
        assert_eq!(chunks[1], "w3 w4 w5 w6");
        assert_eq!(chunks[2], "w6 w7 w8 w9");
        assert_eq!(chunks[3], "w9");
    }

    #[test]
    fn test_whitespace_runs_collapse() {
        let chunks = chunk_with_overlap("a\n\n  b\tc", 10, 0).unwrap();
        assert_eq!(chunks, vec!["a b c".to_string()]);
    }

    #[test]
    fn test_invalid_windows_fail_fast() {
        assert_eq!(
            chunk_with_overlap("a b c", 0, 0),
            Err(ChunkError::InvalidWindow {
                chunk_size: 0,
                overlap: 0
            })
        );
        assert!(chunk_with_overlap("a b c", 5, 5).is_err());
        assert!(chunk_with_overlap("a b c", 5, 9).is_err());
        assert!(ChunkStrategy::word_window(30, 30).is_err());
    }

    #[test]
    fn test_line_strategy_skips_blank_lines() {
        let text = "first line\n\n   \nsecond line  \r\nthird";
        assert_eq!(
            chunk_lines(text),
            vec!["first line", "second line", "third"]
        );
    }

    #[test]
    fn test_chunks_for_attaches_source_and_sequence() {
        let strategy = ChunkStrategy::word_window(2, 0).unwrap();
        let chunks = strategy.chunks_for("notes.txt", "a b c d e").unwrap();

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.source == "notes.txt"));
        assert_eq!(
            chunks.iter().map(|c| c.sequence).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(chunks[2].text, "e");
    }

    #[test]
    fn test_descriptor_is_stable() {
        assert_eq!(ChunkStrategy::default().descriptor(), "words:150:30");
        assert_eq!(ChunkStrategy::lines().descriptor(), "lines");
        assert_eq!(ChunkStrategy::lines().to_string(), "lines");
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("words".parse::<ChunkMode>().unwrap(), ChunkMode::Words);
        assert_eq!("LINES".parse::<ChunkMode>().unwrap(), ChunkMode::Lines);
        assert!("paragraphs".parse::<ChunkMode>().is_err());

        let strategy = ChunkMode::Lines.into_strategy(0, 0).unwrap();
        assert_eq!(strategy, ChunkStrategy::Lines);
        assert!(ChunkMode::Words.into_strategy(10, 10).is_err());
    }

    proptest! {
        #[test]
        fn chunk_count_is_ceil_of_words_over_step(
            n in 0usize..400,
            chunk_size in 1usize..60,
            overlap_seed in 0usize..60,
        ) {
            let overlap = overlap_seed % chunk_size;
            let step = chunk_size - overlap;
            let chunks = chunk_with_overlap(&words(n), chunk_size, overlap).unwrap();

            prop_assert_eq!(chunks.len(), n.div_ceil(step));
            for chunk in &chunks {
                let count = chunk.split_whitespace().count();
                prop_assert!(count >= 1 && count <= chunk_size);
            }
        }

        #[test]
        fn text_no_longer_than_step_is_one_chunk(
            n in 1usize..50,
            extra in 0usize..20,
        ) {
            let text = words(n);
            let chunks = chunk_with_overlap(&text, n + extra, extra).unwrap();
            prop_assert_eq!(chunks, vec![text]);
        }
    }
}
