//! Exhaustive nearest-neighbor index over raw vectors.
//!
//! [`FlatL2Index`] stores every vector contiguously and answers queries by
//! scanning all of them. Distances are squared Euclidean over the vectors as
//! given; nothing is normalized, so vector magnitude is part of the ranking.
//!
//! ## File format
//!
//! ```text
//! offset  size  field
//! 0       4     magic "KBIX"
//! 4       4     format version (u32 LE)
//! 8       4     metric tag (u32 LE, 1 = squared L2)
//! 12      4     dimension (u32 LE)
//! 16      8     vector count (u64 LE)
//! 24      32    corpus fingerprint
//! 56      ...   count * dimension f32 values (LE), row-major
//! ```

use super::Fingerprint;
use crate::error::{Result, RetrieverError};
use serde::Serialize;
use std::path::Path;

const MAGIC: &[u8; 4] = b"KBIX";
/// Version of the index file layout
pub const INDEX_FORMAT_VERSION: u32 = 1;
const METRIC_SQUARED_L2: u32 = 1;
const HEADER_LEN: usize = 56;

/// A single search hit: the vector's position in the index and its distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Flat (brute force) index ranked by squared L2 distance
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dimension: usize,
    data: Vec<f32>,
    fingerprint: Fingerprint,
}

impl FlatL2Index {
    /// Builds an index from vectors in corpus order.
    ///
    /// # Errors
    /// Returns a configuration error if `vectors` is empty, if the first vector
    /// has no components, or if any vector's dimension differs from the first.
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let dimension = match vectors.first() {
            None => return Err(RetrieverError::config("cannot build an index from zero vectors")),
            Some(first) if first.is_empty() => {
                return Err(RetrieverError::config("vectors must have at least one dimension"));
            }
            Some(first) => first.len(),
        };

        let mut data = Vec::with_capacity(vectors.len() * dimension);
        for (position, vector) in vectors.into_iter().enumerate() {
            if vector.len() != dimension {
                return Err(RetrieverError::config(format!(
                    "vector {position} has dimension {}, expected {dimension}",
                    vector.len()
                )));
            }
            data.extend(vector);
        }

        Ok(Self {
            dimension,
            data,
            fingerprint: [0; 32],
        })
    }

    /// Stamps the index with the fingerprint of the corpus it was built from.
    pub fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of vectors in the index
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The stored vector at `position`, if any
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Returns the `min(k, len)` closest vectors to `query`, nearest first.
    ///
    /// Equal distances are ordered by ascending position.
    ///
    /// # Errors
    /// Returns a configuration error if `k == 0` or the query's dimension
    /// differs from the index's.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Err(RetrieverError::config("k must be at least 1"));
        }
        if query.len() != self.dimension {
            return Err(RetrieverError::config(format!(
                "query has dimension {}, index has dimension {}",
                query.len(),
                self.dimension
            )));
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                distance: squared_l2(query, vector),
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.position.cmp(&b.position))
        });
        neighbors.truncate(k);

        Ok(neighbors)
    }

    /// Serializes the index into its on-disk representation.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes =
            Vec::with_capacity(HEADER_LEN + self.data.len() * std::mem::size_of::<f32>());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&INDEX_FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&METRIC_SQUARED_L2.to_le_bytes());
        bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&self.fingerprint);
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Parses an index from its on-disk representation.
    ///
    /// # Errors
    /// Returns an integrity error for a wrong magic number, an unsupported
    /// version or metric, a zero dimension or count, or a payload whose length
    /// doesn't match the header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(RetrieverError::integrity(format!(
                "index file is truncated ({} bytes, header needs {HEADER_LEN})",
                bytes.len()
            )));
        }
        if &bytes[0..4] != MAGIC {
            return Err(RetrieverError::integrity("index file has the wrong magic number"));
        }

        let version = le_u32(&bytes[4..8]);
        if version != INDEX_FORMAT_VERSION {
            return Err(RetrieverError::integrity(format!(
                "unsupported index format version {version} (expected {INDEX_FORMAT_VERSION})"
            )));
        }
        let metric = le_u32(&bytes[8..12]);
        if metric != METRIC_SQUARED_L2 {
            return Err(RetrieverError::integrity(format!("unknown metric tag {metric}")));
        }

        let dimension = le_u32(&bytes[12..16]) as usize;
        let count = le_u64(&bytes[16..24]) as usize;
        if dimension == 0 || count == 0 {
            return Err(RetrieverError::integrity(format!(
                "index file is empty (dimension {dimension}, count {count})"
            )));
        }

        let mut fingerprint = [0u8; 32];
        fingerprint.copy_from_slice(&bytes[24..HEADER_LEN]);

        let payload = &bytes[HEADER_LEN..];
        let expected = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(std::mem::size_of::<f32>()))
            .ok_or_else(|| RetrieverError::integrity("index header sizes overflow"))?;
        if payload.len() != expected {
            return Err(RetrieverError::integrity(format!(
                "index payload is {} bytes, header promises {expected}",
                payload.len()
            )));
        }

        Ok(Self {
            dimension,
            data: decode_le_f32(payload),
            fingerprint,
        })
    }

    /// Writes the index to `path`, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()).map_err(|e| RetrieverError::data_access(path, e))
    }

    /// Reads an index previously written by [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RetrieverError::MissingArtifact {
                path: path.to_path_buf(),
            },
            _ => RetrieverError::data_access(path, e),
        })?;
        Self::from_bytes(&bytes)
    }
}

/// Squared Euclidean distance between two equal-length vectors.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_le_bytes(buf)
}

/// `payload.len()` must be a multiple of 4.
fn decode_le_f32(payload: &[u8]) -> Vec<f32> {
    bytemuck::pod_collect_to_vec::<u8, u32>(payload)
        .into_iter()
        .map(|word| f32::from_bits(u32::from_le(word)))
        .collect()
}
