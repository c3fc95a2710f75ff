
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::RagError;

/// Flat brute-force vector index over squared Euclidean distance.
///
/// Vector i corresponds to ordinal i in the document store built alongside it;
/// the two collections must have identical cardinality and order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Build an index from vectors in their final ordinal order. The dimension
    /// is inferred from the first vector.
    #[inline]
    pub fn build(vectors: Vec<Vec<f32>>) -> Result<Self, RagError> {
        let dimension = vectors.first().map_or(0, Vec::len);

        for vector in &vectors {
            if vector.len() != dimension {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    found: vector.len(),
                });
            }
        }

        Ok(Self { dimension, vectors })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Return the `k` nearest vectors to `query` as `(ordinal, squared
    /// distance)` pairs in ascending distance order. Returns all vectors when
    /// the index holds fewer than `k`. Ties keep insertion order.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, RagError> {
        if self.vectors.is_empty() {
            return Err(RagError::NotInitialized);
        }

        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                found: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(ordinal, vector)| (ordinal, squared_distance(query, vector)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);

        debug!(
            "Searched {} vectors, returning {} results",
            self.vectors.len(),
            scored.len()
        );

        Ok(scored)
    }

    /// Serialize the index to durable storage. The round-trip through `load`
    /// preserves vectors bit-for-bit.
    #[inline]
    pub fn persist(&self, path: &Path) -> Result<()> {
        let bytes = bincode::serialize(self).context("Failed to serialize vector index")?;

        fs::write(path, bytes)
            .with_context(|| format!("Failed to write vector index to {}", path.display()))?;

        info!(
            "Saved vector index ({} vectors, dimension {}) to {}",
            self.vectors.len(),
            self.dimension,
            path.display()
        );

        Ok(())
    }

    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read vector index from {}", path.display()))?;

        let index: Self =
            bincode::deserialize(&bytes).context("Failed to deserialize vector index")?;

        info!(
            "Loaded vector index ({} vectors, dimension {}) from {}",
            index.vectors.len(),
            index.dimension,
            path.display()
        );

        Ok(index)
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).fold(0.0_f32, |acc, (x, y)| {
        let d = x - y;
        d.mul_add(d, acc)
    })
}
