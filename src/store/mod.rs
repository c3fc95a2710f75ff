
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

/// Ordered mapping from chunk ordinal to chunk text, positionally aligned
/// with the vector index built from the same accumulation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentStore {
    chunks: Vec<String>,
}

impl DocumentStore {
    /// Load from a newline-delimited metadata file where line i holds the
    /// text of chunk ordinal i. Line endings are stripped.
    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read chunk metadata from {}", path.display()))?;

        let chunks: Vec<String> = content
            .lines()
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect();

        info!("Loaded {} chunks from {}", chunks.len(), path.display());

        Ok(Self { chunks })
    }

    #[inline]
    pub fn from_chunks(chunks: Vec<String>) -> Self {
        Self { chunks }
    }

    /// Chunk text for an ordinal. Unknown ordinals yield an empty string so
    /// the query path stays total over whatever the index returns.
    #[inline]
    pub fn get(&self, ordinal: usize) -> &str {
        self.chunks.get(ordinal).map_or("", String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}
