
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::chunker::{ChunkerConfig, chunk_text};
use crate::extract::extract_text;
use crate::index::VectorIndex;
use crate::ollama::EmbeddingProvider;

/// Offline builder that turns a folder of documents into an aligned vector
/// index and chunk metadata file.
///
/// Build-time failures are isolated: an unreadable or empty document skips
/// that document, a failed embedding skips that chunk. Texts and vectors are
/// accumulated strictly in file-then-chunk order, which becomes the ordinal
/// order of both persisted files.
pub struct IndexBuilder<E> {
    embedder: E,
    chunking: ChunkerConfig,
    texts: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl<E: EmbeddingProvider> IndexBuilder<E> {
    #[inline]
    pub fn new(embedder: E, chunking: ChunkerConfig) -> Self {
        Self {
            embedder,
            chunking,
            texts: Vec::new(),
            vectors: Vec::new(),
        }
    }

    /// Number of accumulated `(text, vector)` pairs.
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.vectors.len()
    }

    /// Extract, chunk, and embed every supported document under `folder`.
    /// Files are visited in sorted name order so rebuilds are reproducible.
    #[inline]
    pub fn build_from_folder(&mut self, folder: &Path) -> Result<()> {
        let mut paths: Vec<PathBuf> = fs::read_dir(folder)
            .with_context(|| format!("Failed to read document folder: {}", folder.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        for path in paths {
            match extract_text(&path) {
                Ok(Some(raw_text)) => {
                    if raw_text.trim().is_empty() {
                        warn!("No text found in {}, skipping", path.display());
                        continue;
                    }
                    self.ingest_document(&path, &raw_text);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Failed to extract {}: {}", path.display(), e);
                }
            }
        }

        info!(
            "Accumulated {} chunks from {}",
            self.vectors.len(),
            folder.display()
        );

        Ok(())
    }

    fn ingest_document(&mut self, path: &Path, raw_text: &str) {
        info!("Processing: {}", path.display());

        let chunks = chunk_text(raw_text, &self.chunking);
        debug!("Split {} into {} chunks", path.display(), chunks.len());

        for chunk in chunks {
            match self.embedder.embed(&chunk) {
                Ok(vector) => {
                    self.texts.push(flatten_to_line(&chunk));
                    self.vectors.push(vector);
                }
                Err(e) => {
                    warn!("Error embedding chunk from {}: {}", path.display(), e);
                }
            }
        }
    }

    /// Persist the vector index and the chunk metadata file from the same
    /// accumulated set. Both are written to temporary siblings first and
    /// renamed only after both writes succeed, so a crash cannot leave a new
    /// index next to stale metadata. With nothing accumulated this is a no-op.
    #[inline]
    pub fn persist(&self, index_path: &Path, metadata_path: &Path) -> Result<()> {
        if self.vectors.is_empty() {
            warn!("No embeddings to save");
            return Ok(());
        }

        let index = VectorIndex::build(self.vectors.clone())?;

        let index_tmp = tmp_sibling(index_path);
        let metadata_tmp = tmp_sibling(metadata_path);

        index.persist(&index_tmp)?;

        let mut metadata = String::new();
        for text in &self.texts {
            metadata.push_str(text);
            metadata.push('\n');
        }
        fs::write(&metadata_tmp, metadata).with_context(|| {
            format!("Failed to write chunk metadata to {}", metadata_tmp.display())
        })?;

        fs::rename(&index_tmp, index_path)
            .with_context(|| format!("Failed to move index into {}", index_path.display()))?;
        fs::rename(&metadata_tmp, metadata_path).with_context(|| {
            format!("Failed to move metadata into {}", metadata_path.display())
        })?;

        info!(
            "Saved {} chunks to {} and {}",
            self.texts.len(),
            index_path.display(),
            metadata_path.display()
        );

        Ok(())
    }
}

/// Flatten a chunk onto a single line so it occupies exactly one ordinal in
/// the metadata file.
fn flatten_to_line(chunk: &str) -> String {
    chunk.trim().replace(['\n', '\r'], " ")
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(|| "output".into(), |n| n.to_os_string());
    name.push(".tmp");
    path.with_file_name(name)
}
