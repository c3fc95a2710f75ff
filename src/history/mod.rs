#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Append-only conversational memory backed by a single flat file.
///
/// Entries are raw text blobs terminated by a newline. When the file grows
/// past the byte ceiling, whole lines are removed from the oldest end until
/// it fits again; a line is never split, so a single oversize line survives
/// intact. The whole read-trim-write cycle runs under a mutex so concurrent
/// appenders cannot interleave partial states.
#[derive(Debug)]
pub struct HistoryBuffer {
    path: PathBuf,
    max_bytes: usize,
    lock: Mutex<()>,
}

impl HistoryBuffer {
    /// Open the history file at `path`, creating it when absent.
    #[inline]
    pub fn new<P: Into<PathBuf>>(path: P, max_bytes: usize) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create history directory: {}", parent.display())
                })?;
            }
        }

        if !path.exists() {
            fs::write(&path, "")
                .with_context(|| format!("Failed to create history file: {}", path.display()))?;
        }

        Ok(Self {
            path,
            max_bytes,
            lock: Mutex::new(()),
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `text` plus a trailing newline, then trim oldest lines until
    /// the file is back at or under the ceiling.
    #[inline]
    pub fn append(&self, text: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open history file: {}", self.path.display()))?;
        file.write_all(text.as_bytes())
            .context("Failed to append to history")?;
        file.write_all(b"\n")
            .context("Failed to append to history")?;
        drop(file);

        self.trim()
    }

    /// Full current contents.
    #[inline]
    pub fn read(&self) -> Result<String> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read history file: {}", self.path.display()))
    }

    /// Truncate the history to empty.
    #[inline]
    pub fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        fs::write(&self.path, "")
            .with_context(|| format!("Failed to clear history file: {}", self.path.display()))?;

        debug!("Cleared history at {}", self.path.display());
        Ok(())
    }

    // Caller must hold the lock.
    fn trim(&self) -> Result<()> {
        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read history file: {}", self.path.display()))?;

        if data.len() <= self.max_bytes {
            return Ok(());
        }

        let mut lines: Vec<&str> = data.lines().collect();
        let mut total: usize = lines.iter().map(|line| line.len() + 1).sum();
        let mut dropped = 0;

        while lines.len() > 1 && total > self.max_bytes {
            total -= lines[dropped].len() + 1;
            dropped += 1;
        }
        lines.drain(..dropped);

        let mut remaining = String::with_capacity(total);
        for line in &lines {
            remaining.push_str(line);
            remaining.push('\n');
        }

        fs::write(&self.path, remaining)
            .with_context(|| format!("Failed to rewrite history file: {}", self.path.display()))?;

        debug!(
            "Trimmed {} oldest history lines, {} bytes remain",
            dropped, total
        );

        Ok(())
    }
}
