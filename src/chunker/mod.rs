#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Configuration for document chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Target chunk size in bytes
    pub chunk_size: usize,
    /// Number of trailing bytes of a chunk repeated at the start of its successor
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

/// Split raw document text into overlapping chunks of roughly `chunk_size` bytes.
///
/// Splitting prefers paragraph boundaries, then sentence boundaries, then word
/// boundaries. No content is dropped: with overlap disabled, the concatenation
/// of all chunks reproduces the input up to whitespace normalization. A single
/// word longer than `chunk_size` is kept intact rather than split mid-word.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkerConfig) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n") {
        if paragraph.trim().is_empty() {
            continue;
        }

        if paragraph.len() > config.chunk_size {
            for piece in split_oversized_paragraph(paragraph, config.chunk_size) {
                append_piece(&mut chunks, &mut current, &piece, config.chunk_size);
            }
        } else {
            append_piece(&mut chunks, &mut current, paragraph.trim(), config.chunk_size);
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    let chunks = add_overlap(chunks, config.overlap);

    debug!("Chunked {} bytes into {} chunks", text.len(), chunks.len());

    chunks
}

/// Append a piece to the accumulating chunk, flushing when the target size
/// would be exceeded.
fn append_piece(chunks: &mut Vec<String>, current: &mut String, piece: &str, chunk_size: usize) {
    if !current.is_empty() && current.len() + piece.len() + 2 > chunk_size {
        chunks.push(current.trim().to_string());
        current.clear();
    }

    if !current.is_empty() {
        current.push_str("\n\n");
    }
    current.push_str(piece);
}

/// Split a paragraph larger than the chunk size at sentence boundaries,
/// falling back to word boundaries for oversized sentences.
fn split_oversized_paragraph(paragraph: &str, chunk_size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for sentence in paragraph.split_inclusive(['.', '!', '?']) {
        if sentence.len() > chunk_size {
            if !current.trim().is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            pieces.extend(split_by_words(sentence, chunk_size));
            continue;
        }

        if !current.trim().is_empty() && current.len() + sentence.len() > chunk_size {
            pieces.push(std::mem::take(&mut current));
        }
        current.push_str(sentence);
    }

    if !current.trim().is_empty() {
        pieces.push(current);
    }

    pieces
        .into_iter()
        .map(|piece| piece.trim().to_string())
        .filter(|piece| !piece.is_empty())
        .collect()
}

/// Split text at word boundaries as a last resort.
fn split_by_words(text: &str, chunk_size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + word.len() + 1 > chunk_size {
            pieces.push(std::mem::take(&mut current));
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

/// Prefix each chunk after the first with the tail of its predecessor.
///
/// Walks back-to-front so the overlap is taken from the predecessor's
/// original content, not an already-prefixed version.
fn add_overlap(mut chunks: Vec<String>, overlap: usize) -> Vec<String> {
    if overlap == 0 || chunks.len() < 2 {
        return chunks;
    }

    let mut i = chunks.len() - 1;
    while i > 0 {
        let tail = trailing_words_within(&chunks[i - 1], overlap);
        if !tail.is_empty() {
            chunks[i] = format!("{tail} {}", chunks[i]);
        }
        i -= 1;
    }

    chunks
}

/// Trailing whole words of `content` whose combined length fits in `budget`
/// bytes. Returns an empty string when the whole chunk would be repeated.
fn trailing_words_within(content: &str, budget: usize) -> String {
    let words: Vec<&str> = content.split_whitespace().collect();

    let mut taken: Vec<&str> = Vec::new();
    let mut used = 0;
    for word in words.iter().rev() {
        let cost = word.len() + usize::from(!taken.is_empty());
        if used + cost > budget {
            break;
        }
        used += cost;
        taken.push(word);
    }

    if taken.len() == words.len() {
        return String::new();
    }

    taken.reverse();
    taken.join(" ")
}
