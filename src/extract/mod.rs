#[cfg(test)]
mod tests;

use std::fs;
use std::path::Path;
use tracing::debug;

use crate::RagError;

/// Extract raw text from a source document.
///
/// Returns `Ok(None)` for file types the builder should silently skip.
/// Extraction failures are non-fatal at build time; the builder logs and
/// moves on to the next document.
#[inline]
pub fn extract_text(path: &Path) -> Result<Option<String>, RagError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();

    if extension.eq_ignore_ascii_case("pdf") {
        let text = pdf_extract::extract_text(path)
            .map_err(|e| RagError::Extraction(format!("{}: {}", path.display(), e)))?;
        return Ok(Some(text));
    }

    if extension.eq_ignore_ascii_case("txt") || extension.eq_ignore_ascii_case("md") {
        let text = fs::read_to_string(path)
            .map_err(|e| RagError::Extraction(format!("{}: {}", path.display(), e)))?;
        return Ok(Some(text));
    }

    debug!("Skipping unsupported file type: {}", path.display());
    Ok(None)
}
