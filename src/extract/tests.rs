use super::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn reads_plain_text_files() {
    let dir = TempDir::new().expect("can create temp dir");
    let path = dir.path().join("notes.txt");
    fs::write(&path, "plain text content").expect("can write fixture");

    let text = extract_text(&path).expect("extraction should succeed");

    assert_eq!(text.as_deref(), Some("plain text content"));
}

#[test]
fn reads_markdown_files() {
    let dir = TempDir::new().expect("can create temp dir");
    let path = dir.path().join("README.md");
    fs::write(&path, "# Heading\n\nBody.").expect("can write fixture");

    let text = extract_text(&path).expect("extraction should succeed");

    assert_eq!(text.as_deref(), Some("# Heading\n\nBody."));
}

#[test]
fn extension_matching_is_case_insensitive() {
    let dir = TempDir::new().expect("can create temp dir");
    let path = dir.path().join("NOTES.TXT");
    fs::write(&path, "content").expect("can write fixture");

    let text = extract_text(&path).expect("extraction should succeed");

    assert_eq!(text.as_deref(), Some("content"));
}

#[test]
fn unsupported_types_are_skipped() {
    let dir = TempDir::new().expect("can create temp dir");
    let path = dir.path().join("image.png");
    fs::write(&path, [0_u8, 1, 2]).expect("can write fixture");

    let text = extract_text(&path).expect("extraction should succeed");

    assert!(text.is_none());
}

#[test]
fn missing_file_is_an_extraction_error() {
    let result = extract_text(Path::new("/nonexistent/file.txt"));

    assert!(matches!(result, Err(RagError::Extraction(_))));
}
