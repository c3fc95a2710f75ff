use super::*;
use tempfile::TempDir;

fn buffer_with_ceiling(dir: &TempDir, max_bytes: usize) -> HistoryBuffer {
    HistoryBuffer::new(dir.path().join("history.txt"), max_bytes).expect("can create buffer")
}

#[test]
fn append_adds_line_and_read_returns_it() {
    let dir = TempDir::new().expect("can create temp dir");
    let buffer = buffer_with_ceiling(&dir, 1024);

    buffer.append("retrieved context").expect("can append");

    assert_eq!(
        buffer.read().expect("can read"),
        "retrieved context\n".to_string()
    );
}

#[test]
fn oldest_line_is_dropped_when_ceiling_exceeded() {
    // Fixture from the trim contract: 20-byte ceiling, two 10-byte lines.
    let dir = TempDir::new().expect("can create temp dir");
    let buffer = buffer_with_ceiling(&dir, 20);

    buffer.append("aaaaaaaaaa").expect("can append");
    assert_eq!(buffer.read().expect("can read"), "aaaaaaaaaa\n");

    buffer.append("bbbbbbbbbb").expect("can append");
    assert_eq!(buffer.read().expect("can read"), "bbbbbbbbbb\n");
}

#[test]
fn byte_length_stays_at_or_under_ceiling_after_every_append() {
    let dir = TempDir::new().expect("can create temp dir");
    let buffer = buffer_with_ceiling(&dir, 64);

    for i in 0..50 {
        buffer.append(&format!("entry number {i}")).expect("can append");
        let contents = buffer.read().expect("can read");
        assert!(
            contents.len() <= 64,
            "history grew to {} bytes",
            contents.len()
        );
    }

    // Newest entries survive, oldest are gone.
    let contents = buffer.read().expect("can read");
    assert!(contents.contains("entry number 49"));
    assert!(!contents.contains("entry number 0\n"));
}

#[test]
fn single_oversize_line_is_never_split() {
    let dir = TempDir::new().expect("can create temp dir");
    let buffer = buffer_with_ceiling(&dir, 20);

    let long_line = "c".repeat(100);
    buffer.append(&long_line).expect("can append");

    assert_eq!(buffer.read().expect("can read"), format!("{long_line}\n"));
}

#[test]
fn trim_survivors_are_predictable() {
    let dir = TempDir::new().expect("can create temp dir");
    let buffer = buffer_with_ceiling(&dir, 24);

    // Each line costs 8 bytes including its newline; three fit exactly.
    for entry in ["line001", "line002", "line003", "line004"] {
        buffer.append(entry).expect("can append");
    }

    assert_eq!(
        buffer.read().expect("can read"),
        "line002\nline003\nline004\n"
    );
}

#[test]
fn clear_truncates_to_empty() {
    let dir = TempDir::new().expect("can create temp dir");
    let buffer = buffer_with_ceiling(&dir, 1024);

    buffer.append("something").expect("can append");
    buffer.clear().expect("can clear");

    assert_eq!(buffer.read().expect("can read"), "");
}

#[test]
fn multi_line_entries_trim_per_line() {
    let dir = TempDir::new().expect("can create temp dir");
    let buffer = buffer_with_ceiling(&dir, 16);

    // A single entry holding two lines; trimming may drop its oldest line
    // but never splits within a line.
    buffer.append("first doc\nsecond doc").expect("can append");

    assert_eq!(buffer.read().expect("can read"), "second doc\n");
}

#[test]
fn concurrent_appends_respect_the_ceiling() {
    use std::sync::Arc;
    use std::thread;

    let dir = TempDir::new().expect("can create temp dir");
    let buffer = Arc::new(buffer_with_ceiling(&dir, 128));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for i in 0..25 {
                    buffer
                        .append(&format!("thread {t} entry {i}"))
                        .expect("can append");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("thread should not panic");
    }

    let contents = buffer.read().expect("can read");
    assert!(contents.len() <= 128);
    assert!(contents.lines().all(|line| line.starts_with("thread")));
}
