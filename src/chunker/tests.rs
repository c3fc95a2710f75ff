use super::*;

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[test]
fn empty_input_produces_no_chunks() {
    let config = ChunkerConfig::default();
    assert!(chunk_text("", &config).is_empty());
    assert!(chunk_text("   \n\n  \t", &config).is_empty());
}

#[test]
fn short_text_is_a_single_chunk() {
    let config = ChunkerConfig::default();
    let chunks = chunk_text("A short paragraph about nothing in particular.", &config);

    assert_eq!(
        chunks,
        vec!["A short paragraph about nothing in particular.".to_string()]
    );
}

#[test]
fn chunks_respect_size_bound() {
    let config = ChunkerConfig {
        chunk_size: 120,
        overlap: 20,
    };
    let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);

    let chunks = chunk_text(&text, &config);

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        // overlap prefix plus joining space may push a chunk past the target
        assert!(
            chunk.len() <= config.chunk_size + config.overlap + 1,
            "chunk of {} bytes exceeds bound",
            chunk.len()
        );
    }
}

#[test]
fn no_content_is_dropped() {
    let config = ChunkerConfig {
        chunk_size: 80,
        overlap: 0,
    };
    let text = (1..=30)
        .map(|i| format!("Sentence number {i} carries some words."))
        .collect::<Vec<_>>()
        .join(" ");

    let chunks = chunk_text(&text, &config);

    assert_eq!(normalize(&chunks.join(" ")), normalize(&text));
}

#[test]
fn paragraphs_are_kept_together_when_they_fit() {
    let config = ChunkerConfig {
        chunk_size: 200,
        overlap: 0,
    };
    let text = "First paragraph here.\n\nSecond paragraph here.";

    let chunks = chunk_text(text, &config);

    assert_eq!(chunks.len(), 1);
    assert!(chunks[0].contains("First paragraph here."));
    assert!(chunks[0].contains("Second paragraph here."));
}

#[test]
fn consecutive_chunks_share_overlap() {
    let config = ChunkerConfig {
        chunk_size: 100,
        overlap: 30,
    };
    let text = (1..=40)
        .map(|i| format!("Clause {i} of the agreement."))
        .collect::<Vec<_>>()
        .join(" ");

    let chunks = chunk_text(&text, &config);
    assert!(chunks.len() > 1);

    for pair in chunks.windows(2) {
        let first_word_of_next = pair[1]
            .split_whitespace()
            .next()
            .expect("chunk should not be empty");
        assert!(
            pair[0].contains(first_word_of_next),
            "chunk {:?} does not overlap into {:?}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn oversized_word_is_not_split() {
    let config = ChunkerConfig {
        chunk_size: 20,
        overlap: 0,
    };
    let long_word = "x".repeat(60);
    let text = format!("intro {long_word} outro");

    let chunks = chunk_text(&text, &config);

    assert!(chunks.iter().any(|c| c.contains(&long_word)));
}
