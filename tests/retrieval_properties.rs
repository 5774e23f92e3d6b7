//! Property tests for the similarity measure and the chunker.

use proptest::prelude::*;

use carerag::cosine_similarity;
use carerag::ingestion::{ChunkerConfig, chunk_text};

fn vector_pair() -> impl Strategy<Value = (Vec<f32>, Vec<f32>)> {
    (1usize..8).prop_flat_map(|len| {
        (
            prop::collection::vec(-10.0f32..10.0, len),
            prop::collection::vec(-10.0f32..10.0, len),
        )
    })
}

/// Paragraphs of short sentences: every sentence stays well under the
/// chunker maximum, so the upper bound must hold for every chunk.
fn document() -> impl Strategy<Value = String> {
    // Sentences start uppercase so UAX#29 segmentation finds the breaks.
    let word = "[A-Z][a-z]{1,7}";
    let sentence = prop::collection::vec(word, 1..12).prop_map(|words| words.join(" ") + ".");
    let paragraph = prop::collection::vec(sentence, 1..6).prop_map(|s| s.join(" "));
    prop::collection::vec(paragraph, 1..5).prop_map(|paragraphs| paragraphs.join("\n\n"))
}

proptest! {
    #[test]
    fn cosine_is_bounded_and_symmetric((a, b) in vector_pair()) {
        let ab = cosine_similarity(&a, &b);
        let ba = cosine_similarity(&b, &a);
        prop_assert!((-1.0 - 1e-5..=1.0 + 1e-5).contains(&ab));
        prop_assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_a_vector_with_itself_is_one(a in prop::collection::vec(-10.0f32..10.0, 1..8)) {
        let norm: f32 = a.iter().map(|x| x * x).sum();
        prop_assume!(norm > 1e-3);
        let sim = cosine_similarity(&a, &a);
        prop_assert!((sim - 1.0).abs() < 1e-4);
    }

    #[test]
    fn chunking_is_idempotent(text in document()) {
        let config = ChunkerConfig { min_chars: 40, max_chars: 200 };
        let first = chunk_text(&text, config);
        let second = chunk_text(&text, config);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn chunks_respect_the_upper_bound(text in document()) {
        let config = ChunkerConfig { min_chars: 40, max_chars: 200 };
        for chunk in chunk_text(&text, config) {
            prop_assert!(!chunk.trim().is_empty());
            prop_assert!(chunk.chars().count() <= config.max_chars);
        }
    }
}
