//! Splits extracted section text into bounded-size chunks.
//!
//! Splitting is purely lexical and deterministic: paragraph boundaries
//! first, sentence boundaries (via `unicode-segmentation`) for paragraphs
//! that exceed the maximum, greedy packing back up to the maximum, then a
//! merge pass that folds pathologically tiny fragments into a neighbor.
//! Lengths are measured in characters, not bytes; the corpus is largely
//! Hebrew.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

use crate::chunk::PendingChunk;
use crate::ingestion::loader::Section;

static INLINE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\r]+").expect("static regex"));
static PARA_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").expect("static regex"));

/// Chunk-size bounds in characters.
#[derive(Clone, Copy, Debug)]
pub struct ChunkerConfig {
    /// Fragments shorter than this are merged with a neighbor when possible.
    pub min_chars: usize,
    /// No chunk exceeds this, except a single sentence that alone does.
    pub max_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            min_chars: 80,
            max_chars: 500,
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Collapses inline whitespace runs and trims every line, preserving
/// paragraph breaks (runs of blank lines).
pub fn normalize_whitespace(text: &str) -> String {
    let collapsed = INLINE_WS.replace_all(text, " ");
    let trimmed: Vec<String> = collapsed
        .split('\n')
        .map(|line| line.trim().to_string())
        .collect();
    PARA_BREAK
        .replace_all(trimmed.join("\n").trim(), "\n\n")
        .into_owned()
}

/// Splits normalized text into an ordered sequence of chunk texts.
///
/// Same input always yields the same boundaries; there is no randomness
/// anywhere in the pass.
pub fn chunk_text(text: &str, config: ChunkerConfig) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut fragments: Vec<String> = Vec::new();
    for paragraph in normalized.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if char_len(paragraph) <= config.max_chars {
            fragments.push(paragraph.to_string());
        } else {
            pack_sentences(paragraph, config.max_chars, &mut fragments);
        }
    }

    merge_tiny_fragments(fragments, config)
}

/// Packs the paragraph's sentences greedily into fragments of at most
/// `max_chars`. A single sentence longer than the maximum stands alone,
/// unsplit below sentence granularity.
fn pack_sentences(paragraph: &str, max_chars: usize, out: &mut Vec<String>) {
    let mut buffer = String::new();
    for sentence in paragraph.unicode_sentences() {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        if buffer.is_empty() {
            buffer.push_str(sentence);
        } else if char_len(&buffer) + 1 + char_len(sentence) <= max_chars {
            buffer.push(' ');
            buffer.push_str(sentence);
        } else {
            out.push(std::mem::take(&mut buffer));
            buffer.push_str(sentence);
        }
    }
    if !buffer.is_empty() {
        out.push(buffer);
    }
}

fn merge_tiny_fragments(fragments: Vec<String>, config: ChunkerConfig) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for fragment in fragments {
        match merged.last_mut() {
            Some(prev)
                if (char_len(prev) < config.min_chars
                    || char_len(&fragment) < config.min_chars)
                    && char_len(prev) + 1 + char_len(&fragment) <= config.max_chars =>
            {
                prev.push('\n');
                prev.push_str(&fragment);
            }
            _ => merged.push(fragment),
        }
    }
    merged
}

/// Chunks a loaded section, carrying its category, source file, and
/// eligibility onto every produced chunk. No ids or vectors are assigned
/// here.
pub fn chunk_section(section: &Section, config: ChunkerConfig) -> Vec<PendingChunk> {
    chunk_text(&section.text, config)
        .into_iter()
        .map(|text| PendingChunk {
            text,
            source_file: section.source_file.clone(),
            category: section.category,
            eligibility: section.eligibility.clone(),
        })
        .collect()
}
