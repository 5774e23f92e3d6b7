//! Ingestion: turning source documents into chunkable plain text.
//!
//! * [`loader`] - HTML parsing into `(text, category)` sections with
//!   eligibility metadata and skipped-section diagnostics.
//! * [`chunker`] - deterministic splitting of section text into
//!   bounded-size chunks.

pub mod chunker;
pub mod loader;

pub use chunker::{ChunkerConfig, chunk_section, chunk_text};
pub use loader::{LoadOutcome, Section, SkippedSection, load_dir, parse_document};
