//! Profile-aware retrieval and grounded answering over Israeli health-fund
//! service documents.
//!
//! ```text
//! HTML documents ──► ingestion::loader ──► Sections + diagnostics
//!                                  │
//!                     ingestion::chunker ──► PendingChunk
//!                                  │
//!                  embedding (live │ mock) ──► vectors
//!                                  │
//!                        index::VectorIndex   (built once at startup)
//!                                  │
//! query + profile ──► retriever ──► ranked chunks ──► answer ──► outcome
//!                                                        │
//!                                       completion (live │ mock)
//! ```
//!
//! The corpus is small (hundreds of chunks), held entirely in memory, and
//! re-embedded at process startup; the design optimizes for simplicity and
//! determinism, not scale. The HTTP layer drives the crate through
//! [`service::KnowledgeService`]: `retrieve` and `answer` per request,
//! `kb_stats` for introspection.

pub mod answer;
pub mod chunk;
pub mod completion;
pub mod config;
pub mod embedding;
pub mod index;
pub mod ingestion;
pub mod profile;
pub mod retriever;
pub mod retry;
pub mod service;
pub mod types;

pub use answer::{AnswerConfig, AnswerOrchestrator, AnswerOutcome, AnswerStatus, Message};
pub use chunk::{Chunk, ChunkId, EligibilityTag, PendingChunk, ServiceCategory};
pub use completion::{CompletionProvider, LiveCompletionProvider, MockCompletionProvider};
pub use config::KbConfig;
pub use embedding::{EmbeddingProvider, LiveEmbeddingProvider, MockEmbeddingProvider};
pub use index::{KbStats, VectorIndex, cosine_similarity};
pub use ingestion::{ChunkerConfig, LoadOutcome, Section, SkippedSection};
pub use profile::{Hmo, Language, MembershipTier, UserProfile};
pub use retriever::{Retriever, ScoredChunk};
pub use service::KnowledgeService;
pub use types::KbError;
