//! Crate-wide error taxonomy.
//!
//! Ingestion-time errors (`MissingKnowledgeBase`, `DimensionMismatch`,
//! `DuplicateChunkId`) abort startup. Provider errors are transient and
//! retried with bounded backoff before they surface. `CompletionFailed` is
//! terminal per-request and is converted into a structured answer outcome at
//! the orchestrator boundary rather than propagated.

use std::path::PathBuf;

use crate::chunk::ChunkId;

/// Errors produced by the knowledge-base retrieval core.
#[derive(Debug, thiserror::Error)]
pub enum KbError {
    /// The knowledge-base directory does not exist. Fatal at startup.
    #[error("knowledge base directory not found: {}", path.display())]
    MissingKnowledgeBase { path: PathBuf },

    /// A chunk embedding did not match the index dimensionality. Fatal at
    /// index build; indicates an ingestion bug and is never retried.
    #[error("chunk {chunk} has embedding dimension {actual}, index expects {expected}")]
    DimensionMismatch {
        chunk: ChunkId,
        expected: usize,
        actual: usize,
    },

    /// Two chunks shared an id at index build. Fatal, not retried.
    #[error("duplicate chunk id {id} in index build")]
    DuplicateChunkId { id: ChunkId },

    /// The embedding or completion service could not be reached or refused
    /// the request (network, auth, server error). Transient.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The embedding or completion service rate-limited the request.
    /// Transient.
    #[error("provider quota exceeded: {0}")]
    ProviderQuotaExceeded(String),

    /// An external call exceeded its deadline. Transient.
    #[error("operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The completion capability failed after its internal retries.
    #[error("completion failed: {0}")]
    CompletionFailed(String),

    /// A transport-supplied profile value could not be converted to the
    /// typed [`UserProfile`](crate::profile::UserProfile).
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    /// The environment configuration is unusable. Fatal at startup.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl KbError {
    /// Whether the error is worth retrying with backoff.
    ///
    /// Only provider-side conditions qualify; ingestion and validation
    /// errors are deterministic and retrying them cannot help.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            KbError::ProviderUnavailable(_)
                | KbError::ProviderQuotaExceeded(_)
                | KbError::Timeout { .. }
        )
    }
}
