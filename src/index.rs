//! The in-memory vector index.
//!
//! Holds every chunk with its embedding for the process lifetime. Built
//! wholesale at startup (or explicit refresh), never patched incrementally,
//! and never mutated afterwards; safe to share across concurrent queries
//! without locking.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::chunk::Chunk;
use crate::types::KbError;

/// Immutable collection of all chunks and their vectors.
#[derive(Debug)]
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    dimension: usize,
}

impl VectorIndex {
    /// Builds the index, validating every chunk on the way in.
    ///
    /// Rejects embeddings whose dimensionality differs from `dimension`
    /// and duplicate chunk ids; both indicate an ingestion bug and abort
    /// startup rather than being retried.
    pub fn build(chunks: Vec<Chunk>, dimension: usize) -> Result<Self, KbError> {
        let mut seen = HashSet::with_capacity(chunks.len());
        for chunk in &chunks {
            if chunk.embedding.len() != dimension {
                return Err(KbError::DimensionMismatch {
                    chunk: chunk.id,
                    expected: dimension,
                    actual: chunk.embedding.len(),
                });
            }
            if !seen.insert(chunk.id) {
                return Err(KbError::DuplicateChunkId { id: chunk.id });
            }
        }
        tracing::debug!(chunks = chunks.len(), dimension, "vector index built");
        Ok(Self { chunks, dimension })
    }

    /// An empty index of the given dimensionality.
    pub fn empty(dimension: usize) -> Self {
        Self {
            chunks: Vec::new(),
            dimension,
        }
    }

    pub fn all(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Summary statistics for health and introspection endpoints.
    pub fn stats(&self) -> KbStats {
        let mut category_counts: BTreeMap<String, usize> = BTreeMap::new();
        for chunk in &self.chunks {
            *category_counts
                .entry(chunk.category.label().to_string())
                .or_default() += 1;
        }
        KbStats {
            chunk_count: self.chunks.len(),
            category_counts,
            embedding_dimension: self.dimension,
        }
    }
}

/// Knowledge-base summary exposed to the transport layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KbStats {
    pub chunk_count: usize,
    pub category_counts: BTreeMap<String, usize>,
    pub embedding_dimension: usize,
}

/// Cosine similarity between two vectors, in `[-1, 1]`.
///
/// Defined as `0.0` when either vector is the zero vector, which keeps the
/// mock embedding mode and empty queries well-behaved.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
