//! Profile-aware similarity search over the vector index.
//!
//! The retriever owns the read side of the pipeline: embed the query,
//! filter candidates by profile eligibility, rank by cosine similarity,
//! return the top `k`. Ordering is deterministic: descending score, ties
//! broken by ascending chunk id, never by container iteration order.

use std::sync::Arc;

use crate::chunk::Chunk;
use crate::embedding::EmbeddingProvider;
use crate::index::{VectorIndex, cosine_similarity};
use crate::profile::UserProfile;
use crate::types::KbError;

/// One ranked retrieval hit, borrowing its chunk from the index.
#[derive(Clone, Copy, Debug)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

/// Query-time owner of the vector index.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { index, embedder }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Retrieves the `k` most similar eligible chunks for `query`.
    ///
    /// Eligibility filtering is skipped entirely while the profile is
    /// unconfirmed; the broader default set models the not-yet-personalized
    /// onboarding state. An empty index yields an empty result, not an
    /// error; when fewer than `k` chunks are eligible, all of them are
    /// returned without padding. Empty or whitespace-only queries are still
    /// embedded; deciding whether a low-relevance ranking is useful is the
    /// caller's concern.
    pub async fn retrieve(
        &self,
        query: &str,
        profile: &UserProfile,
        k: usize,
    ) -> Result<Vec<ScoredChunk<'_>>, KbError> {
        if self.index.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;

        let mut scored: Vec<ScoredChunk<'_>> = self
            .index
            .all()
            .iter()
            .filter(|chunk| chunk.eligible_for(profile))
            .map(|chunk| ScoredChunk {
                chunk,
                score: cosine_similarity(&query_vector, &chunk.embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        scored.truncate(k);

        tracing::debug!(
            query_len = query.len(),
            hmo = ?profile.hmo,
            tier = ?profile.membership_tier,
            confirmed = profile.confirmed,
            hits = scored.len(),
            top_score = scored.first().map(|s| s.score),
            "similarity search"
        );
        Ok(scored)
    }
}
