//! The chunk data model: the immutable unit of retrievable knowledge.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::profile::{Hmo, MembershipTier, UserProfile};

/// Stable chunk identifier, assigned sequentially during ingestion.
///
/// Ordering on `ChunkId` is the deterministic tie-break order for retrieval
/// results with equal similarity scores.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ChunkId(pub u32);

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The fixed set of service categories covered by the knowledge base.
///
/// Each category corresponds to one recognized source document. File names
/// preserve the corpus's spelling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ServiceCategory {
    Alternative,
    CommunicationClinic,
    Dental,
    Optometry,
    Pregnancy,
    Workshops,
}

impl ServiceCategory {
    pub const ALL: [ServiceCategory; 6] = [
        ServiceCategory::Alternative,
        ServiceCategory::CommunicationClinic,
        ServiceCategory::Dental,
        ServiceCategory::Optometry,
        ServiceCategory::Pregnancy,
        ServiceCategory::Workshops,
    ];

    /// The source file this category is loaded from.
    pub fn source_file(&self) -> &'static str {
        match self {
            ServiceCategory::Alternative => "alternative_services.html",
            ServiceCategory::CommunicationClinic => "communication_clinic_services.html",
            ServiceCategory::Dental => "dentel_services.html",
            ServiceCategory::Optometry => "optometry_services.html",
            ServiceCategory::Pregnancy => "pragrency_services.html",
            ServiceCategory::Workshops => "workshops_services.html",
        }
    }

    /// Hebrew display label used when prefixing chunk texts.
    pub fn label(&self) -> &'static str {
        match self {
            ServiceCategory::Alternative => "רפואה משלימה",
            ServiceCategory::CommunicationClinic => "מרפאות תקשורת",
            ServiceCategory::Dental => "מרפאות שיניים",
            ServiceCategory::Optometry => "אופטומטריה",
            ServiceCategory::Pregnancy => "הריון",
            ServiceCategory::Workshops => "סדנאות בריאות",
        }
    }

    /// Reverse lookup from a recognized file name.
    pub fn from_source_file(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.source_file() == name)
    }
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Restricts a chunk to one (health fund, membership tier) combination.
///
/// A chunk with an empty tag set applies to every profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EligibilityTag {
    pub hmo: Hmo,
    pub tier: MembershipTier,
}

impl EligibilityTag {
    pub fn new(hmo: Hmo, tier: MembershipTier) -> Self {
        Self { hmo, tier }
    }

    /// Whether this tag matches the populated fields of `profile`.
    ///
    /// Each field is an independent predicate: an unset profile field
    /// matches any tag value.
    pub fn matches(&self, profile: &UserProfile) -> bool {
        let hmo_ok = profile.hmo.is_none_or(|hmo| hmo == self.hmo);
        let tier_ok = profile
            .membership_tier
            .is_none_or(|tier| tier == self.tier);
        hmo_ok && tier_ok
    }
}

/// A chunk as produced by the chunker: text and metadata, no id or vector
/// yet. Ids and embeddings are assigned by the ingestion pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingChunk {
    pub text: String,
    pub source_file: String,
    pub category: ServiceCategory,
    pub eligibility: Vec<EligibilityTag>,
}

impl PendingChunk {
    /// Finalizes the chunk with its identity and embedding.
    pub fn into_chunk(self, id: ChunkId, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id,
            text: self.text,
            source_file: self.source_file,
            category: self.category,
            eligibility: self.eligibility,
            embedding,
        }
    }
}

/// An immutable unit of retrievable knowledge.
///
/// Created during ingestion, it lives for the process lifetime and is never
/// mutated afterwards; the whole collection is rebuilt wholesale on startup
/// or explicit refresh.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub source_file: String,
    pub category: ServiceCategory,
    pub eligibility: Vec<EligibilityTag>,
    pub embedding: Vec<f32>,
}

impl Chunk {
    /// Whether this chunk may be served to `profile`.
    ///
    /// Unconfirmed profiles bypass eligibility filtering entirely: during
    /// onboarding the user has not verified fund and tier yet, so the
    /// broader default set is served. An empty tag set applies to all.
    pub fn eligible_for(&self, profile: &UserProfile) -> bool {
        if !profile.confirmed || self.eligibility.is_empty() {
            return true;
        }
        self.eligibility.iter().any(|tag| tag.matches(profile))
    }
}
