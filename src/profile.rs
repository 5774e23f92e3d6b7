//! Typed user profiles and the transport-boundary conversion into them.
//!
//! The transport layer hands profiles around as loosely-typed JSON maps. At
//! the core boundary those are converted immediately into a [`UserProfile`]
//! with validated fields; the retrieval core never operates on untyped
//! key-value maps and never mutates a profile it was given.
//!
//! HMO and tier values parse from both Hebrew and English surface forms and
//! display as their Hebrew canonical labels, matching the source corpus.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::KbError;

/// The health funds covered by the knowledge base.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hmo {
    Maccabi,
    Meuhedet,
    Clalit,
}

impl Hmo {
    pub const ALL: [Hmo; 3] = [Hmo::Maccabi, Hmo::Meuhedet, Hmo::Clalit];

    /// Hebrew label as it appears in the corpus documents.
    pub fn label(&self) -> &'static str {
        match self {
            Hmo::Maccabi => "מכבי",
            Hmo::Meuhedet => "מאוחדת",
            Hmo::Clalit => "כללית",
        }
    }

    /// Parses a Hebrew or English surface form, case-insensitively.
    pub fn parse(input: &str) -> Result<Self, KbError> {
        match input.trim().to_lowercase().as_str() {
            "מכבי" | "maccabi" => Ok(Hmo::Maccabi),
            "מאוחדת" | "meuhedet" => Ok(Hmo::Meuhedet),
            "כללית" | "clalit" => Ok(Hmo::Clalit),
            other => Err(KbError::InvalidProfile(format!("unknown HMO '{other}'"))),
        }
    }
}

impl fmt::Display for Hmo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Membership tiers within a health fund.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MembershipTier {
    Gold,
    Silver,
    Bronze,
}

impl MembershipTier {
    pub const ALL: [MembershipTier; 3] = [
        MembershipTier::Gold,
        MembershipTier::Silver,
        MembershipTier::Bronze,
    ];

    /// Hebrew label as it appears in the corpus documents.
    pub fn label(&self) -> &'static str {
        match self {
            MembershipTier::Gold => "זהב",
            MembershipTier::Silver => "כסף",
            MembershipTier::Bronze => "ארד",
        }
    }

    /// Parses a Hebrew or English surface form, case-insensitively.
    pub fn parse(input: &str) -> Result<Self, KbError> {
        match input.trim().to_lowercase().as_str() {
            "זהב" | "gold" => Ok(MembershipTier::Gold),
            "כסף" | "silver" => Ok(MembershipTier::Silver),
            "ארד" | "bronze" => Ok(MembershipTier::Bronze),
            other => Err(KbError::InvalidProfile(format!("unknown tier '{other}'"))),
        }
    }
}

impl fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Answer language requested by the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "he")]
    Hebrew,
    #[serde(rename = "en")]
    English,
}

impl Language {
    pub fn parse(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "en" | "english" => Language::English,
            _ => Language::Hebrew,
        }
    }
}

/// A user's profile as the retrieval core consumes it.
///
/// `confirmed` marks a profile whose details the user has verified during
/// onboarding. Until then the retriever skips eligibility filtering entirely
/// and serves the broader default set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub hmo: Option<Hmo>,
    #[serde(default)]
    pub membership_tier: Option<MembershipTier>,
    #[serde(default)]
    pub confirmed: bool,
}

impl UserProfile {
    /// An unconfirmed, empty profile: the onboarding default.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Builds a confirmed profile for the given fund and tier.
    pub fn confirmed(hmo: Hmo, tier: MembershipTier) -> Self {
        Self {
            hmo: Some(hmo),
            membership_tier: Some(tier),
            confirmed: true,
            ..Self::default()
        }
    }

    /// Converts a loosely-typed transport payload into a typed profile.
    ///
    /// Accepts the wire shape the chat frontend sends: string fields for
    /// `hmo` and `membership_tier` in either Hebrew or English, an optional
    /// numeric `age`, and a boolean `confirmed`. Empty strings count as
    /// absent. Unknown HMO or tier values fail with
    /// [`KbError::InvalidProfile`] rather than being silently dropped.
    pub fn from_transport(value: &serde_json::Value) -> Result<Self, KbError> {
        let obj = value
            .as_object()
            .ok_or_else(|| KbError::InvalidProfile("profile payload is not an object".into()))?;

        let non_empty = |key: &str| -> Option<&str> {
            obj.get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };

        let hmo = non_empty("hmo").map(Hmo::parse).transpose()?;
        let membership_tier = non_empty("membership_tier")
            .map(MembershipTier::parse)
            .transpose()?;
        let age = obj
            .get("age")
            .and_then(|v| v.as_u64())
            .map(|a| {
                u8::try_from(a).map_err(|_| KbError::InvalidProfile(format!("age {a} out of range")))
            })
            .transpose()?;

        Ok(Self {
            first_name: non_empty("first_name").map(str::to_string),
            last_name: non_empty("last_name").map(str::to_string),
            age,
            hmo,
            membership_tier,
            confirmed: obj.get("confirmed").and_then(|v| v.as_bool()).unwrap_or(false),
        })
    }
}
