//! Operation payload and result types.
//!
//! These are the structures exchanged between the tool façade and the graph
//! manager for observation mutations and search.

use serde::{Deserialize, Serialize};

use super::Entity;

/// Observations to add to one existing entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationInput {
    /// Name of the target entity; must already exist.
    pub entity_name: String,
    /// Candidate observation strings.
    #[serde(default)]
    pub contents: Vec<String>,
}

/// Observations to remove from one entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationDeletion {
    /// Name of the target entity; silently skipped when absent.
    pub entity_name: String,
    /// Observation strings to remove.
    #[serde(default)]
    pub observations: Vec<String>,
}

/// Per-entity outcome of an `add_observations` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationResult {
    /// Name of the entity the observations were added to.
    pub entity_name: String,
    /// Exactly the observations that were newly appended.
    pub added_observations: Vec<String>,
}

/// How a search query matched an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Case-insensitive equality on name or type.
    Exact,
    /// Case-insensitive substring on name, type, or an observation.
    Partial,
    /// Similarity match from the fuzzy layer.
    Fuzzy,
}

impl MatchKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Partial => "partial",
            Self::Fuzzy => "fuzzy",
        }
    }
}

/// A single scored search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    /// The matched entity.
    pub entity: Entity,
    /// Relevance score in `[0, 1]`.
    pub score: f64,
    /// Which strategy produced the hit.
    pub match_type: MatchKind,
}
