//! Flagged and approved search terms.

use serde::{Deserialize, Serialize};

/// Why a term should be excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagCategory {
    Irrelevant,
    Competitor,
}

impl FlagCategory {
    pub const ALL: [FlagCategory; 2] = [FlagCategory::Irrelevant, FlagCategory::Competitor];

    pub fn as_str(&self) -> &'static str {
        match self {
            FlagCategory::Irrelevant => "irrelevant",
            FlagCategory::Competitor => "competitor",
        }
    }
}

impl std::fmt::Display for FlagCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which pass produced a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagSource {
    /// Deterministic disqualifier match.
    AutoRule,
    /// External AI classifier.
    AiModel,
}

/// A search term marked for exclusion.
///
/// Built by the classifier and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlaggedTerm {
    pub search_term: String,
    /// The disqualifier that matched, or the anchor phrase chosen by the model.
    pub matched_keyword: String,
    pub reason: String,
    pub category: FlagCategory,
    pub source: FlagSource,
}

/// A flagged term selected for application. Same shape, no extra state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApprovedTerm(pub FlaggedTerm);

impl ApprovedTerm {
    pub fn term(&self) -> &FlaggedTerm {
        &self.0
    }

    pub fn category(&self) -> FlagCategory {
        self.0.category
    }
}

impl From<FlaggedTerm> for ApprovedTerm {
    fn from(term: FlaggedTerm) -> Self {
        ApprovedTerm(term)
    }
}

impl std::ops::Deref for ApprovedTerm {
    type Target = FlaggedTerm;

    fn deref(&self) -> &FlaggedTerm {
        &self.0
    }
}
