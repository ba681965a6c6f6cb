//! Ad platform trait definitions for negsweep
//!
//! `AdAccountService` is the only way the pipeline talks to an ad platform:
//! - campaign and search term reads (the term source)
//! - shared negative keyword list lookup and creation
//! - criteria reads and batch criteria creation
//!
//! The trait is async and backend-agnostic. An in-memory fake lives in the
//! `fakes` module; the Google Ads REST backend lives in `google_ads`.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

/// Result type for platform operations
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Customer (account) identifier, digits only, no dashes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    /// Build an id from user input, stripping the dashes of the
    /// `123-456-7890` display form.
    pub fn new(raw: impl AsRef<str>) -> Self {
        AccountId(raw.as_ref().trim().replace('-', ""))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote identifier of a shared set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SharedListId(pub String);

impl std::fmt::Display for SharedListId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

/// An enabled search campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub campaign_id: String,
    pub name: String,
}

/// Kind of shared set. Only negative keyword lists are managed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SharedListType {
    NegativeKeywords,
}

impl SharedListType {
    /// Enum name as the platform spells it.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            SharedListType::NegativeKeywords => "NEGATIVE_KEYWORDS",
        }
    }
}

/// Keyword match type for a criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    Phrase,
}

impl MatchType {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            MatchType::Phrase => "PHRASE",
        }
    }
}

/// A criterion to be created in a shared list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionDraft {
    pub text: String,
    pub match_type: MatchType,
}

impl CriterionDraft {
    pub fn phrase(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            match_type: MatchType::Phrase,
        }
    }
}

/// Inclusive calendar date range for search term reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> PlatformResult<Self> {
        if start > end {
            return Err(PlatformError::Config(format!(
                "date range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// The `days` full days before `today`, ending yesterday.
    ///
    /// Today's report data is incomplete, so it is never included.
    pub fn last_days(days: u32, today: NaiveDate) -> Self {
        let days = i64::from(days.max(1));
        let end = today - Duration::days(1);
        let start = end - Duration::days(days - 1);
        Self { start, end }
    }

    /// Number of calendar days covered.
    pub fn len_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

// ---------------------------------------------------------------------------
// AdAccountService
// ---------------------------------------------------------------------------

/// Access to one ad platform on behalf of many accounts.
///
/// Guarantees expected from implementations:
/// - Reads have no side effects.
/// - `create_criteria` is all-or-nothing from the caller's perspective.
/// - Nothing is retried internally; each failure is returned once.
#[async_trait]
pub trait AdAccountService: Send + Sync {
    /// Enabled campaigns on the search network.
    async fn list_enabled_search_campaigns(
        &self,
        account: &AccountId,
    ) -> PlatformResult<Vec<CampaignSummary>>;

    /// Raw search terms matched by one campaign in the date range.
    async fn query_search_terms(
        &self,
        account: &AccountId,
        campaign_id: &str,
        range: &DateRange,
    ) -> PlatformResult<Vec<String>>;

    /// Look up a shared list by exact name and type.
    async fn find_shared_list(
        &self,
        account: &AccountId,
        name: &str,
        list_type: SharedListType,
    ) -> PlatformResult<Option<SharedListId>>;

    /// Create a shared list and return its id.
    async fn create_shared_list(
        &self,
        account: &AccountId,
        name: &str,
        list_type: SharedListType,
    ) -> PlatformResult<SharedListId>;

    /// Keyword text of every criterion currently in the list.
    async fn list_criteria_text(
        &self,
        account: &AccountId,
        list: &SharedListId,
    ) -> PlatformResult<Vec<String>>;

    /// Create all `criteria` in `list` in a single mutation.
    async fn create_criteria(
        &self,
        account: &AccountId,
        list: &SharedListId,
        criteria: &[CriterionDraft],
    ) -> PlatformResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_account_id_strips_dashes() {
        assert_eq!(AccountId::new(" 561-623-0554 ").as_str(), "5616230554");
    }

    #[test]
    fn test_last_days_ends_yesterday() {
        let range = DateRange::last_days(30, date(2024, 3, 31));
        assert_eq!(range.end, date(2024, 3, 30));
        assert_eq!(range.start, date(2024, 3, 1));
        assert_eq!(range.len_days(), 30);
    }

    #[test]
    fn test_last_days_zero_is_one_day() {
        let range = DateRange::last_days(0, date(2024, 1, 2));
        assert_eq!(range.start, range.end);
    }

    #[test]
    fn test_new_rejects_inverted_range() {
        assert!(DateRange::new(date(2024, 2, 1), date(2024, 1, 1)).is_err());
        assert!(DateRange::new(date(2024, 1, 1), date(2024, 1, 1)).is_ok());
    }

    #[test]
    fn test_api_enum_spelling() {
        assert_eq!(SharedListType::NegativeKeywords.as_api_str(), "NEGATIVE_KEYWORDS");
        assert_eq!(MatchType::Phrase.as_api_str(), "PHRASE");
        assert_eq!(
            serde_json::to_string(&MatchType::Phrase).unwrap(),
            "\"PHRASE\""
        );
    }
}
