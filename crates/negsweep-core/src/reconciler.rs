//! Negative keyword list reconciliation.
//!
//! For each category present in the approved set:
//!
//! 1. resolve the destination list by name, creating it if allowed;
//! 2. derive one phrase per approved term ([`PhraseMode`]);
//! 3. drop phrases already in the list (trim + lower-case comparison);
//! 4. submit whatever is left in one `create_criteria` call.
//!
//! Categories are independent: a failure in one never rolls back or blocks
//! the other. Re-running with the same input submits nothing new.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use negsweep_platform::{AccountId, AdAccountService, CriterionDraft, SharedListId, SharedListType};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ListConfig, PhraseMode};
use crate::error::SweepError;
use crate::obs;
use crate::term::{ApprovedTerm, FlagCategory};

/// Comparison key for criterion text.
pub fn dedup_key(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Step at which a category failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStage {
    ResolveList,
    CreateList,
    ReadCriteria,
    CreateCriteria,
}

impl ReconcileStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileStage::ResolveList => "resolve_list",
            ReconcileStage::CreateList => "create_list",
            ReconcileStage::ReadCriteria => "read_criteria",
            ReconcileStage::CreateCriteria => "create_criteria",
        }
    }
}

/// Result of reconciling one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CategoryOutcome {
    Synced {
        list_id: SharedListId,
        applied_count: usize,
        skipped_existing_count: usize,
        created_list: bool,
        /// Phrases submitted in this run.
        phrases: Vec<String>,
    },
    /// The list does not exist and may not be created.
    MissingDestination { list_name: String },
    Failed { stage: ReconcileStage, error: String },
}

impl CategoryOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, CategoryOutcome::Synced { .. })
    }

    pub fn applied_count(&self) -> usize {
        match self {
            CategoryOutcome::Synced { applied_count, .. } => *applied_count,
            _ => 0,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            CategoryOutcome::Synced { .. } => "synced",
            CategoryOutcome::MissingDestination { .. } => "missing_destination",
            CategoryOutcome::Failed { .. } => "failed",
        }
    }

    /// The error this outcome stands for, if any.
    pub fn to_error(&self, category: FlagCategory) -> Option<SweepError> {
        match self {
            CategoryOutcome::Synced { .. } => None,
            CategoryOutcome::MissingDestination { list_name } => {
                Some(SweepError::MissingDestinationList {
                    category,
                    list_name: list_name.clone(),
                })
            }
            CategoryOutcome::Failed { stage, error } => Some(SweepError::Reconciliation {
                category,
                detail: format!("{}: {error}", stage.as_str()),
            }),
        }
    }
}

/// Outcomes keyed by category. Categories with no approved terms are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reconciliation {
    pub outcomes: BTreeMap<FlagCategory, CategoryOutcome>,
}

impl Reconciliation {
    pub fn get(&self, category: FlagCategory) -> Option<&CategoryOutcome> {
        self.outcomes.get(&category)
    }

    pub fn is_synced(&self, category: FlagCategory) -> bool {
        self.get(category).is_some_and(CategoryOutcome::is_synced)
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Phrases submitted across all categories.
    pub fn submitted_count(&self) -> usize {
        self.outcomes.values().map(CategoryOutcome::applied_count).sum()
    }

    pub fn failures(&self) -> Vec<SweepError> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, CategoryOutcome::Failed { .. }))
            .filter_map(|(c, o)| o.to_error(*c))
            .collect()
    }

    pub fn missing_destinations(&self) -> Vec<SweepError> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, CategoryOutcome::MissingDestination { .. }))
            .filter_map(|(c, o)| o.to_error(*c))
            .collect()
    }
}

/// Phrase text for each approved term, first spelling per dedup key.
pub fn candidate_phrases(terms: &[&ApprovedTerm], mode: PhraseMode) -> Vec<String> {
    let mut seen = HashSet::new();
    terms
        .iter()
        .map(|t| match mode {
            PhraseMode::MatchedKeyword => t.matched_keyword.trim(),
            PhraseMode::FullTerm => t.search_term.trim(),
        })
        .filter(|p| !p.is_empty() && seen.insert(dedup_key(p)))
        .map(str::to_string)
        .collect()
}

/// Writes approved terms into per-category shared lists.
pub struct ExclusionReconciler {
    platform: Arc<dyn AdAccountService>,
    lists: ListConfig,
    phrase_mode: PhraseMode,
}

impl ExclusionReconciler {
    pub fn new(platform: Arc<dyn AdAccountService>, lists: ListConfig, phrase_mode: PhraseMode) -> Self {
        Self {
            platform,
            lists,
            phrase_mode,
        }
    }

    /// Reconcile `approved` into `account`'s lists.
    ///
    /// An empty slice makes no remote call at all.
    pub async fn reconcile(&self, account: &AccountId, approved: &[ApprovedTerm]) -> Reconciliation {
        let mut outcomes = BTreeMap::new();
        for category in FlagCategory::ALL {
            let terms: Vec<&ApprovedTerm> =
                approved.iter().filter(|a| a.category() == category).collect();
            if terms.is_empty() {
                continue;
            }
            let outcome = self.reconcile_category(account, category, &terms).await;
            obs::emit_category_reconciled(
                category.as_str(),
                self.lists.name(category),
                outcome.label(),
                outcome.applied_count(),
            );
            outcomes.insert(category, outcome);
        }
        Reconciliation { outcomes }
    }

    async fn reconcile_category(
        &self,
        account: &AccountId,
        category: FlagCategory,
        terms: &[&ApprovedTerm],
    ) -> CategoryOutcome {
        let list_name = self.lists.name(category);
        let list_type = SharedListType::NegativeKeywords;

        let (list_id, created_list) =
            match self.platform.find_shared_list(account, list_name, list_type).await {
                Ok(Some(id)) => (id, false),
                Ok(None) if !self.lists.auto_create(category) => {
                    return CategoryOutcome::MissingDestination {
                        list_name: list_name.to_string(),
                    };
                }
                Ok(None) => {
                    match self
                        .platform
                        .create_shared_list(account, list_name, list_type)
                        .await
                    {
                        Ok(id) => (id, true),
                        Err(e) => return failed(ReconcileStage::CreateList, e),
                    }
                }
                Err(e) => return failed(ReconcileStage::ResolveList, e),
            };

        let candidates = candidate_phrases(terms, self.phrase_mode);

        // A list created a moment ago has no criteria to read.
        let existing: HashSet<String> = if created_list {
            HashSet::new()
        } else {
            match self.platform.list_criteria_text(account, &list_id).await {
                Ok(texts) => texts.iter().map(|t| dedup_key(t)).collect(),
                Err(e) => return failed(ReconcileStage::ReadCriteria, e),
            }
        };

        let (skipped, fresh): (Vec<String>, Vec<String>) = candidates
            .into_iter()
            .partition(|p| existing.contains(&dedup_key(p)));

        debug!(
            category = %category,
            list = %list_name,
            fresh = fresh.len(),
            skipped = skipped.len(),
            "criteria diff computed"
        );

        if !fresh.is_empty() {
            let drafts: Vec<CriterionDraft> = fresh.iter().map(CriterionDraft::phrase).collect();
            if let Err(e) = self.platform.create_criteria(account, &list_id, &drafts).await {
                return failed(ReconcileStage::CreateCriteria, e);
            }
        }

        CategoryOutcome::Synced {
            list_id,
            applied_count: fresh.len(),
            skipped_existing_count: skipped.len(),
            created_list,
            phrases: fresh,
        }
    }
}

fn failed(stage: ReconcileStage, error: impl std::fmt::Display) -> CategoryOutcome {
    CategoryOutcome::Failed {
        stage,
        error: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::{FlagSource, FlaggedTerm};

    fn approved(term: &str, keyword: &str, category: FlagCategory) -> ApprovedTerm {
        ApprovedTerm(FlaggedTerm {
            search_term: term.to_string(),
            matched_keyword: keyword.to_string(),
            reason: "test".to_string(),
            category,
            source: FlagSource::AutoRule,
        })
    }

    #[test]
    fn test_dedup_key() {
        assert_eq!(dedup_key("  Free Widgets "), "free widgets");
    }

    #[test]
    fn test_candidate_phrases_modes() {
        let a = approved("cheap flights", "cheap", FlagCategory::Irrelevant);
        let b = approved("Cheap hotels", "Cheap", FlagCategory::Irrelevant);
        let c = approved("free stuff", " ", FlagCategory::Irrelevant);
        let terms = vec![&a, &b, &c];

        assert_eq!(candidate_phrases(&terms, PhraseMode::MatchedKeyword), vec!["cheap"]);
        assert_eq!(
            candidate_phrases(&terms, PhraseMode::FullTerm),
            vec!["cheap flights", "Cheap hotels", "free stuff"]
        );
    }

    #[test]
    fn test_outcome_errors() {
        let missing = CategoryOutcome::MissingDestination {
            list_name: "Competitor Terms".to_string(),
        };
        assert!(matches!(
            missing.to_error(FlagCategory::Competitor),
            Some(SweepError::MissingDestinationList { .. })
        ));

        let failed = failed(ReconcileStage::CreateCriteria, "quota");
        let err = failed.to_error(FlagCategory::Irrelevant).unwrap();
        assert!(err.to_string().contains("create_criteria: quota"));
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = CategoryOutcome::MissingDestination {
            list_name: "X".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "missing_destination");
        assert_eq!(json["list_name"], "X");
    }
}
