//! Per-account and per-batch reports.
//!
//! An [`AccountReport`] is built once when its account finishes. A
//! [`BatchReport`] holds one entry per requested account, in request order,
//! whether the account succeeded or not.

use chrono::{DateTime, Utc};
use negsweep_platform::{AccountId, DateRange};
use serde::{Deserialize, Serialize};

use crate::accounts::AccountRef;
use crate::error::SweepError;
use crate::reconciler::Reconciliation;
use crate::term::{ApprovedTerm, FlaggedTerm};

/// Outcome of one account in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountReport {
    /// Key the caller asked for.
    pub account: String,
    /// Configured name, when the key resolved.
    pub account_name: Option<String>,
    pub account_id: Option<AccountId>,
    /// Distinct search terms fetched for the window.
    pub terms_reviewed: usize,
    pub flagged: Vec<FlaggedTerm>,
    pub approved: Vec<ApprovedTerm>,
    /// Approved terms whose category list is in sync.
    pub applied: Vec<ApprovedTerm>,
    pub reconciliation: Reconciliation,
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

impl AccountReport {
    /// Report for an account that could not be processed at all.
    pub fn failed(key: &str, resolved: Option<&AccountRef>, error: &SweepError) -> Self {
        Self {
            account: key.to_string(),
            account_name: resolved.map(|a| a.name.clone()),
            account_id: resolved.map(|a| a.account_id.clone()),
            terms_reviewed: 0,
            flagged: Vec::new(),
            approved: Vec::new(),
            applied: Vec::new(),
            reconciliation: Reconciliation::default(),
            warnings: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn with_terms_reviewed(mut self, count: usize) -> Self {
        self.terms_reviewed = count;
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Builds account reports from pipeline stage outputs.
pub struct ReportAggregator;

impl ReportAggregator {
    /// Combine stage outputs for one account.
    ///
    /// `applied` keeps the approved terms of categories that synced. Missing
    /// destination lists become warnings; failed categories are summarized in
    /// `error` while the other category keeps its result.
    pub fn aggregate(
        account: &AccountRef,
        flagged: Vec<FlaggedTerm>,
        approved: Vec<ApprovedTerm>,
        reconciliation: Reconciliation,
        mut warnings: Vec<String>,
    ) -> AccountReport {
        let applied = approved
            .iter()
            .filter(|a| reconciliation.is_synced(a.category()))
            .cloned()
            .collect();

        warnings.extend(
            reconciliation
                .missing_destinations()
                .iter()
                .map(ToString::to_string),
        );

        let failures = reconciliation.failures();
        let error = if failures.is_empty() {
            None
        } else {
            Some(
                failures
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        };

        AccountReport {
            account: account.key.clone(),
            account_name: Some(account.name.clone()),
            account_id: Some(account.account_id.clone()),
            terms_reviewed: 0,
            flagged,
            approved,
            applied,
            reconciliation,
            warnings,
            error,
        }
    }
}

/// Every account of one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: String,
    pub date_range: DateRange,
    pub generated_at: DateTime<Utc>,
    pub accounts: Vec<AccountReport>,
}

impl BatchReport {
    /// Keeps `accounts` in the order given.
    pub fn from_accounts(run_id: &str, date_range: DateRange, accounts: Vec<AccountReport>) -> Self {
        Self {
            run_id: run_id.to_string(),
            date_range,
            generated_at: Utc::now(),
            accounts,
        }
    }

    pub fn failed_count(&self) -> usize {
        self.accounts.iter().filter(|a| !a.is_success()).count()
    }

    pub fn succeeded_count(&self) -> usize {
        self.accounts.len() - self.failed_count()
    }

    pub fn flagged_count(&self) -> usize {
        self.accounts.iter().map(|a| a.flagged.len()).sum()
    }

    pub fn applied_count(&self) -> usize {
        self.accounts.iter().map(|a| a.applied.len()).sum()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::{CategoryOutcome, ReconcileStage};
    use crate::term::{FlagCategory, FlagSource};
    use negsweep_platform::SharedListId;
    use std::collections::BTreeMap;

    fn account() -> AccountRef {
        AccountRef {
            key: "ed".to_string(),
            account_id: AccountId::new("1234567890"),
            name: "Example Dental".to_string(),
            context: String::new(),
        }
    }

    fn flag(term: &str, category: FlagCategory) -> FlaggedTerm {
        FlaggedTerm {
            search_term: term.to_string(),
            matched_keyword: term.to_string(),
            reason: "test".to_string(),
            category,
            source: FlagSource::AiModel,
        }
    }

    fn synced() -> CategoryOutcome {
        CategoryOutcome::Synced {
            list_id: SharedListId("1001".to_string()),
            applied_count: 1,
            skipped_existing_count: 0,
            created_list: false,
            phrases: vec!["junk".to_string()],
        }
    }

    #[test]
    fn test_applied_only_counts_synced_categories() {
        let flagged = vec![flag("junk", FlagCategory::Irrelevant), flag("acme", FlagCategory::Competitor)];
        let approved: Vec<ApprovedTerm> = flagged.iter().cloned().map(ApprovedTerm::from).collect();
        let reconciliation = Reconciliation {
            outcomes: BTreeMap::from([
                (FlagCategory::Irrelevant, synced()),
                (
                    FlagCategory::Competitor,
                    CategoryOutcome::MissingDestination {
                        list_name: "Competitor Terms".to_string(),
                    },
                ),
            ]),
        };

        let report = ReportAggregator::aggregate(&account(), flagged, approved, reconciliation, vec![]);
        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.applied[0].search_term, "junk");
        assert_eq!(report.approved.len(), 2);
        assert!(report.is_success());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("Competitor Terms"));
    }

    #[test]
    fn test_failed_category_sets_error_and_keeps_sibling() {
        let flagged = vec![flag("junk", FlagCategory::Irrelevant), flag("acme", FlagCategory::Competitor)];
        let approved: Vec<ApprovedTerm> = flagged.iter().cloned().map(ApprovedTerm::from).collect();
        let reconciliation = Reconciliation {
            outcomes: BTreeMap::from([
                (FlagCategory::Irrelevant, synced()),
                (
                    FlagCategory::Competitor,
                    CategoryOutcome::Failed {
                        stage: ReconcileStage::CreateCriteria,
                        error: "quota".to_string(),
                    },
                ),
            ]),
        };

        let report = ReportAggregator::aggregate(
            &account(),
            flagged,
            approved,
            reconciliation,
            vec!["ai down".to_string()],
        );
        assert_eq!(report.applied.len(), 1);
        assert!(report.error.as_deref().unwrap().contains("competitor"));
        assert_eq!(report.warnings, vec!["ai down".to_string()]);
    }

    #[test]
    fn test_batch_counters() {
        let range = DateRange::last_days(30, chrono::NaiveDate::from_ymd_opt(2024, 5, 31).unwrap());
        let ok = ReportAggregator::aggregate(&account(), vec![], vec![], Reconciliation::default(), vec![]);
        let bad = AccountReport::failed("godley", None, &SweepError::AccountNotFound("godley".into()));
        let batch = BatchReport::from_accounts("run-1", range, vec![ok, bad]);

        assert_eq!(batch.failed_count(), 1);
        assert_eq!(batch.succeeded_count(), 1);
        assert!(!batch.all_succeeded());
        assert_eq!(batch.accounts[1].account, "godley");
        assert!(batch.accounts[1].account_id.is_none());
    }
}
