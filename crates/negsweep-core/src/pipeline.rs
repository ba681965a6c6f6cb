//! Account and batch orchestration.
//!
//! One account runs: resolve → collect terms → classify → approve →
//! reconcile → report. A batch runs accounts one after another in the order
//! given; a failure in one account never affects the next.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use negsweep_ai::AiClassifier;
use negsweep_platform::{AccountId, AdAccountService, DateRange};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, Instrument};
use uuid::Uuid;

use crate::accounts::{AccountDirectory, AccountRef};
use crate::approval::{self, ApprovalPolicy};
use crate::classifier::{DisqualifierTable, TermClassifier};
use crate::config::SweepConfig;
use crate::error::{SweepError, SweepResult};
use crate::obs;
use crate::reconciler::{ExclusionReconciler, Reconciliation};
use crate::report::{AccountReport, BatchReport, ReportAggregator};

/// Reads the raw search terms of an account.
pub struct TermSource {
    platform: Arc<dyn AdAccountService>,
}

impl TermSource {
    pub fn new(platform: Arc<dyn AdAccountService>) -> Self {
        Self { platform }
    }

    /// Union of matched search terms over every enabled search campaign,
    /// trimmed, de-duplicated, in first-seen order.
    pub async fn collect(&self, account: &AccountId, range: &DateRange) -> SweepResult<Vec<String>> {
        let campaigns = self.platform.list_enabled_search_campaigns(account).await?;
        let mut seen = HashSet::new();
        let mut terms = Vec::new();
        for campaign in &campaigns {
            let batch = self
                .platform
                .query_search_terms(account, &campaign.campaign_id, range)
                .await?;
            for term in batch {
                let term = term.trim();
                if !term.is_empty() && seen.insert(term.to_string()) {
                    terms.push(term.to_string());
                }
            }
        }
        debug!(
            account = %account,
            campaigns = campaigns.len(),
            terms = terms.len(),
            "search terms collected"
        );
        Ok(terms)
    }
}

/// The full sweep for one configuration.
pub struct SweepPipeline {
    config: SweepConfig,
    directory: AccountDirectory,
    source: TermSource,
    classifier: TermClassifier,
    reconciler: ExclusionReconciler,
}

impl SweepPipeline {
    /// Validate `config` and wire the stages around the two remote ports.
    pub fn new(
        config: SweepConfig,
        platform: Arc<dyn AdAccountService>,
        ai: Arc<dyn AiClassifier>,
    ) -> SweepResult<Self> {
        config.validate()?;
        let directory = config.directory()?;
        let classifier = TermClassifier::new(DisqualifierTable::new(&config.disqualifiers), ai);
        let reconciler = ExclusionReconciler::new(
            Arc::clone(&platform),
            config.lists.clone(),
            config.phrase_mode,
        );
        Ok(Self {
            source: TermSource::new(platform),
            config,
            directory,
            classifier,
            reconciler,
        })
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn directory(&self) -> &AccountDirectory {
        &self.directory
    }

    pub fn resolve_account(&self, key: &str) -> SweepResult<AccountRef> {
        self.directory.resolve(key)
    }

    /// The configured lookback window ending yesterday.
    pub fn default_range(&self, today: NaiveDate) -> DateRange {
        DateRange::last_days(self.config.lookback_days, today)
    }

    pub async fn collect_terms(&self, account: &AccountId, range: &DateRange) -> SweepResult<Vec<String>> {
        self.source.collect(account, range).await
    }

    /// Run one account end to end. Failures end up in the report.
    pub async fn run_account(
        &self,
        key: &str,
        range: &DateRange,
        policy: &mut ApprovalPolicy,
    ) -> AccountReport {
        let started = Instant::now();
        let account = match self.resolve_account(key) {
            Ok(account) => account,
            Err(err) => {
                obs::emit_account_finished(key, 0, 0, false);
                return AccountReport::failed(key, None, &err);
            }
        };

        obs::emit_account_started(&account.key, account.account_id.as_str());
        let report = self.process(&account, range, policy).await;
        obs::emit_account_finished(
            &account.key,
            started.elapsed().as_millis() as u64,
            report.applied.len(),
            report.is_success(),
        );
        report
    }

    async fn process(
        &self,
        account: &AccountRef,
        range: &DateRange,
        policy: &mut ApprovalPolicy,
    ) -> AccountReport {
        let terms = match self.collect_terms(&account.account_id, range).await {
            Ok(terms) => terms,
            Err(err) => return AccountReport::failed(&account.key, Some(account), &err),
        };

        if terms.is_empty() {
            info!(account = %account.key, range = %range, "no search term data");
            return ReportAggregator::aggregate(
                account,
                Vec::new(),
                Vec::new(),
                Reconciliation::default(),
                vec![format!("no search term data for {range}")],
            );
        }

        let classification = self
            .classifier
            .classify(&terms, account.business_context())
            .await;
        let approved = approval::approve(&classification.flagged, policy).await;
        let reconciliation = self
            .reconciler
            .reconcile(&account.account_id, &approved)
            .await;

        ReportAggregator::aggregate(
            account,
            classification.flagged,
            approved,
            reconciliation,
            classification.warnings,
        )
        .with_terms_reviewed(terms.len())
    }

    /// Run `keys` in order, one report per key.
    ///
    /// `cancel` is checked before each account and raced against the account
    /// in flight. A cancelled account is reported as failed, as is every
    /// account that never started.
    pub async fn run_batch(
        &self,
        keys: &[String],
        range: &DateRange,
        policy: &mut ApprovalPolicy,
        cancel: &CancellationToken,
    ) -> BatchReport {
        let run_id = Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id);

        let accounts = async {
            info!(accounts = keys.len(), range = %range, policy = policy.label(), "batch started");
            let mut reports = Vec::with_capacity(keys.len());
            for key in keys {
                if cancel.is_cancelled() {
                    let err = SweepError::Cancelled(format!("{key} was not started"));
                    reports.push(AccountReport::failed(key, self.resolve_account(key).ok().as_ref(), &err));
                    continue;
                }

                let report = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        let err = SweepError::Cancelled(format!("{key} was interrupted"));
                        AccountReport::failed(key, self.resolve_account(key).ok().as_ref(), &err)
                    }
                    report = self.run_account(key, range, policy) => report,
                };
                reports.push(report);
            }
            reports
        }
        .instrument(span)
        .await;

        let report = BatchReport::from_accounts(&run_id, *range, accounts);
        info!(
            run_id = %run_id,
            accounts = report.accounts.len(),
            failed = report.failed_count(),
            applied = report.applied_count(),
            "batch finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::AccountEntry;
    use negsweep_ai::fakes::ScriptedClassifier;
    use negsweep_platform::fakes::{FakeOp, MemoryAdAccountService};

    fn config() -> SweepConfig {
        SweepConfig {
            accounts: vec![AccountEntry {
                id: "1111111111".to_string(),
                name: "Example Dental".to_string(),
                aliases: vec!["ed".to_string()],
                context: "family dentist".to_string(),
            }],
            ..SweepConfig::default()
        }
    }

    fn range() -> DateRange {
        DateRange::last_days(30, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
    }

    #[tokio::test]
    async fn test_collect_terms_unions_campaigns_in_first_seen_order() {
        let platform = Arc::new(MemoryAdAccountService::new());
        let id = AccountId::new("1111111111");
        platform.add_campaign(&id, "1", &["b", " a ", "b"]);
        platform.add_campaign(&id, "2", &["a", "c", ""]);

        let pipeline = SweepPipeline::new(
            config(),
            platform.clone(),
            Arc::new(ScriptedClassifier::safe()),
        )
        .unwrap();
        let terms = pipeline.collect_terms(&id, &range()).await.unwrap();
        assert_eq!(terms, vec!["b", "a", "c"]);
        assert_eq!(platform.call_count(FakeOp::QueryTerms), 2);
    }

    #[tokio::test]
    async fn test_no_terms_yields_warning_and_no_ai_call() {
        let platform = Arc::new(MemoryAdAccountService::new());
        platform.add_account(&AccountId::new("1111111111"));
        let ai = Arc::new(ScriptedClassifier::safe());

        let pipeline = SweepPipeline::new(config(), platform.clone(), ai.clone()).unwrap();
        let report = pipeline
            .run_account("ed", &range(), &mut ApprovalPolicy::All)
            .await;

        assert!(report.is_success());
        assert!(report.warnings[0].starts_with("no search term data"));
        assert_eq!(ai.call_count(), 0);
        assert_eq!(platform.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_up_front() {
        let mut bad = config();
        bad.lookback_days = 0;
        let result = SweepPipeline::new(
            bad,
            Arc::new(MemoryAdAccountService::new()),
            Arc::new(ScriptedClassifier::safe()),
        );
        assert!(matches!(result, Err(SweepError::Configuration(_))));
    }
}
