//! Structured observability hooks for sweep lifecycle events.
//!
//! This module provides:
//! - A run-scoped tracing span via [`run_span`]
//! - Emission functions for account, classification and reconciliation events
//!
//! Events are emitted at `info!` level, degradations at `warn!`. Filtering is
//! configured through `NEGSWEEP_LOG` (see [`crate::telemetry`]).

use tracing::{info, warn};

/// Run-scoped span tagged with the run_id.
///
/// Attach it to the batch future with `Instrument::instrument` so every event
/// emitted while the run is in flight carries the id:
///
/// ```ignore
/// async { /* ... */ }.instrument(run_span("9b1c...")).await;
/// ```
pub fn run_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("negsweep.run", run_id = %run_id)
}

/// Emit event: processing of one account started.
pub fn emit_account_started(account: &str, account_id: &str) {
    info!(event = "account.started", account = %account, account_id = %account_id);
}

/// Emit event: a term list was classified.
pub fn emit_terms_classified(total: usize, auto_rule: usize, ai_model: usize) {
    info!(
        event = "terms.classified",
        total = total,
        auto_rule = auto_rule,
        ai_model = ai_model,
    );
}

/// Emit event: the AI classifier failed and the run continues without it.
pub fn emit_classifier_degraded(batch_size: usize, error: &dyn std::fmt::Display) {
    warn!(event = "classifier.degraded", batch_size = batch_size, error = %error);
}

/// Emit event: one category of one account was reconciled.
pub fn emit_category_reconciled(category: &str, list_name: &str, outcome: &str, applied: usize) {
    info!(
        event = "category.reconciled",
        category = %category,
        list = %list_name,
        outcome = %outcome,
        applied = applied,
    );
}

/// Emit event: an account finished, successfully or not.
pub fn emit_account_finished(account: &str, duration_ms: u64, applied: usize, success: bool) {
    info!(
        event = "account.finished",
        account = %account,
        duration_ms = duration_ms,
        applied = applied,
        success = success,
    );
}
