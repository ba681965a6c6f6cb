//! Search term classification.
//!
//! Two passes over a de-duplicated term list:
//! 1. the ordered disqualifier table (substring match, first keyword wins);
//! 2. one batch call to the AI classifier with every term pass 1 left alone.
//!
//! A term lands in at most one flag. AI failures degrade the run to
//! disqualifier flags plus a warning; they are never fatal.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use negsweep_ai::{AiClassifier, VerdictKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SweepError;
use crate::obs;
use crate::term::{FlagCategory, FlagSource, FlaggedTerm};

/// Ordered, normalized disqualifier keywords.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DisqualifierTable {
    keywords: Vec<String>,
}

impl DisqualifierTable {
    /// Lower-cases and trims every keyword, dropping empties and repeats.
    /// Order is kept: it decides which keyword wins when several match.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty() && seen.insert(k.clone()))
            .collect();
        Self { keywords }
    }

    /// First keyword contained in `term`, compared case-insensitively.
    pub fn first_match(&self, term: &str) -> Option<&str> {
        let lowered = term.to_lowercase();
        self.keywords
            .iter()
            .find(|k| lowered.contains(k.as_str()))
            .map(String::as_str)
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

/// Output of one classification run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Disqualifier flags in input order, then AI flags in response order.
    pub flagged: Vec<FlaggedTerm>,
    /// The batch handed to the AI classifier (empty when it was skipped).
    pub submitted_to_ai: Vec<String>,
    /// Degradation notices for the account report.
    pub warnings: Vec<String>,
}

impl Classification {
    pub fn auto_rule_count(&self) -> usize {
        self.flagged
            .iter()
            .filter(|f| f.source == FlagSource::AutoRule)
            .count()
    }

    pub fn ai_count(&self) -> usize {
        self.flagged
            .iter()
            .filter(|f| f.source == FlagSource::AiModel)
            .count()
    }
}

/// Disqualifier matching plus AI delegation.
pub struct TermClassifier {
    table: DisqualifierTable,
    ai: Arc<dyn AiClassifier>,
}

impl TermClassifier {
    pub fn new(table: DisqualifierTable, ai: Arc<dyn AiClassifier>) -> Self {
        Self { table, ai }
    }

    pub fn table(&self) -> &DisqualifierTable {
        &self.table
    }

    /// Classify `terms` for a business described by `context`.
    ///
    /// Repeated input terms are collapsed to their first occurrence. The AI
    /// classifier is not called when nothing is left after pass 1.
    pub async fn classify(&self, terms: &[String], context: &str) -> Classification {
        let mut seen = HashSet::new();
        let mut flagged = Vec::new();
        let mut remaining = Vec::new();

        for term in terms {
            if term.trim().is_empty() || !seen.insert(term.as_str()) {
                continue;
            }
            match self.table.first_match(term) {
                Some(keyword) => flagged.push(FlaggedTerm {
                    search_term: term.clone(),
                    matched_keyword: matched_text(term, keyword),
                    reason: format!("matched disqualifier '{keyword}'"),
                    category: FlagCategory::Irrelevant,
                    source: FlagSource::AutoRule,
                }),
                None => remaining.push(term.clone()),
            }
        }

        let mut classification = Classification {
            flagged,
            submitted_to_ai: Vec::new(),
            warnings: Vec::new(),
        };

        if remaining.is_empty() {
            debug!("no terms left for AI review");
            obs::emit_terms_classified(terms.len(), classification.auto_rule_count(), 0);
            return classification;
        }

        match self.ai.classify(&remaining, context).await {
            Ok(verdicts) => {
                // Exact text wins; the lower-cased key only catches casing drift
                // in the reply. Each submitted term is taken at most once.
                let mut exact: HashMap<&str, usize> = HashMap::new();
                let mut folded: HashMap<String, Vec<usize>> = HashMap::new();
                for (i, term) in remaining.iter().enumerate() {
                    exact.entry(term.trim()).or_insert(i);
                    folded.entry(term.trim().to_lowercase()).or_default().push(i);
                }
                let mut taken = vec![false; remaining.len()];
                let mut discarded = 0usize;

                for verdict in verdicts {
                    let text = verdict.term.trim();
                    let slot = exact
                        .get(text)
                        .copied()
                        .filter(|&i| !taken[i])
                        .or_else(|| {
                            folded
                                .get(&text.to_lowercase())?
                                .iter()
                                .copied()
                                .find(|&i| !taken[i])
                        });
                    let Some(index) = slot else {
                        discarded += 1;
                        continue;
                    };
                    taken[index] = true;
                    let submitted = remaining[index].as_str();
                    classification.flagged.push(FlaggedTerm {
                        search_term: submitted.to_string(),
                        matched_keyword: anchor_keyword(submitted, verdict.keyword.as_deref()),
                        reason: verdict.reason,
                        category: match verdict.kind {
                            VerdictKind::Irrelevant => FlagCategory::Irrelevant,
                            VerdictKind::Competitor => FlagCategory::Competitor,
                        },
                        source: FlagSource::AiModel,
                    });
                }

                if discarded > 0 {
                    warn!(
                        discarded,
                        "dropped AI verdicts for terms that were not submitted or were repeated"
                    );
                }
            }
            Err(err) => {
                obs::emit_classifier_degraded(remaining.len(), &err);
                classification
                    .warnings
                    .push(SweepError::ClassifierUnavailable(err).to_string());
            }
        }

        classification.submitted_to_ai = remaining;
        obs::emit_terms_classified(
            terms.len(),
            classification.auto_rule_count(),
            classification.ai_count(),
        );
        classification
    }
}

/// The part of `term` that `keyword` matched, in the term's own casing.
///
/// Falls back to the table keyword when lower-casing shifts byte offsets.
fn matched_text(term: &str, keyword: &str) -> String {
    let lowered = term.to_lowercase();
    if lowered.len() == term.len() {
        if let Some(text) = lowered
            .find(keyword)
            .and_then(|start| term.get(start..start + keyword.len()))
            .filter(|text| text.to_lowercase() == keyword)
        {
            return text.to_string();
        }
    }
    keyword.to_string()
}

/// The model's anchor phrase if it really occurs in the term, else the term.
fn anchor_keyword(term: &str, keyword: Option<&str>) -> String {
    match keyword.map(str::trim) {
        Some(k) if !k.is_empty() && term.to_lowercase().contains(&k.to_lowercase()) => {
            k.to_string()
        }
        _ => term.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use negsweep_ai::fakes::ScriptedClassifier;
    use negsweep_ai::{AiVerdict, ClassifierError};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn classifier(table: &[&str], ai: Arc<ScriptedClassifier>) -> TermClassifier {
        TermClassifier::new(DisqualifierTable::new(table), ai)
    }

    #[test]
    fn test_table_normalizes_and_keeps_order() {
        let table = DisqualifierTable::new(["  Cheap ", "free", "", "CHEAP", "how to"]);
        assert_eq!(table.keywords(), &["cheap", "free", "how to"]);
    }

    #[test]
    fn test_first_match_is_substring_and_table_ordered() {
        let table = DisqualifierTable::new(["free", "cheap"]);
        assert_eq!(table.first_match("Cheap FREE widgets"), Some("free"));
        assert_eq!(table.first_match("freedom widgets"), Some("free"));
        assert_eq!(table.first_match("best widget"), None);
    }

    #[tokio::test]
    async fn test_disqualifier_example() {
        let ai = Arc::new(ScriptedClassifier::safe());
        let c = classifier(&["cheap", "free"], Arc::clone(&ai));
        let result = c
            .classify(&strings(&["cheap flights", "best widget", "free widget"]), "ctx")
            .await;

        assert_eq!(result.flagged.len(), 2);
        assert_eq!(result.flagged[0].search_term, "cheap flights");
        assert_eq!(result.flagged[0].matched_keyword, "cheap");
        assert_eq!(result.flagged[1].search_term, "free widget");
        assert_eq!(result.flagged[1].matched_keyword, "free");
        assert_eq!(result.submitted_to_ai, strings(&["best widget"]));
        assert_eq!(ai.calls()[0].0, strings(&["best widget"]));
    }

    #[tokio::test]
    async fn test_ai_flags_follow_auto_flags() {
        let ai = Arc::new(ScriptedClassifier::returning(vec![
            AiVerdict::new("acme widget", VerdictKind::Competitor, "rival").with_keyword("acme"),
            AiVerdict::new("widget memes", VerdictKind::Irrelevant, "humor"),
        ]));
        let c = classifier(&["jobs"], ai);
        let result = c
            .classify(
                &strings(&["widget memes", "widget jobs", "acme widget"]),
                "ctx",
            )
            .await;

        let order: Vec<_> = result.flagged.iter().map(|f| f.search_term.as_str()).collect();
        assert_eq!(order, vec!["widget jobs", "acme widget", "widget memes"]);
        assert_eq!(result.flagged[1].category, FlagCategory::Competitor);
        assert_eq!(result.flagged[1].matched_keyword, "acme");
        assert_eq!(result.flagged[2].matched_keyword, "widget memes");
    }

    #[tokio::test]
    async fn test_unsubmitted_and_repeated_verdicts_are_discarded() {
        let ai = Arc::new(ScriptedClassifier::returning(vec![
            AiVerdict::new("cheap widget", VerdictKind::Competitor, "already auto"),
            AiVerdict::new("invented term", VerdictKind::Irrelevant, "hallucinated"),
            AiVerdict::new("Best Widget", VerdictKind::Irrelevant, "first"),
            AiVerdict::new("best widget", VerdictKind::Competitor, "second"),
        ]));
        let c = classifier(&["cheap"], ai);
        let result = c
            .classify(&strings(&["cheap widget", "best widget"]), "ctx")
            .await;

        assert_eq!(result.flagged.len(), 2);
        assert_eq!(result.flagged[0].source, FlagSource::AutoRule);
        assert_eq!(result.flagged[1].search_term, "best widget");
        assert_eq!(result.flagged[1].reason, "first");
    }

    #[tokio::test]
    async fn test_no_ai_call_when_everything_matched() {
        let ai = Arc::new(ScriptedClassifier::safe());
        let c = classifier(&["widget"], Arc::clone(&ai));
        let result = c.classify(&strings(&["widget a", "widget b"]), "ctx").await;
        assert_eq!(result.flagged.len(), 2);
        assert_eq!(ai.call_count(), 0);

        let empty = c.classify(&[], "ctx").await;
        assert!(empty.flagged.is_empty());
        assert_eq!(ai.call_count(), 0);
    }

    #[tokio::test]
    async fn test_ai_failure_degrades_with_warning() {
        let ai = Arc::new(ScriptedClassifier::failing(ClassifierError::Network(
            "connection reset".into(),
        )));
        let c = classifier(&["free"], ai);
        let result = c
            .classify(&strings(&["free widget", "best widget"]), "ctx")
            .await;
        assert_eq!(result.flagged.len(), 1);
        assert_eq!(
            result.warnings,
            vec![SweepError::ClassifierUnavailable(ClassifierError::Network(
                "connection reset".into()
            ))
            .to_string()]
        );
        assert!(result.warnings[0].starts_with("AI classifier unavailable"));
        assert!(result.warnings[0].contains("connection reset"));
    }

    #[tokio::test]
    async fn test_case_variant_terms_keep_their_own_verdicts() {
        let ai = Arc::new(ScriptedClassifier::returning(vec![
            AiVerdict::new("Best Widget", VerdictKind::Irrelevant, "a"),
            AiVerdict::new("best widget", VerdictKind::Competitor, "b"),
        ]));
        let c = classifier(&["free"], ai);
        let result = c
            .classify(&strings(&["Best Widget", "best widget"]), "ctx")
            .await;

        let flags: Vec<_> = result
            .flagged
            .iter()
            .map(|f| (f.search_term.as_str(), f.reason.as_str(), f.category))
            .collect();
        assert_eq!(
            flags,
            vec![
                ("Best Widget", "a", FlagCategory::Irrelevant),
                ("best widget", "b", FlagCategory::Competitor),
            ]
        );
    }

    #[tokio::test]
    async fn test_case_drift_in_reply_still_matches() {
        let ai = Arc::new(ScriptedClassifier::returning(vec![
            AiVerdict::new("BEST WIDGET", VerdictKind::Irrelevant, "drift"),
            AiVerdict::new("best widget", VerdictKind::Irrelevant, "again"),
        ]));
        let c = classifier(&["free"], ai);
        let result = c
            .classify(&strings(&["Best Widget", "best widget"]), "ctx")
            .await;

        // The drifted reply takes the first spelling, the exact one the second.
        assert_eq!(result.ai_count(), 2);
        assert_eq!(result.flagged[0].search_term, "Best Widget");
        assert_eq!(result.flagged[0].reason, "drift");
        assert_eq!(result.flagged[1].search_term, "best widget");
    }

    #[test]
    fn test_matched_text_keeps_term_casing() {
        assert_eq!(matched_text("Cheap Flights", "cheap"), "Cheap");
        assert_eq!(matched_text("widget HOW TO fix", "how to"), "HOW TO");
        assert_eq!(matched_text("free widget", "free"), "free");
        // "İ" lower-cases to two chars, so offsets no longer line up.
        assert_eq!(matched_text("İstanbul Cheap", "cheap"), "cheap");
    }

    #[tokio::test]
    async fn test_auto_flag_records_matched_substring() {
        let ai = Arc::new(ScriptedClassifier::safe());
        let c = classifier(&["cheap"], ai);
        let result = c.classify(&strings(&["Cheap Flights"]), "ctx").await;
        assert_eq!(result.flagged[0].matched_keyword, "Cheap");
        assert_eq!(result.flagged[0].reason, "matched disqualifier 'cheap'");
    }

    #[tokio::test]
    async fn test_duplicate_input_terms_collapse() {
        let ai = Arc::new(ScriptedClassifier::safe());
        let c = classifier(&["free"], Arc::clone(&ai));
        let result = c
            .classify(&strings(&["free a", "free a", "b", "b", "  "]), "ctx")
            .await;
        assert_eq!(result.flagged.len(), 1);
        assert_eq!(ai.calls()[0].0, strings(&["b"]));
    }

    #[test]
    fn test_anchor_keyword_must_occur_in_term() {
        assert_eq!(anchor_keyword("Acme Widgets", Some("acme")), "acme");
        assert_eq!(anchor_keyword("acme widgets", Some("globex")), "acme widgets");
        assert_eq!(anchor_keyword("acme widgets", Some("  ")), "acme widgets");
        assert_eq!(anchor_keyword("acme widgets", None), "acme widgets");
    }
}
