//! Verdict types, the classifier trait and the strict completion decoder.
//!
//! Model output is never trusted: [`decode_verdicts`] accepts exactly one
//! shape and rejects everything else with [`ClassifierError::Schema`].
//!
//! Accepted shapes (optionally wrapped in a single fenced code block):
//!
//! ```json
//! {"flagged": [{"search_term": "...", "flag_type": "irrelevant", "reason": "...", "keyword": "..."}]}
//! [{"search_term": "...", "flag_type": "competitor", "reason": "..."}]
//! ```
//!
//! `flag_type` is one of `irrelevant`, `competitor`, `none`; `none` entries
//! are dropped. `keyword` is optional and may be `null`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, ClassifierResult};

/// Category assigned by the model to a flagged term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    Irrelevant,
    Competitor,
}

/// One flagged term as returned by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiVerdict {
    pub term: String,
    pub kind: VerdictKind,
    pub reason: String,
    /// Anchor phrase the model blamed, when it gave one.
    pub keyword: Option<String>,
}

impl AiVerdict {
    pub fn new(term: impl Into<String>, kind: VerdictKind, reason: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            kind,
            reason: reason.into(),
            keyword: None,
        }
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }
}

/// Classifies a batch of search terms against a business context.
///
/// Implementations return only flagged terms; anything absent is safe.
/// Callers must still discard verdicts for terms they did not submit.
#[async_trait]
pub trait AiClassifier: Send + Sync {
    async fn classify(&self, terms: &[String], context: &str) -> ClassifierResult<Vec<AiVerdict>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum WireFlag {
    Irrelevant,
    Competitor,
    None,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireVerdict {
    search_term: String,
    flag_type: WireFlag,
    reason: String,
    #[serde(default)]
    keyword: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireEnvelope {
    flagged: Vec<WireVerdict>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireBody {
    Wrapped(WireEnvelope),
    Bare(Vec<WireVerdict>),
}

/// Decode a completion into verdicts, failing closed on any mismatch.
pub fn decode_verdicts(content: &str) -> ClassifierResult<Vec<AiVerdict>> {
    let body = strip_code_fence(content);
    if body.is_empty() {
        return Err(ClassifierError::Schema("empty completion".to_string()));
    }

    let wire: WireBody =
        serde_json::from_str(body).map_err(|e| ClassifierError::Schema(e.to_string()))?;
    let entries = match wire {
        WireBody::Wrapped(envelope) => envelope.flagged,
        WireBody::Bare(entries) => entries,
    };

    let mut verdicts = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.into_iter().enumerate() {
        let term = entry.search_term.trim();
        if term.is_empty() {
            return Err(ClassifierError::Schema(format!(
                "entry {idx} has an empty search_term"
            )));
        }
        let kind = match entry.flag_type {
            WireFlag::Irrelevant => VerdictKind::Irrelevant,
            WireFlag::Competitor => VerdictKind::Competitor,
            WireFlag::None => continue,
        };
        verdicts.push(AiVerdict {
            term: term.to_string(),
            kind,
            reason: entry.reason.trim().to_string(),
            keyword: entry
                .keyword
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
        });
    }
    Ok(verdicts)
}

/// Remove one surrounding ```` ``` ```` fence, with or without a language tag.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return trimmed;
    };
    match rest.find('\n') {
        Some(newline) => rest[newline + 1..].trim(),
        None => rest.trim(),
    }
}
