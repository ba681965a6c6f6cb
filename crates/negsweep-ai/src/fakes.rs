//! Scripted classifier (testing only)
//!
//! `ScriptedClassifier` returns a canned answer and records every batch it
//! was asked about, so callers can assert on what was submitted and how often.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{ClassifierError, ClassifierResult};
use crate::verdict::{decode_verdicts, AiClassifier, AiVerdict};

#[derive(Debug, Clone)]
enum Script {
    Verdicts(Vec<AiVerdict>),
    Completion(String),
    Fail(ClassifierError),
}

/// Classifier with a fixed response.
#[derive(Debug)]
pub struct ScriptedClassifier {
    script: Script,
    calls: Mutex<Vec<(Vec<String>, String)>>,
}

impl ScriptedClassifier {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with `verdicts`.
    pub fn returning(verdicts: Vec<AiVerdict>) -> Self {
        Self::with_script(Script::Verdicts(verdicts))
    }

    /// Flag nothing.
    pub fn safe() -> Self {
        Self::returning(Vec::new())
    }

    /// Answer with a raw completion, decoded like a real backend would.
    pub fn completion(content: impl Into<String>) -> Self {
        Self::with_script(Script::Completion(content.into()))
    }

    /// Always fail with `err`.
    pub fn failing(err: ClassifierError) -> Self {
        Self::with_script(Script::Fail(err))
    }

    /// Batches submitted so far, with their context.
    pub fn calls(&self) -> Vec<(Vec<String>, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AiClassifier for ScriptedClassifier {
    async fn classify(&self, terms: &[String], context: &str) -> ClassifierResult<Vec<AiVerdict>> {
        self.calls
            .lock()
            .unwrap()
            .push((terms.to_vec(), context.to_string()));
        match &self.script {
            Script::Verdicts(verdicts) => Ok(verdicts.clone()),
            Script::Completion(content) => decode_verdicts(content),
            Script::Fail(err) => Err(err.clone()),
        }
    }
}
