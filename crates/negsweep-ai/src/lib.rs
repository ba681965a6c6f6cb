//! negsweep-ai: AI classification of search terms
//!
//! Provides the [`AiClassifier`] trait the pipeline delegates to, a strict
//! decoder for model completions, an OpenAI backend and a scripted fake.

mod error;
pub mod fakes;
pub mod openai;
pub mod verdict;

pub use error::{ClassifierError, ClassifierResult};
pub use openai::{OpenAiClassifier, OpenAiConfig};
pub use verdict::{decode_verdicts, AiClassifier, AiVerdict, VerdictKind};
