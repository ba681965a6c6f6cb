//! OpenAI chat completions backend for [`AiClassifier`].
//!
//! Sends one request per batch with a JSON-schema response format, then runs
//! the completion through [`decode_verdicts`]. The request shape follows the
//! chat completions API; nothing else of the API surface is modelled.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{ClassifierError, ClassifierResult};
use crate::verdict::{decode_verdicts, AiClassifier, AiVerdict};

const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const SYSTEM_PROMPT: &str = "You're a senior-level Google Ads analyst. Only return flagged terms.";

/// Settings for the OpenAI backend.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub request_timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.2,
            request_timeout: Duration::from_secs(120),
        }
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - OPENAI_API_KEY (required)
    /// - OPENAI_MODEL (optional, default: "gpt-4o")
    /// - OPENAI_BASE_URL (optional)
    pub fn from_env() -> ClassifierResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ClassifierError::Config("OPENAI_API_KEY not set".into()))?;
        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            config.model = model;
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponseRaw {
    #[serde(default)]
    choices: Vec<ChoiceRaw>,
}

#[derive(Debug, Deserialize)]
struct ChoiceRaw {
    message: MessageRaw,
}

#[derive(Debug, Deserialize)]
struct MessageRaw {
    content: Option<String>,
}

/// [`AiClassifier`] backed by the OpenAI chat completions API.
pub struct OpenAiClassifier {
    config: OpenAiConfig,
    http: reqwest::Client,
}

impl OpenAiClassifier {
    pub fn new(config: OpenAiConfig) -> ClassifierResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("negsweep-ai/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> ClassifierResult<Self> {
        Self::new(OpenAiConfig::from_env()?)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl AiClassifier for OpenAiClassifier {
    async fn classify(&self, terms: &[String], context: &str) -> ClassifierResult<Vec<AiVerdict>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: build_prompt(terms, context),
                },
            ],
            temperature: self.config.temperature,
            response_format: verdict_schema(),
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "classifier request failed");
                ClassifierError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "classifier API error");
            return Err(ClassifierError::Api(format!("{status}: {error_text}")));
        }

        let raw: ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| ClassifierError::Schema(e.to_string()))?;
        let content = raw
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ClassifierError::Api("completion had no content".into()))?;

        let verdicts = decode_verdicts(&content)?;
        debug!(
            model = %self.config.model,
            submitted = terms.len(),
            flagged = verdicts.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "classified search term batch"
        );
        Ok(verdicts)
    }
}

/// User prompt for one batch.
pub(crate) fn build_prompt(terms: &[String], context: &str) -> String {
    let terms_json = serde_json::to_string(terms).unwrap_or_else(|_| "[]".to_string());
    let context = context.trim();
    let context_line = if context.is_empty() {
        String::new()
    } else {
        format!("Business context: {context}\n\n")
    };
    format!(
        "You are an expert Google Ads analyst. {context_line}For each search term, decide whether \
         it is 'irrelevant' to this business, a 'competitor' search, or 'none'. Return a JSON \
         object {{\"flagged\": [...]}} where each entry has 'search_term' (copied exactly), \
         'flag_type', 'reason', and 'keyword' (the shortest phrase responsible for the flag, or \
         null). Only return flagged terms.\n\nSearch terms:\n{terms_json}"
    )
}

/// Strict JSON schema for the `{"flagged": [...]}` envelope.
fn verdict_schema() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "flagged_search_terms",
            "strict": true,
            "schema": {
                "type": "object",
                "additionalProperties": false,
                "required": ["flagged"],
                "properties": {
                    "flagged": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "additionalProperties": false,
                            "required": ["search_term", "flag_type", "reason", "keyword"],
                            "properties": {
                                "search_term": { "type": "string" },
                                "flag_type": { "type": "string", "enum": ["irrelevant", "competitor", "none"] },
                                "reason": { "type": "string" },
                                "keyword": { "type": ["string", "null"] }
                            }
                        }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_terms_as_json() {
        let prompt = build_prompt(
            &["best widget".to_string(), "acme widget".to_string()],
            "widget shop in Ohio",
        );
        assert!(prompt.contains(r#"["best widget","acme widget"]"#));
        assert!(prompt.contains("Business context: widget shop in Ohio"));
    }

    #[test]
    fn test_prompt_without_context() {
        let prompt = build_prompt(&["x".to_string()], "   ");
        assert!(!prompt.contains("Business context"));
    }

    #[test]
    fn test_schema_requires_all_fields() {
        let schema = verdict_schema();
        let required = &schema["json_schema"]["schema"]["properties"]["flagged"]["items"]["required"];
        assert_eq!(required.as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_config_builder() {
        let config = OpenAiConfig::new("sk-test").with_model("gpt-4o-mini");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert!((config.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_network() {
        let classifier = OpenAiClassifier::new(
            OpenAiConfig::new("sk-test").with_model("unused"),
        )
        .unwrap();
        let verdicts = classifier.classify(&[], "ctx").await.unwrap();
        assert!(verdicts.is_empty());
    }
}
