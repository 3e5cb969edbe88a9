//! External-model parser: calls an inference service and decodes its
//! answer defensively.
//!
//! The service may answer with a wrapped payload, the payload itself, or
//! free text. Anything that goes wrong (transport, status, timeout) is
//! downgraded to an `unknown` result with confidence 0.0 and an `error`
//! entity; callers never see a failure.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use aq_protocol::{Entities, Intent, ParsedQuery};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::timeout;

use crate::QueryParser;
use crate::error::ParserError;

/// Bumped whenever `SYSTEM_PROMPT` changes meaning.
pub const PROMPT_VERSION: &str = "aq-intents-v2";

/// System description sent with the chat transport.
const SYSTEM_PROMPT: &str = r#"You are a query parser for an air-quality assistant (prompt aq-intents-v2). Parse the user's question into a structured intent.

Intents:
- current_reading: latest value of a metric at a place. Entities: metric, location.
- trend: how a metric changed over a period. Entities: metric, location, duration (integer), unit (hours|days|weeks|months|years).
- comparison: compare a metric across places. Entities: locations (list), metric.
- forecast: predicted value for a place. Entities: metric, location, duration, unit.
- hotspot: most polluted places in an area. Entities: location (may be null), metric.
- alert: health advisory or safety question. Entities: location, metric.
- unknown: anything else.

Metrics: pm25, aqi, no2, so2, o3. Location names are copied from the question, lower-case.

Respond with ONLY a JSON object (no markdown, no explanation):
{"intent": "<intent>", "entities": {<entities>}, "confidence": <0.0-1.0>}"#;

/// Confidence assumed when the model omits one.
const DEFAULT_CONFIDENCE: f64 = 0.7;

static BRACED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("invalid built-in pattern"));

/// How the inference service is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// `GET endpoint?query="<text>"` (fine-tuned inference server).
    #[default]
    Get,
    /// `POST endpoint` with a chat-style JSON body (Ollama-compatible).
    Chat,
}

/// Configuration for the external inference endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Full inference URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_endpoint() -> String {
    "http://localhost:8000/inference".into()
}
fn default_model() -> String {
    "air-quality-parser".into()
}
fn default_temperature() -> f64 {
    0.1
}
fn default_max_tokens() -> u32 {
    150
}
fn default_timeout_secs() -> u64 {
    5
}
fn default_enabled() -> bool {
    true
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            transport: Transport::default(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            enabled: default_enabled(),
        }
    }
}

/// Chat request body.
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    format: &'a str,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f64,
    num_predict: u32,
}

/// The three body shapes the inference service is known to return.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelResponse {
    /// `{"message": "<text>"}` or `{"message": {"content": "<text>"}}`.
    Wrapped(String),
    /// Any other JSON object: the payload itself.
    Direct(Value),
    /// A JSON string, or a body that is not JSON at all.
    PlainText(String),
}

impl ModelResponse {
    pub fn decode(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => {
                let wrapped = map.get("message").and_then(|message| match message {
                    Value::String(text) => Some(text.trim().to_string()),
                    Value::Object(inner) => inner
                        .get("content")
                        .and_then(Value::as_str)
                        .map(|text| text.trim().to_string()),
                    _ => None,
                });
                match wrapped {
                    Some(text) => Self::Wrapped(text),
                    None => Self::Direct(Value::Object(map)),
                }
            }
            Ok(Value::String(text)) => Self::PlainText(text.trim().to_string()),
            Ok(other) => Self::PlainText(other.to_string()),
            Err(_) => Self::PlainText(body.trim().to_string()),
        }
    }

    /// Text to feed to [`extract_json`].
    pub fn into_text(self) -> String {
        match self {
            Self::Wrapped(text) | Self::PlainText(text) => text,
            Self::Direct(value) => value.to_string(),
        }
    }
}

/// Find the payload object in model output.
///
/// Tries the whole text, then the outermost brace-delimited span, then
/// falls back to keyword heuristics.
pub fn extract_json(text: &str) -> Value {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
        return value;
    }
    if let Some(m) = BRACED.find(text)
        && let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(m.as_str())
    {
        return value;
    }
    manual_parse(text)
}

/// Keyword classifier used when the model output holds no JSON.
pub fn manual_parse(text: &str) -> Value {
    let lower = text.to_lowercase();
    let (intent, confidence) = if lower.contains("current") || lower.contains("pm") {
        (Intent::CurrentReading, 0.6)
    } else if lower.contains("trend") || lower.contains("history") {
        (Intent::Trend, 0.6)
    } else if lower.contains("compare") || lower.contains("vs") {
        (Intent::Comparison, 0.6)
    } else {
        (Intent::Unknown, 0.5)
    };
    serde_json::json!({
        "intent": intent.as_str(),
        "entities": {},
        "confidence": confidence,
    })
}

/// Build a `ParsedQuery` from a decoded payload, reading each field leniently.
pub fn payload_to_query(payload: &Value, text: &str) -> ParsedQuery {
    let intent = payload
        .get("intent")
        .and_then(Value::as_str)
        .map_or(Intent::Unknown, Intent::from_label);
    let entities: Entities = payload
        .get("entities")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let confidence = payload
        .get("confidence")
        .and_then(|c| match c {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .unwrap_or(DEFAULT_CONFIDENCE);
    ParsedQuery::new(intent, entities, confidence, text)
}

pub fn build_prompt(text: &str) -> String {
    format!("### Question: {text}\n\n### Answer: ")
}

/// Client for the external inference service.
pub struct LlmParser {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmParser {
    pub fn new(config: LlmConfig) -> Result<Self, ParserError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn try_parse(&self, text: &str) -> Result<ParsedQuery, ParserError> {
        if !self.config.enabled {
            return Err(ParserError::Disabled);
        }

        let bound = Duration::from_secs(self.config.timeout_secs);
        let body = timeout(bound, self.call_model(text))
            .await
            .map_err(|_| ParserError::Timeout(self.config.timeout_secs))??;

        let payload = extract_json(&ModelResponse::decode(&body).into_text());
        Ok(payload_to_query(&payload, text))
    }

    async fn call_model(&self, text: &str) -> Result<String, ParserError> {
        let request = match self.config.transport {
            Transport::Get => self
                .client
                .get(&self.config.endpoint)
                .query(&[("query", format!("\"{text}\""))]),
            Transport::Chat => {
                let prompt = build_prompt(text);
                let body = ChatRequest {
                    model: &self.config.model,
                    messages: vec![
                        ChatMessage {
                            role: "system",
                            content: SYSTEM_PROMPT,
                        },
                        ChatMessage {
                            role: "user",
                            content: &prompt,
                        },
                    ],
                    format: "json",
                    stream: false,
                    options: ChatOptions {
                        temperature: self.config.temperature,
                        num_predict: self.config.max_tokens,
                    },
                };
                self.client.post(&self.config.endpoint).json(&body)
            }
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ParserError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl QueryParser for LlmParser {
    async fn parse(&self, text: &str) -> ParsedQuery {
        match self.try_parse(text).await {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    prompt_version = PROMPT_VERSION,
                    "model parse failed, downgrading to unknown"
                );
                ParsedQuery::failed(text, &e)
            }
        }
    }

    fn tier_name(&self) -> &str {
        "model"
    }
}
