//! LiteLLM-compatible client implementation for puzzle-forge.
//!
//! This module provides a client for any OpenAI-compatible chat completions
//! endpoint (LiteLLM proxy, OpenRouter) with JSON-schema response formats.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::LlmError;

/// Default request timeout for the underlying HTTP client.
const HTTP_TIMEOUT_SECS: u64 = 180;

/// Default model used when a request leaves the model empty.
const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4.5";

/// A message in a conversation with an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender (e.g., "system", "user", "assistant").
    pub role: String,
    /// Content of the message.
    pub content: String,
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Named JSON schema the response must conform to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSchemaSpec {
    /// Schema name, also used to identify the pipeline stage.
    pub name: String,
    /// Whether the provider should enforce the schema strictly.
    pub strict: bool,
    /// The JSON schema document.
    pub schema: serde_json::Value,
}

/// OpenAI-style `response_format` block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    pub json_schema: JsonSchemaSpec,
}

impl ResponseFormat {
    /// Creates a strict `json_schema` response format.
    pub fn json_schema(name: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            format_type: "json_schema".to_string(),
            json_schema: JsonSchemaSpec {
                name: name.into(),
                strict: true,
                schema,
            },
        }
    }

    /// Returns the schema name.
    pub fn name(&self) -> &str {
        &self.json_schema.name
    }
}

/// Request for text generation from an LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model identifier to use for generation.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<Message>,
    /// Sampling temperature (0.0 - 2.0). Higher values = more random.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Structured output constraint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl GenerationRequest {
    /// Create a new generation request with default parameters.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            response_format: None,
        }
    }

    /// Set the temperature for this request.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the max tokens for this request.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Constrain the response to a JSON schema.
    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    /// Name of the requested response schema, if any.
    pub fn schema_name(&self) -> Option<&str> {
        self.response_format.as_ref().map(|f| f.name())
    }
}

/// Response from an LLM generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Unique identifier for this response.
    pub id: String,
    /// Model that generated this response.
    pub model: String,
    /// Generated choices/completions.
    pub choices: Vec<Choice>,
    /// Token usage statistics.
    pub usage: Usage,
}

impl GenerationResponse {
    /// Get the content of the first choice, if available.
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// A single generated choice from the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// Index of this choice in the response.
    pub index: u32,
    /// Generated message.
    pub message: Message,
    /// Reason the generation stopped (e.g., "stop", "length").
    pub finish_reason: String,
}

/// Token usage statistics for a generation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Trait for LLM providers that can generate text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a response for the given request.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError>;
}

/// Client for LiteLLM-compatible APIs.
pub struct LiteLlmClient {
    /// Base URL for the API.
    api_base: String,
    /// Optional API key for authentication.
    api_key: Option<String>,
    /// Default model to use for requests.
    default_model: String,
    /// HTTP client for making API requests.
    http_client: Client,
}

impl LiteLlmClient {
    /// Create a new LiteLLM client with explicit configuration.
    ///
    /// # Arguments
    ///
    /// * `api_base` - Base URL for the API (e.g., "http://localhost:4000")
    /// * `api_key` - Optional API key for authentication
    /// * `default_model` - Default model to use when none is specified
    pub fn new(api_base: String, api_key: Option<String>, default_model: String) -> Self {
        Self {
            api_base,
            api_key,
            default_model,
            http_client: build_http_client(),
        }
    }

    /// Create a client pre-configured for OpenRouter.
    pub fn new_with_defaults(api_key: String) -> Self {
        Self::new(
            "https://openrouter.ai/api/v1".to_string(),
            Some(api_key),
            DEFAULT_MODEL.to_string(),
        )
    }

    /// Create a new LiteLLM client from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `LITELLM_API_BASE`: Base URL for the API (required)
    /// - `LITELLM_API_KEY`: API key for authentication (optional)
    /// - `LITELLM_DEFAULT_MODEL`: Default model
    ///
    /// # Errors
    ///
    /// Returns `LlmError::MissingApiBase` if `LITELLM_API_BASE` is not set.
    pub fn from_env() -> Result<Self, LlmError> {
        let api_base = env::var("LITELLM_API_BASE").map_err(|_| LlmError::MissingApiBase)?;
        let api_key = env::var("LITELLM_API_KEY").ok();
        let default_model =
            env::var("LITELLM_DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Self::new(api_base, api_key, default_model))
    }

    /// Get the API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Get the default model.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Check if an API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

fn build_http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()
        .unwrap_or_default()
}

/// Internal request structure for the OpenAI-compatible API.
#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    id: String,
    model: String,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    index: u32,
    message: ApiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

#[async_trait]
impl LlmProvider for LiteLlmClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };

        let api_request = ApiRequest {
            model,
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request.response_format,
        };

        let url = format!("{}/chat/completions", self.api_base);

        let mut http_request = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", "https://puzzle-forge.local")
            .header("X-Title", "puzzle-forge");

        if let Some(ref api_key) = self.api_key {
            http_request = http_request.header("Authorization", format!("Bearer {}", api_key));
        }

        let http_response = http_request
            .json(&api_request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = http_response.status();

        if !status.is_success() {
            let status_code = status.as_u16();
            let reset_hint = parse_reset_hint(http_response.headers(), Utc::now());
            let error_text = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());

            let (message, code) = match serde_json::from_str::<ApiErrorResponse>(&error_text) {
                Ok(parsed) => (parsed.error.message, parsed.error.code),
                Err(_) => (error_text, None),
            };

            return Err(classify_http_error(status_code, message, code, reset_hint));
        }

        let api_response: ApiResponse = http_response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse API response: {}", e)))?;

        let choices = api_response
            .choices
            .into_iter()
            .map(|choice| Choice {
                index: choice.index,
                message: Message {
                    role: choice.message.role,
                    content: choice.message.content.unwrap_or_default(),
                },
                finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            })
            .collect();

        Ok(GenerationResponse {
            id: api_response.id,
            model: api_response.model,
            choices,
            usage: api_response.usage.unwrap_or_default(),
        })
    }
}

/// Maps a non-success HTTP status to a typed error.
///
/// 402 and quota-worded 429s are quota exhaustion; other 429s are plain rate
/// limits that clear within seconds.
fn classify_http_error(
    status_code: u16,
    message: String,
    code: Option<serde_json::Value>,
    reset_hint: Option<DateTime<Utc>>,
) -> LlmError {
    let code_text = code.map(|c| c.to_string().to_lowercase()).unwrap_or_default();
    let lowered = message.to_lowercase();
    let mentions_quota = ["quota", "credit", "billing", "insufficient"]
        .iter()
        .any(|needle| lowered.contains(needle) || code_text.contains(needle));

    if status_code == 402 || (status_code == 429 && mentions_quota) {
        return LlmError::QuotaExceeded {
            message,
            reset_at: reset_hint.unwrap_or_else(|| next_utc_midnight(Utc::now())),
        };
    }

    if status_code == 429 {
        return LlmError::RateLimited(message);
    }

    LlmError::ApiError {
        code: status_code,
        message,
    }
}

/// Reads a quota/rate reset time from response headers.
///
/// Understands `retry-after` in seconds and `x-ratelimit-reset` as epoch
/// seconds or milliseconds.
fn parse_reset_hint(headers: &HeaderMap, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
    };

    if let Some(secs) = header_value("retry-after").and_then(|v| v.parse::<i64>().ok()) {
        return Some(now + ChronoDuration::seconds(secs.max(0)));
    }

    let raw = header_value("x-ratelimit-reset")?.parse::<i64>().ok()?;
    // Values past year ~2286 in seconds are millisecond timestamps.
    if raw > 10_000_000_000 {
        Utc.timestamp_millis_opt(raw).single()
    } else {
        Utc.timestamp_opt(raw, 0).single()
    }
}

/// Fallback reset estimate for daily quotas.
fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now.date_naive() + ChronoDuration::days(1);
    tomorrow
        .and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or(now + ChronoDuration::hours(24))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_message_constructors() {
        let system = Message::system("You are helpful.");
        assert_eq!(system.role, "system");
        assert_eq!(system.content, "You are helpful.");

        let user = Message::user("Hello");
        assert_eq!(user.role, "user");

        let assistant = Message::assistant("Hi there!");
        assert_eq!(assistant.role, "assistant");
    }

    #[test]
    fn test_generation_request_builder() {
        let request = GenerationRequest::new("gpt-4", vec![Message::user("test")])
            .with_temperature(0.7)
            .with_max_tokens(1000)
            .with_response_format(ResponseFormat::json_schema(
                "puzzle_candidate",
                serde_json::json!({"type": "object"}),
            ));

        assert_eq!(request.model, "gpt-4");
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.max_tokens, Some(1000));
        assert_eq!(request.schema_name(), Some("puzzle_candidate"));
    }

    #[test]
    fn test_response_format_serialization() {
        let format = ResponseFormat::json_schema("quality_review", serde_json::json!({}));
        let json = serde_json::to_string(&format).expect("serialization should succeed");
        assert!(json.contains("\"type\":\"json_schema\""));
        assert!(json.contains("\"strict\":true"));
        assert!(json.contains("\"name\":\"quality_review\""));
    }

    #[test]
    fn test_api_request_skips_empty_options() {
        let request = ApiRequest {
            model: "gpt-4".to_string(),
            messages: vec![Message::user("test")],
            temperature: Some(0.7),
            max_tokens: None,
            response_format: None,
        };

        let json = serde_json::to_string(&request).expect("serialization should succeed");
        assert!(json.contains("\"model\":\"gpt-4\""));
        assert!(!json.contains("max_tokens"));
        assert!(!json.contains("response_format"));
    }

    #[test]
    fn test_litellm_client_new() {
        let client = LiteLlmClient::new(
            "http://localhost:4000".to_string(),
            Some("test-key".to_string()),
            "gpt-4".to_string(),
        );

        assert_eq!(client.api_base(), "http://localhost:4000");
        assert_eq!(client.default_model(), "gpt-4");
        assert!(client.has_api_key());
    }

    #[test]
    fn test_new_with_defaults_targets_openrouter() {
        let client = LiteLlmClient::new_with_defaults("key".to_string());
        assert_eq!(client.api_base(), "https://openrouter.ai/api/v1");
        assert_eq!(client.default_model(), DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn test_generate_connection_error() {
        let client = LiteLlmClient::new(
            "http://localhost:65535".to_string(),
            None,
            "gpt-4".to_string(),
        );

        let request = GenerationRequest::new("gpt-4", vec![Message::user("test")]);
        let result = client.generate(request).await;

        assert!(matches!(result, Err(LlmError::RequestFailed(_))));
    }

    #[test]
    fn test_classify_payment_required_as_quota() {
        let err = classify_http_error(402, "Insufficient credits".to_string(), None, None);
        assert!(err.is_quota());
    }

    #[test]
    fn test_classify_quota_worded_429() {
        let err = classify_http_error(
            429,
            "You exceeded your current quota".to_string(),
            Some(serde_json::json!("insufficient_quota")),
            None,
        );
        assert!(err.is_quota());

        let plain = classify_http_error(429, "Too many requests".to_string(), None, None);
        assert!(matches!(plain, LlmError::RateLimited(_)));
        assert!(plain.is_transient());
    }

    #[test]
    fn test_classify_server_error() {
        let err = classify_http_error(503, "overloaded".to_string(), None, None);
        assert!(matches!(err, LlmError::ApiError { code: 503, .. }));
    }

    #[test]
    fn test_parse_reset_hint_retry_after() {
        let now = Utc::now();
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("120"));

        let reset = parse_reset_hint(&headers, now).expect("should parse retry-after");
        assert_eq!((reset - now).num_seconds(), 120);
    }

    #[test]
    fn test_parse_reset_hint_epoch_millis() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-ratelimit-reset",
            HeaderValue::from_static("1893456000000"),
        );

        let reset = parse_reset_hint(&headers, Utc::now()).expect("should parse epoch millis");
        assert_eq!(reset.timestamp(), 1_893_456_000);
    }

    #[test]
    fn test_next_utc_midnight() {
        let now = Utc
            .with_ymd_and_hms(2026, 3, 14, 15, 9, 26)
            .single()
            .expect("valid date");
        let midnight = next_utc_midnight(now);
        assert_eq!(midnight.to_rfc3339(), "2026-03-15T00:00:00+00:00");
    }
}
