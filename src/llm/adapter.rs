//! Structured-output adapter over an [`LlmProvider`].
//!
//! Every pipeline stage talks to the model through [`GenerativeAdapter::request`],
//! which sends a JSON-schema constrained chat completion, bounds each call with a
//! wall-clock timeout, retries transient failures with capped backoff, and decodes
//! the reply into a typed contract that must pass [`StructuredOutput::validate`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::llm::litellm::{GenerationRequest, LlmProvider, Message, ResponseFormat};
use crate::llm::retry::RetryPolicy;
use crate::metrics::ForgeMetrics;
use crate::utils::try_extract_json_from_response;

/// Default wall-clock timeout for a single provider call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Default completion budget for structured calls.
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Capability tier a stage asks for; mapped to a concrete model by [`ModelTiers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Cheap, low-latency model for scoring passes.
    Fast,
    /// Strong reasoning model for review and adversarial passes.
    Smart,
    /// High-temperature-friendly model for authoring.
    Creative,
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelTier::Fast => write!(f, "fast"),
            ModelTier::Smart => write!(f, "smart"),
            ModelTier::Creative => write!(f, "creative"),
        }
    }
}

impl FromStr for ModelTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" => Ok(ModelTier::Fast),
            "smart" => Ok(ModelTier::Smart),
            "creative" => Ok(ModelTier::Creative),
            other => Err(format!("unknown model tier '{}'", other)),
        }
    }
}

/// Model identifiers for each tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTiers {
    pub fast: String,
    pub smart: String,
    pub creative: String,
}

impl Default for ModelTiers {
    fn default() -> Self {
        Self {
            fast: "google/gemini-2.5-flash".to_string(),
            smart: "anthropic/claude-sonnet-4.5".to_string(),
            creative: "moonshotai/kimi-k2.5".to_string(),
        }
    }
}

impl ModelTiers {
    /// Uses one model for every tier.
    pub fn uniform(model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            fast: model.clone(),
            smart: model.clone(),
            creative: model,
        }
    }

    pub fn with_fast(mut self, model: impl Into<String>) -> Self {
        self.fast = model.into();
        self
    }

    pub fn with_smart(mut self, model: impl Into<String>) -> Self {
        self.smart = model.into();
        self
    }

    pub fn with_creative(mut self, model: impl Into<String>) -> Self {
        self.creative = model.into();
        self
    }

    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => &self.fast,
            ModelTier::Smart => &self.smart,
            ModelTier::Creative => &self.creative,
        }
    }
}

/// A schema-constrained request from one pipeline stage.
#[derive(Debug, Clone)]
pub struct StructuredRequest {
    pub prompt: String,
    pub system_instructions: String,
    /// Schema name; also the stage label in metrics and logs.
    pub schema_name: String,
    pub output_schema: serde_json::Value,
    pub temperature: f64,
    pub model_tier: ModelTier,
    pub timeout: Duration,
    pub max_tokens: u32,
}

impl StructuredRequest {
    pub fn new(
        schema_name: impl Into<String>,
        prompt: impl Into<String>,
        output_schema: serde_json::Value,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            system_instructions: String::new(),
            schema_name: schema_name.into(),
            output_schema,
            temperature: 0.3,
            model_tier: ModelTier::Smart,
            timeout: DEFAULT_CALL_TIMEOUT,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_system_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.system_instructions = instructions.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_model_tier(mut self, tier: ModelTier) -> Self {
        self.model_tier = tier;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A typed response contract.
///
/// `validate` enforces the semantic rules serde cannot express (ranges,
/// non-empty fields). A violation is reported as a schema failure.
pub trait StructuredOutput: DeserializeOwned {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Decodes raw model text into a validated contract.
pub fn decode_structured<T: StructuredOutput>(content: &str) -> Result<T, LlmError> {
    let json = try_extract_json_from_response(content)
        .into_result_with_context(content)
        .map_err(|e| LlmError::SchemaValidation(e.to_string()))?;

    let value: T = serde_json::from_str(&json)
        .map_err(|e| LlmError::SchemaValidation(format!("contract mismatch: {}", e)))?;

    value.validate().map_err(LlmError::SchemaValidation)?;
    Ok(value)
}

/// Schema-enforcing front end to an LLM provider.
#[derive(Clone)]
pub struct GenerativeAdapter {
    provider: Arc<dyn LlmProvider>,
    tiers: ModelTiers,
    retry: RetryPolicy,
    metrics: Option<Arc<ForgeMetrics>>,
}

impl GenerativeAdapter {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            tiers: ModelTiers::default(),
            retry: RetryPolicy::default(),
            metrics: None,
        }
    }

    pub fn with_tiers(mut self, tiers: ModelTiers) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ForgeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn tiers(&self) -> &ModelTiers {
        &self.tiers
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Sends a structured request and decodes the validated response.
    ///
    /// Transient provider failures are retried per the adapter's
    /// [`RetryPolicy`]. Quota exhaustion and schema failures return at once.
    pub async fn request<T: StructuredOutput>(&self, request: &StructuredRequest) -> Result<T, LlmError> {
        let max_calls = self.retry.max_calls();
        let mut call = 0;

        loop {
            if call > 0 {
                let delay = self.retry.delay_for(call);
                debug!(
                    stage = %request.schema_name,
                    retry = call,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying structured call after transient failure"
                );
                tokio::time::sleep(delay).await;
            }

            match self.call_once::<T>(request).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && call + 1 < max_calls => {
                    warn!(
                        stage = %request.schema_name,
                        call = call + 1,
                        max_calls,
                        error = %err,
                        "Transient error, will retry"
                    );
                    call += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn call_once<T: StructuredOutput>(&self, request: &StructuredRequest) -> Result<T, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if !request.system_instructions.is_empty() {
            messages.push(Message::system(request.system_instructions.clone()));
        }
        messages.push(Message::user(request.prompt.clone()));

        let generation = GenerationRequest::new(self.tiers.model_for(request.model_tier), messages)
            .with_temperature(request.temperature)
            .with_max_tokens(request.max_tokens)
            .with_response_format(ResponseFormat::json_schema(
                request.schema_name.clone(),
                request.output_schema.clone(),
            ));

        let started = Instant::now();
        let outcome = match tokio::time::timeout(request.timeout, self.provider.generate(generation)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                timeout_ms: request.timeout.as_millis() as u64,
            }),
        };

        let decoded = outcome.and_then(|response| {
            let content = response.first_content().ok_or_else(|| {
                LlmError::SchemaValidation("response contained no choices".to_string())
            })?;
            decode_structured::<T>(content)
        });

        self.record(&request.schema_name, &decoded, started.elapsed());
        decoded
    }

    fn record<T>(&self, stage: &str, result: &Result<T, LlmError>, elapsed: Duration) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        let status = match result {
            Ok(_) => "ok",
            Err(LlmError::Timeout { .. }) => "timeout",
            Err(LlmError::QuotaExceeded { .. }) => "quota",
            Err(LlmError::SchemaValidation(_)) => "invalid_output",
            Err(_) => "error",
        };
        metrics.record_llm_call(stage, status, elapsed.as_secs_f64());
    }
}

impl fmt::Debug for GenerativeAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerativeAdapter")
            .field("tiers", &self.tiers)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::litellm::{Choice, GenerationResponse, Usage};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Deserialize)]
    struct Verdict {
        score: u8,
    }

    impl StructuredOutput for Verdict {
        fn validate(&self) -> Result<(), String> {
            if self.score > 100 {
                return Err(format!("score {} out of range", self.score));
            }
            Ok(())
        }
    }

    enum Scripted {
        Reply(String),
        Fail(LlmError),
        Hang,
    }

    struct ScriptedProvider {
        script: Mutex<Vec<Scripted>>,
        call_count: AtomicUsize,
        models: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Scripted>) -> Self {
            Self {
                script: Mutex::new(script),
                call_count: AtomicUsize::new(0),
                models: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.models.lock().expect("lock").push(request.model.clone());
            let next = {
                let mut script = self.script.lock().expect("lock");
                if script.is_empty() {
                    Scripted::Fail(LlmError::ApiError {
                        code: 400,
                        message: "script exhausted".to_string(),
                    })
                } else {
                    script.remove(0)
                }
            };
            match next {
                Scripted::Reply(content) => Ok(GenerationResponse {
                    id: "test".to_string(),
                    model: request.model,
                    choices: vec![Choice {
                        index: 0,
                        message: Message::assistant(content),
                        finish_reason: "stop".to_string(),
                    }],
                    usage: Usage::default(),
                }),
                Scripted::Fail(err) => Err(err),
                Scripted::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(LlmError::RequestFailed("unreachable".to_string()))
                }
            }
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::default()
            .with_base_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(2))
    }

    fn request() -> StructuredRequest {
        StructuredRequest::new("verdict", "Score it", serde_json::json!({"type": "object"}))
    }

    #[tokio::test]
    async fn test_decodes_valid_response() {
        let provider = Arc::new(ScriptedProvider::new(vec![Scripted::Reply(
            r#"{"score": 88}"#.to_string(),
        )]));
        let adapter = GenerativeAdapter::new(provider.clone());

        let verdict: Verdict = adapter.request(&request()).await.expect("should decode");
        assert_eq!(verdict.score, 88);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_uses_model_for_tier() {
        let provider = Arc::new(ScriptedProvider::new(vec![Scripted::Reply(
            r#"{"score": 1}"#.to_string(),
        )]));
        let adapter = GenerativeAdapter::new(provider.clone())
            .with_tiers(ModelTiers::uniform("base").with_creative("poet"));

        let req = request().with_model_tier(ModelTier::Creative);
        let _: Verdict = adapter.request(&req).await.expect("should decode");
        assert_eq!(provider.models.lock().expect("lock").as_slice(), ["poet"]);
    }

    #[test]
    fn test_tier_overrides() {
        let tiers = ModelTiers::uniform("base")
            .with_fast("quick")
            .with_smart("judge");
        assert_eq!(tiers.model_for(ModelTier::Fast), "quick");
        assert_eq!(tiers.model_for(ModelTier::Smart), "judge");
        assert_eq!(tiers.model_for(ModelTier::Creative), "base");
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Scripted::Fail(LlmError::ApiError {
                code: 502,
                message: "bad gateway".to_string(),
            }),
            Scripted::Fail(LlmError::RateLimited("slow down".to_string())),
            Scripted::Reply(r#"{"score": 70}"#.to_string()),
        ]));
        let adapter = GenerativeAdapter::new(provider.clone()).with_retry(fast_retry());

        let verdict: Verdict = adapter.request(&request()).await.expect("third call succeeds");
        assert_eq!(verdict.score, 70);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_retry_budget() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Scripted::Fail(LlmError::RequestFailed("connection reset".to_string())),
            Scripted::Fail(LlmError::RequestFailed("connection reset".to_string())),
            Scripted::Fail(LlmError::RequestFailed("connection reset".to_string())),
            Scripted::Reply(r#"{"score": 70}"#.to_string()),
        ]));
        let adapter = GenerativeAdapter::new(provider.clone()).with_retry(fast_retry());

        let result: Result<Verdict, _> = adapter.request(&request()).await;
        assert!(matches!(result, Err(LlmError::RequestFailed(_))));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_quota_is_not_retried() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Scripted::Fail(LlmError::QuotaExceeded {
                message: "credits exhausted".to_string(),
                reset_at: Utc::now(),
            }),
            Scripted::Reply(r#"{"score": 70}"#.to_string()),
        ]));
        let adapter = GenerativeAdapter::new(provider.clone()).with_retry(fast_retry());

        let result: Result<Verdict, _> = adapter.request(&request()).await;
        assert!(matches!(result, Err(LlmError::QuotaExceeded { .. })));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_schema_violation_is_not_retried() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Scripted::Reply(r#"{"score": 250}"#.to_string()),
            Scripted::Reply(r#"{"score": 70}"#.to_string()),
        ]));
        let adapter = GenerativeAdapter::new(provider.clone()).with_retry(fast_retry());

        let result: Result<Verdict, _> = adapter.request(&request()).await;
        match result {
            Err(LlmError::SchemaValidation(msg)) => assert!(msg.contains("out of range")),
            other => panic!("expected schema validation error, got {other:?}"),
        }
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_becomes_typed_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![Scripted::Hang]));
        let adapter = GenerativeAdapter::new(provider.clone()).with_retry(RetryPolicy::none());

        let req = request().with_timeout(Duration::from_millis(20));
        let result: Result<Verdict, _> = adapter.request(&req).await;
        assert!(matches!(result, Err(LlmError::Timeout { timeout_ms: 20 })));
    }

    #[tokio::test]
    async fn test_records_metrics_per_call() {
        let metrics = Arc::new(ForgeMetrics::new().expect("metrics"));
        let provider = Arc::new(ScriptedProvider::new(vec![
            Scripted::Fail(LlmError::ApiError {
                code: 500,
                message: "boom".to_string(),
            }),
            Scripted::Reply(r#"{"score": 5}"#.to_string()),
        ]));
        let adapter = GenerativeAdapter::new(provider)
            .with_retry(fast_retry())
            .with_metrics(metrics.clone());

        let _: Verdict = adapter.request(&request()).await.expect("should decode");
        assert_eq!(metrics.llm_calls("verdict", "error"), 1);
        assert_eq!(metrics.llm_calls("verdict", "ok"), 1);
    }

    #[test]
    fn test_decode_structured_missing_field() {
        let result: Result<Verdict, _> = decode_structured(r#"{"points": 3}"#);
        assert!(matches!(result, Err(LlmError::SchemaValidation(_))));
    }

    #[test]
    fn test_model_tier_parsing() {
        assert_eq!("Creative".parse::<ModelTier>(), Ok(ModelTier::Creative));
        assert!("huge".parse::<ModelTier>().is_err());
        assert_eq!(ModelTier::Fast.to_string(), "fast");
    }
}
