//! Error types for puzzle-forge operations.
//!
//! Defines the error enums shared across subsystems:
//! - LLM API interactions and structured-output decoding
//! - Historical store access

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: LITELLM_API_KEY environment variable not set")]
    MissingApiKey,

    #[error("Missing API base URL: LITELLM_API_BASE environment variable not set")]
    MissingApiBase,

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Quota exceeded (resets at {reset_at}): {message}")]
    QuotaExceeded {
        message: String,
        reset_at: DateTime<Utc>,
    },

    #[error("LLM call timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("Structured output failed schema validation: {0}")]
    SchemaValidation(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

impl LlmError {
    /// Returns true if the call that produced this error may succeed when repeated.
    ///
    /// Quota exhaustion is deliberately not transient: repeating the call only
    /// burns budget until the provider's reset time.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Timeout { .. } => true,
            LlmError::RateLimited(_) => true,
            LlmError::RequestFailed(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("timeout")
                    || msg.contains("timed out")
                    || msg.contains("connection")
                    || msg.contains("temporarily")
            }
            LlmError::ApiError { code, .. } => *code >= 500 || *code == 429,
            LlmError::QuotaExceeded { .. }
            | LlmError::SchemaValidation(_)
            | LlmError::ParseError(_)
            | LlmError::MissingApiKey
            | LlmError::MissingApiBase => false,
        }
    }

    /// Returns true for quota-exhaustion failures.
    pub fn is_quota(&self) -> bool {
        matches!(self, LlmError::QuotaExceeded { .. })
    }
}

/// Errors that can occur while reading or writing the historical store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Fingerprint already stored: {0}")]
    DuplicateFingerprint(String),

    #[error("Corrupt record '{id}': {reason}")]
    CorruptRecord { id: String, reason: String },

    #[error("Store lock poisoned")]
    LockPoisoned,
}
