//! Error types for the puzzle agents.
//!
//! Stages report to the orchestrator through [`StageOutcome`], a tagged result
//! that says whether the loop should keep going or stop.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::{LlmError, StoreError};

/// Errors that can occur during agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Error from the LLM provider or structured-output decoding.
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Error from the historical store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The generator produced an unusable candidate.
    #[error("Puzzle generation failed: {0}")]
    GenerationFailed(String),

    /// A response decoded but could not be mapped into domain types.
    #[error("Failed to parse LLM response: {0}")]
    ResponseParseError(String),

    /// Configuration error.
    #[error("Agent configuration error: {0}")]
    ConfigurationError(String),

    /// Every attempt was used and no candidate cleared the acceptable floor.
    #[error("Exhausted {attempts} attempts without an acceptable puzzle (best score: {})", fmt_best(.best_score))]
    Exhausted {
        attempts: u32,
        best_score: Option<f64>,
    },
}

fn fmt_best(score: &Option<f64>) -> String {
    score
        .map(|s| format!("{:.1}", s))
        .unwrap_or_else(|| "none".to_string())
}

impl AgentError {
    /// Returns the provider's quota reset time if this is a quota failure.
    pub fn quota_reset(&self) -> Option<DateTime<Utc>> {
        match self {
            AgentError::Llm(LlmError::QuotaExceeded { reset_at, .. }) => Some(*reset_at),
            _ => None,
        }
    }

    pub fn is_quota(&self) -> bool {
        self.quota_reset().is_some()
    }

    /// True for failures that make further attempts pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::Llm(LlmError::QuotaExceeded { .. })
                | AgentError::Llm(LlmError::MissingApiKey)
                | AgentError::Llm(LlmError::MissingApiBase)
                | AgentError::Store(_)
                | AgentError::ConfigurationError(_)
        )
    }
}

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Tagged outcome of one pipeline stage.
#[derive(Debug)]
pub enum StageOutcome<T> {
    /// The stage produced a value; continue with the next stage.
    Success(T),
    /// This attempt is spent; the loop may start a new one.
    Retry(AgentError),
    /// Stop the loop.
    Fatal(AgentError),
}

impl<T> StageOutcome<T> {
    /// Classifies a stage result.
    pub fn from_result(result: AgentResult<T>) -> Self {
        match result {
            Ok(value) => StageOutcome::Success(value),
            Err(err) if err.is_fatal() => StageOutcome::Fatal(err),
            Err(err) => StageOutcome::Retry(err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Success(_))
    }
}

impl<T> From<AgentResult<T>> for StageOutcome<T> {
    fn from(result: AgentResult<T>) -> Self {
        Self::from_result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let ok: StageOutcome<u8> = StageOutcome::from_result(Ok(1));
        assert!(ok.is_success());

        let schema: StageOutcome<u8> = AgentResult::Err(
            LlmError::SchemaValidation("missing answer".to_string()).into(),
        )
        .into();
        assert!(matches!(schema, StageOutcome::Retry(_)));

        let timeout: StageOutcome<u8> =
            AgentResult::Err(LlmError::Timeout { timeout_ms: 100 }.into()).into();
        assert!(matches!(timeout, StageOutcome::Retry(_)));

        let quota: StageOutcome<u8> = AgentResult::Err(
            LlmError::QuotaExceeded {
                message: "out of credits".to_string(),
                reset_at: Utc::now(),
            }
            .into(),
        )
        .into();
        assert!(matches!(quota, StageOutcome::Fatal(_)));

        let store: StageOutcome<u8> =
            AgentResult::Err(StoreError::LockPoisoned.into()).into();
        assert!(matches!(store, StageOutcome::Fatal(_)));
    }

    #[test]
    fn test_quota_reset_exposed() {
        let reset_at = Utc::now();
        let err: AgentError = LlmError::QuotaExceeded {
            message: "daily cap".to_string(),
            reset_at,
        }
        .into();
        assert_eq!(err.quota_reset(), Some(reset_at));
        assert!(err.is_quota());
    }

    #[test]
    fn test_exhausted_message() {
        let err = AgentError::Exhausted {
            attempts: 3,
            best_score: Some(60.0),
        };
        assert!(err.to_string().contains("best score: 60.0"));

        let none = AgentError::Exhausted {
            attempts: 3,
            best_score: None,
        };
        assert!(none.to_string().contains("best score: none"));
    }
}
