//! LLM integration for puzzle-forge.
//!
//! - [`litellm`]: OpenAI-compatible chat client and the [`LlmProvider`] trait
//! - [`adapter`]: schema-constrained requests with timeouts and typed decoding
//! - [`retry`]: call-level backoff policy
//!
//! ```ignore
//! use puzzle_forge::llm::{GenerativeAdapter, LiteLlmClient, StructuredRequest};
//! use std::sync::Arc;
//!
//! let client = Arc::new(LiteLlmClient::from_env()?);
//! let adapter = GenerativeAdapter::new(client);
//! let review: QualityReview = adapter.request(&StructuredRequest::new(
//!     "quality_review",
//!     prompt,
//!     schema,
//! )).await?;
//! ```

pub mod adapter;
pub mod litellm;
pub mod retry;

pub use adapter::{
    decode_structured, GenerativeAdapter, ModelTier, ModelTiers, StructuredOutput,
    StructuredRequest, DEFAULT_CALL_TIMEOUT,
};
pub use litellm::{
    Choice, GenerationRequest, GenerationResponse, JsonSchemaSpec, LiteLlmClient, LlmProvider,
    Message, ResponseFormat, Usage,
};
pub use retry::RetryPolicy;
