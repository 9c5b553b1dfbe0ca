//! puzzle_forge: LLM-authored emoji puzzles behind uniqueness, difficulty and
//! quality gates.
//!
//! This library provides the generation pipeline, its historical store, and
//! the bounded-retry orchestrator that ties them together.

// Core modules
pub mod agents;
pub mod categories;
pub mod cli;
pub mod difficulty;
pub mod diversity;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod puzzle;
pub mod quality;
pub mod storage;
pub mod utils;

// Re-export commonly used error types
pub use error::{LlmError, StoreError};
