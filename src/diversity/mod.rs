//! Fingerprinting, similarity and diversity analysis for puzzles.
//!
//! This module provides the pure functions the uniqueness validator and the
//! batch report are built on:
//!
//! 1. **Components** - Split a puzzle body into symbol/number/arrow/word sets
//! 2. **Fingerprint** - SHA-256 of normalized content for exact duplicates
//! 3. **Similarity** - Answer edit distance blended with symbol-set overlap
//! 4. **Patterns** - Rule-based construction-technique classification
//! 5. **Metrics** - Entropy and Gini spread of a batch
//!
//! # Usage
//!
//! ```rust,ignore
//! use puzzle_forge::diversity::{fingerprint, similarity, PuzzleSignature};
//!
//! let digest = fingerprint(&candidate);
//! let score = similarity(&PuzzleSignature::of(&a), &PuzzleSignature::of(&b));
//! ```

pub mod components;
pub mod fingerprint;
pub mod metrics;
pub mod patterns;
pub mod similarity;

pub use components::{extract_components, ContentComponents};
pub use fingerprint::{fingerprint, fingerprint_parts, normalize_answer, Fingerprint};
pub use metrics::{gini_coefficient, normalized_entropy, shannon_entropy, BatchDiversityReport};
pub use patterns::{classify_pattern, PatternType};
pub use similarity::{answer_similarity, jaccard, levenshtein, similarity, PuzzleSignature};
