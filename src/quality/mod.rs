//! Quality scoring and verdict policy.
//!
//! This module holds the data side of the two-stage quality pipeline: clamped
//! Stage A metrics, normalized Stage B adversarial reports, and the
//! deterministic verdict policy that combines them. The LLM-facing stages live
//! in [`crate::agents::quality_pipeline`].

mod adversarial;
mod metrics;
mod verdict;

pub use adversarial::{
    normalize_robustness, AdversarialReport, Attack, AttackSeverity, RobustnessScale,
    ScoreAnomaly,
};
pub use metrics::{clamp_score, DimensionScores, QualityMetrics, ReviewVerdict};
pub use verdict::{
    decide, final_score, QualityDecision, QualityVerdict, PUBLISH_MIN_OVERALL, REVISE_MIN_FINAL,
};
