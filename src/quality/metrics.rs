//! Quality metrics for a reviewed puzzle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest quality score.
pub const SCORE_MIN: f64 = 0.0;

/// Highest quality score.
pub const SCORE_MAX: f64 = 100.0;

/// Clamps a raw score into [0, 100]. NaN becomes 0.
pub fn clamp_score(raw: f64) -> f64 {
    if raw.is_nan() {
        return SCORE_MIN;
    }
    raw.clamp(SCORE_MIN, SCORE_MAX)
}

/// The reviewer's categorical verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Excellent,
    Good,
    Acceptable,
    NeedsWork,
    Reject,
}

impl fmt::Display for ReviewVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReviewVerdict::Excellent => "excellent",
            ReviewVerdict::Good => "good",
            ReviewVerdict::Acceptable => "acceptable",
            ReviewVerdict::NeedsWork => "needs_work",
            ReviewVerdict::Reject => "reject",
        };
        write!(f, "{}", name)
    }
}

/// Seven dimension scores plus overall, as reported by the reviewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionScores {
    pub clarity: f64,
    pub creativity: f64,
    pub solvability: f64,
    pub appropriateness: f64,
    pub visual_appeal: f64,
    pub educational_value: f64,
    pub fun_factor: f64,
    pub overall: f64,
}

impl DimensionScores {
    /// Copy with every score clamped to [0, 100].
    pub fn clamped(&self) -> Self {
        Self {
            clarity: clamp_score(self.clarity),
            creativity: clamp_score(self.creativity),
            solvability: clamp_score(self.solvability),
            appropriateness: clamp_score(self.appropriateness),
            visual_appeal: clamp_score(self.visual_appeal),
            educational_value: clamp_score(self.educational_value),
            fun_factor: clamp_score(self.fun_factor),
            overall: clamp_score(self.overall),
        }
    }

    /// Scores in declaration order, overall last.
    pub fn values(&self) -> [f64; 8] {
        [
            self.clarity,
            self.creativity,
            self.solvability,
            self.appropriateness,
            self.visual_appeal,
            self.educational_value,
            self.fun_factor,
            self.overall,
        ]
    }
}

/// Stage A result: clamped scores, free-text analysis and the verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub scores: DimensionScores,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub improvements: Vec<String>,
    pub verdict: ReviewVerdict,
    pub feedback: String,
    /// True when any reported score was outside [0, 100].
    pub clamped: bool,
}

impl QualityMetrics {
    pub fn new(
        raw_scores: DimensionScores,
        strengths: Vec<String>,
        weaknesses: Vec<String>,
        improvements: Vec<String>,
        verdict: ReviewVerdict,
        feedback: impl Into<String>,
    ) -> Self {
        let scores = raw_scores.clamped();
        Self {
            clamped: scores != raw_scores,
            scores,
            strengths,
            weaknesses,
            improvements,
            verdict,
            feedback: feedback.into(),
        }
    }

    pub fn overall(&self) -> f64 {
        self.scores.overall
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_score() {
        assert_eq!(clamp_score(-3.0), 0.0);
        assert_eq!(clamp_score(140.0), 100.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(77.5), 77.5);
    }

    #[test]
    fn test_metrics_clamp_every_dimension() {
        let raw = DimensionScores {
            clarity: 120.0,
            creativity: -5.0,
            solvability: 80.0,
            appropriateness: 100.0,
            visual_appeal: 1000.0,
            educational_value: 50.0,
            fun_factor: f64::NAN,
            overall: 101.0,
        };
        let metrics = QualityMetrics::new(raw, vec![], vec![], vec![], ReviewVerdict::Good, "");

        assert!(metrics.clamped);
        for score in metrics.scores.values() {
            assert!((0.0..=100.0).contains(&score));
        }
        assert_eq!(metrics.overall(), 100.0);
    }

    #[test]
    fn test_in_range_scores_are_untouched() {
        let raw = DimensionScores {
            overall: 82.0,
            ..Default::default()
        };
        let metrics = QualityMetrics::new(raw, vec![], vec![], vec![], ReviewVerdict::Good, "");
        assert!(!metrics.clamped);
        assert_eq!(metrics.scores, raw);
    }

    #[test]
    fn test_verdict_serde() {
        let verdict: ReviewVerdict = serde_json::from_str("\"needs_work\"").expect("parse");
        assert_eq!(verdict, ReviewVerdict::NeedsWork);
        assert_eq!(verdict.to_string(), "needs_work");
    }
}
