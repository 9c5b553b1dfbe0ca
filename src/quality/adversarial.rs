//! Adversarial robustness results and score normalization.
//!
//! The robustness contract is 0-100. A reported value in (0, 1] looks like a
//! fraction; how that is handled depends on [`RobustnessScale`]. Either way the
//! anomaly is recorded on the report.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::metrics::clamp_score;

/// Severity of a single adversarial finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackSeverity {
    Critical,
    Major,
    Minor,
}

impl fmt::Display for AttackSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttackSeverity::Critical => write!(f, "critical"),
            AttackSeverity::Major => write!(f, "major"),
            AttackSeverity::Minor => write!(f, "minor"),
        }
    }
}

/// One flaw found by the adversarial reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attack {
    /// e.g. "ambiguity", "alternate_answer", "bias", "logic".
    pub attack_type: String,
    pub issue: String,
    pub severity: AttackSeverity,
    #[serde(default)]
    pub suggestion: String,
}

/// How to treat robustness values that look like 0-1 fractions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobustnessScale {
    /// Treat the value as 0-100, clamp it, and flag fractional-looking values.
    #[default]
    Strict,
    /// Multiply values in (0, 1] by 100 before clamping. Still flagged.
    RescaleFractions,
}

impl FromStr for RobustnessScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(RobustnessScale::Strict),
            "rescale" | "rescale_fractions" => Ok(RobustnessScale::RescaleFractions),
            other => Err(format!("unknown robustness scale '{}'", other)),
        }
    }
}

/// Contract violation detected while normalizing a robustness score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreAnomaly {
    /// Value in (0, 1]; probably reported on a 0-1 scale.
    FractionalScale { raw: f64 },
    /// Value outside [0, 100] or not a number.
    OutOfRange { raw: f64 },
}

impl fmt::Display for ScoreAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreAnomaly::FractionalScale { raw } => {
                write!(f, "robustness {} looks like a 0-1 fraction", raw)
            }
            ScoreAnomaly::OutOfRange { raw } => write!(f, "robustness {} outside 0-100", raw),
        }
    }
}

/// Normalizes a reported robustness value to [0, 100].
pub fn normalize_robustness(raw: f64, scale: RobustnessScale) -> (f64, Option<ScoreAnomaly>) {
    if raw.is_nan() || !(0.0..=100.0).contains(&raw) {
        return (clamp_score(raw), Some(ScoreAnomaly::OutOfRange { raw }));
    }
    if raw > 0.0 && raw <= 1.0 {
        let anomaly = Some(ScoreAnomaly::FractionalScale { raw });
        return match scale {
            RobustnessScale::Strict => (raw, anomaly),
            RobustnessScale::RescaleFractions => (clamp_score(raw * 100.0), anomaly),
        };
    }
    (raw, None)
}

/// Stage B result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdversarialReport {
    pub attacks: Vec<Attack>,
    /// Normalized robustness in [0, 100].
    pub robustness: f64,
    /// Value as reported by the reviewer.
    pub raw_robustness: f64,
    /// The reviewer's own pass/fail judgment.
    pub passes_adversarial_test: bool,
    pub anomaly: Option<ScoreAnomaly>,
}

impl AdversarialReport {
    pub fn new(
        attacks: Vec<Attack>,
        raw_robustness: f64,
        passes_adversarial_test: bool,
        scale: RobustnessScale,
    ) -> Self {
        let (robustness, anomaly) = normalize_robustness(raw_robustness, scale);
        Self {
            attacks,
            robustness,
            raw_robustness,
            passes_adversarial_test,
            anomaly,
        }
    }

    pub fn has_critical(&self) -> bool {
        self.attacks
            .iter()
            .any(|a| a.severity == AttackSeverity::Critical)
    }

    /// The reviewer passed it and found nothing critical.
    pub fn passed(&self) -> bool {
        self.passes_adversarial_test && !self.has_critical()
    }

    /// Suggestions from critical and major attacks.
    pub fn actionable_suggestions(&self) -> impl Iterator<Item = &str> {
        self.attacks
            .iter()
            .filter(|a| a.severity != AttackSeverity::Minor && !a.suggestion.is_empty())
            .map(|a| a.suggestion.as_str())
    }
}
