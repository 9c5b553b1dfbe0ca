//! Deterministic publish/revise/reject policy.
//!
//! `final_score = overall * 0.7 + robustness * 0.3` when the adversarial stage
//! ran, otherwise `overall`. Rules, first match wins:
//! 1. overall >= 70 and the adversarial stage was skipped or passed: publish
//! 2. final >= 60 and no critical attack: revise
//! 3. otherwise: reject

use serde::{Deserialize, Serialize};
use std::fmt;

use super::adversarial::AdversarialReport;
use super::metrics::{clamp_score, QualityMetrics};

/// Weight of the Stage A overall score when Stage B ran.
pub const OVERALL_WEIGHT: f64 = 0.7;

/// Weight of the robustness score when Stage B ran.
pub const ROBUSTNESS_WEIGHT: f64 = 0.3;

/// Minimum Stage A overall to publish.
pub const PUBLISH_MIN_OVERALL: f64 = 70.0;

/// Minimum final score to revise instead of reject.
pub const REVISE_MIN_FINAL: f64 = 60.0;

/// Pipeline decision for a reviewed candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityVerdict {
    Publish,
    Revise,
    Reject,
}

impl fmt::Display for QualityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityVerdict::Publish => write!(f, "publish"),
            QualityVerdict::Revise => write!(f, "revise"),
            QualityVerdict::Reject => write!(f, "reject"),
        }
    }
}

/// Verdict, final score and the action items for a revise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityDecision {
    pub verdict: QualityVerdict,
    pub final_score: f64,
    pub action_items: Vec<String>,
}

/// Blends Stage A and Stage B into the final score.
pub fn final_score(overall: f64, adversarial: Option<&AdversarialReport>) -> f64 {
    let overall = clamp_score(overall);
    match adversarial {
        Some(report) => clamp_score(
            overall * OVERALL_WEIGHT + clamp_score(report.robustness) * ROBUSTNESS_WEIGHT,
        ),
        None => overall,
    }
}

/// Applies the verdict policy.
pub fn decide(metrics: &QualityMetrics, adversarial: Option<&AdversarialReport>) -> QualityDecision {
    let overall = metrics.overall();
    let final_score = final_score(overall, adversarial);
    let stage_b_ok = adversarial.map_or(true, |report| report.passed());
    let critical = adversarial.is_some_and(|report| report.has_critical());

    if overall >= PUBLISH_MIN_OVERALL && stage_b_ok {
        return QualityDecision {
            verdict: QualityVerdict::Publish,
            final_score,
            action_items: Vec::new(),
        };
    }

    if final_score >= REVISE_MIN_FINAL && !critical {
        let mut action_items = metrics.improvements.clone();
        if let Some(report) = adversarial {
            action_items.extend(report.actionable_suggestions().map(str::to_string));
        }
        return QualityDecision {
            verdict: QualityVerdict::Revise,
            final_score,
            action_items,
        };
    }

    QualityDecision {
        verdict: QualityVerdict::Reject,
        final_score,
        action_items: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::adversarial::{Attack, AttackSeverity, RobustnessScale};
    use crate::quality::metrics::{DimensionScores, ReviewVerdict};

    fn metrics(overall: f64) -> QualityMetrics {
        QualityMetrics::new(
            DimensionScores {
                overall,
                ..Default::default()
            },
            vec![],
            vec![],
            vec!["Use a clearer crown emoji".to_string()],
            ReviewVerdict::Good,
            "",
        )
    }

    fn report(robustness: f64, passes: bool, severities: &[AttackSeverity]) -> AdversarialReport {
        let attacks = severities
            .iter()
            .map(|&severity| Attack {
                attack_type: "ambiguity".to_string(),
                issue: "issue".to_string(),
                severity,
                suggestion: format!("fix {}", severity),
            })
            .collect();
        AdversarialReport::new(attacks, robustness, passes, RobustnessScale::Strict)
    }

    #[test]
    fn test_final_score_blend() {
        assert_eq!(final_score(80.0, None), 80.0);
        let stage_b = report(50.0, true, &[]);
        assert!((final_score(80.0, Some(&stage_b)) - 71.0).abs() < 1e-9);
    }

    #[test]
    fn test_publish_without_stage_b() {
        let decision = decide(&metrics(70.0), None);
        assert_eq!(decision.verdict, QualityVerdict::Publish);
        assert!(decision.action_items.is_empty());
    }

    #[test]
    fn test_publish_requires_stage_b_pass() {
        let passed = report(90.0, true, &[AttackSeverity::Minor]);
        assert_eq!(decide(&metrics(85.0), Some(&passed)).verdict, QualityVerdict::Publish);

        let failed = report(90.0, false, &[AttackSeverity::Major]);
        let decision = decide(&metrics(85.0), Some(&failed));
        assert_eq!(decision.verdict, QualityVerdict::Revise);
        assert_eq!(
            decision.action_items,
            vec!["Use a clearer crown emoji".to_string(), "fix major".to_string()]
        );
    }

    #[test]
    fn test_critical_attack_forces_reject() {
        let critical = report(90.0, true, &[AttackSeverity::Critical]);
        let decision = decide(&metrics(85.0), Some(&critical));
        assert_eq!(decision.verdict, QualityVerdict::Reject);
    }

    #[test]
    fn test_revise_band() {
        let decision = decide(&metrics(65.0), None);
        assert_eq!(decision.verdict, QualityVerdict::Revise);
        assert_eq!(decision.final_score, 65.0);
    }

    #[test]
    fn test_reject_below_floor() {
        assert_eq!(decide(&metrics(59.0), None).verdict, QualityVerdict::Reject);

        // 0.7 * 68 + 0.3 * 40 = 59.6
        let weak = report(40.0, false, &[]);
        assert_eq!(decide(&metrics(68.0), Some(&weak)).verdict, QualityVerdict::Reject);
    }
}
