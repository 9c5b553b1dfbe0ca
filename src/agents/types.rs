//! Core types for the puzzle orchestration loop.
//!
//! Defines the loop's stages, the progress events streamed to callers, the
//! per-attempt log, and the accepted-puzzle result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::diversity::{Fingerprint, PatternType};
use crate::puzzle::{Candidate, ThinkingTrace};
use crate::quality::QualityVerdict;

use super::difficulty_calibrator::CalibrationReport;
use super::quality_pipeline::QualityReport;
use super::uniqueness_validator::UniquenessReport;

/// Stage of one orchestration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForgeStage {
    Generating,
    ValidatingUniqueness,
    Calibrating,
    QualityChecking,
}

impl std::fmt::Display for ForgeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForgeStage::Generating => write!(f, "generating"),
            ForgeStage::ValidatingUniqueness => write!(f, "validating-uniqueness"),
            ForgeStage::Calibrating => write!(f, "calibrating"),
            ForgeStage::QualityChecking => write!(f, "quality-checking"),
        }
    }
}

/// How an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Cleared the quality threshold with a publish verdict.
    Accepted,
    /// Fully scored but below the threshold; eligible as best-so-far.
    Scored,
    /// Discarded as an exact or near-exact duplicate.
    Duplicate,
    /// A stage failed; the attempt is spent.
    Failed,
    /// A fatal error stopped the loop during this attempt.
    Aborted,
}

impl AttemptOutcome {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Accepted => "accepted",
            AttemptOutcome::Scored => "below_threshold",
            AttemptOutcome::Duplicate => "duplicate",
            AttemptOutcome::Failed => "failed",
            AttemptOutcome::Aborted => "aborted",
        }
    }
}

/// One line of a run's attempt log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptSummary {
    /// 1-based attempt index.
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub answer: Option<String>,
    pub final_score: Option<f64>,
    pub verdict: Option<QualityVerdict>,
    pub detail: Option<String>,
    pub duration_ms: u64,
}

/// A puzzle the orchestrator accepted, with everything derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedPuzzle {
    pub candidate: Candidate,
    pub thinking: ThinkingTrace,
    pub fingerprint: Fingerprint,
    pub pattern: PatternType,
    pub uniqueness: UniquenessReport,
    pub uniqueness_score: f64,
    pub calibration: CalibrationReport,
    pub quality: QualityReport,
    pub final_score: f64,
    /// Attempt that produced this puzzle.
    pub attempt: u32,
    /// Attempts used by the run.
    pub attempts_used: u32,
    /// Accepted through the acceptable-floor fallback.
    pub degraded: bool,
    /// Written to the historical store.
    pub persisted: bool,
    pub elapsed_ms: u64,
    pub attempts: Vec<AttemptSummary>,
    pub accepted_at: DateTime<Utc>,
    /// Fatal error that stopped the loop before this fallback was chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_by: Option<String>,
    /// Reset time when the loop was stopped by quota exhaustion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_reset: Option<DateTime<Utc>>,
}

impl AcceptedPuzzle {
    pub fn id(&self) -> Uuid {
        self.candidate.id()
    }

    pub fn calibrated_difficulty(&self) -> u8 {
        self.calibration.calibrated
    }

    /// True when quota exhaustion ended the run that produced this puzzle.
    pub fn stopped_by_quota(&self) -> bool {
        self.quota_reset.is_some()
    }
}

/// Progress events streamed from an orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ForgeEvent {
    /// A run started.
    RunStarted {
        category: String,
        target_difficulty: u8,
        max_attempts: u32,
        timestamp: DateTime<Utc>,
    },
    /// An attempt entered a stage.
    StageStarted {
        attempt: u32,
        stage: ForgeStage,
        timestamp: DateTime<Utc>,
    },
    /// An attempt was discarded as a duplicate.
    DuplicateDiscarded {
        attempt: u32,
        similarity: f64,
        timestamp: DateTime<Utc>,
    },
    /// An attempt was fully scored.
    AttemptScored {
        attempt: u32,
        final_score: f64,
        verdict: QualityVerdict,
        timestamp: DateTime<Utc>,
    },
    /// A stage failed and the attempt is spent.
    AttemptFailed {
        attempt: u32,
        stage: ForgeStage,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// The run accepted a puzzle.
    Accepted {
        attempt: u32,
        answer: String,
        final_score: f64,
        degraded: bool,
        total_duration_ms: u64,
    },
    /// The run ended without an acceptable puzzle.
    Exhausted {
        attempts: u32,
        best_score: Option<f64>,
        timestamp: DateTime<Utc>,
    },
    /// A fatal error stopped the run.
    Aborted {
        error: String,
        reset_at: Option<DateTime<Utc>>,
        timestamp: DateTime<Utc>,
    },
}

impl ForgeEvent {
    /// Creates a RunStarted event.
    pub fn run_started(category: impl Into<String>, target_difficulty: u8, max_attempts: u32) -> Self {
        Self::RunStarted {
            category: category.into(),
            target_difficulty,
            max_attempts,
            timestamp: Utc::now(),
        }
    }

    /// Creates a StageStarted event.
    pub fn stage_started(attempt: u32, stage: ForgeStage) -> Self {
        Self::StageStarted {
            attempt,
            stage,
            timestamp: Utc::now(),
        }
    }

    pub fn duplicate_discarded(attempt: u32, similarity: f64) -> Self {
        Self::DuplicateDiscarded {
            attempt,
            similarity,
            timestamp: Utc::now(),
        }
    }

    pub fn attempt_scored(attempt: u32, final_score: f64, verdict: QualityVerdict) -> Self {
        Self::AttemptScored {
            attempt,
            final_score,
            verdict,
            timestamp: Utc::now(),
        }
    }

    pub fn attempt_failed(attempt: u32, stage: ForgeStage, error: impl Into<String>) -> Self {
        Self::AttemptFailed {
            attempt,
            stage,
            error: error.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn accepted(puzzle: &AcceptedPuzzle) -> Self {
        Self::Accepted {
            attempt: puzzle.attempt,
            answer: puzzle.candidate.answer().to_string(),
            final_score: puzzle.final_score,
            degraded: puzzle.degraded,
            total_duration_ms: puzzle.elapsed_ms,
        }
    }

    pub fn exhausted(attempts: u32, best_score: Option<f64>) -> Self {
        Self::Exhausted {
            attempts,
            best_score,
            timestamp: Utc::now(),
        }
    }

    pub fn aborted(error: impl Into<String>, reset_at: Option<DateTime<Utc>>) -> Self {
        Self::Aborted {
            error: error.into(),
            reset_at,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(ForgeStage::Generating.to_string(), "generating");
        assert_eq!(
            ForgeStage::ValidatingUniqueness.to_string(),
            "validating-uniqueness"
        );
        assert_eq!(ForgeStage::QualityChecking.to_string(), "quality-checking");
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(AttemptOutcome::Scored.label(), "below_threshold");
        assert_eq!(AttemptOutcome::Duplicate.label(), "duplicate");
    }

    #[test]
    fn test_event_serializes_with_variant_tag() {
        let event = ForgeEvent::attempt_failed(2, ForgeStage::Calibrating, "timed out");
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["AttemptFailed"]["attempt"], 2);
        assert_eq!(value["AttemptFailed"]["stage"], "calibrating");
    }
}
