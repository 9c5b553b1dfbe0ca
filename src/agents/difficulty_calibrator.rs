//! Difficulty Calibrator Agent.
//!
//! Fuses three independent estimates into one calibrated difficulty:
//! - the author's proposed value (weight 0.3)
//! - the structural profile's overall score (weight 0.3)
//! - the perceived difficulty from a blind self-assessment (weight 0.4)
//!
//! For the self-assessment the model sees the puzzle body and category only.
//! It never sees the answer, explanation or hints.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::categories::CategoryRegistry;
use crate::difficulty::{
    fuse_difficulty, structural_profile, CalibrationRecommendation, CategoryUsage, DifficultyLevel,
    DifficultyProfile, TimeBucket,
};
use crate::diversity::{answer_similarity, normalize_answer};
use crate::llm::{GenerativeAdapter, ModelTier, StructuredOutput, StructuredRequest, DEFAULT_CALL_TIMEOUT};
use crate::puzzle::{Candidate, MAX_DIFFICULTY, MIN_DIFFICULTY};

use super::error::{AgentError, AgentResult};

/// Schema name for the self-assessment contract.
pub const SELF_ASSESSMENT_SCHEMA: &str = "difficulty_self_assessment";

/// Answer similarity at which the blind guess counts as a solve.
const GUESS_MATCH_THRESHOLD: f64 = 0.8;

const SYSTEM_PROMPT: &str = r#"You are a puzzle solver testing new emoji-rebus puzzles before release.

You do NOT know the answer. Solve the puzzle step by step, as a player would, and report honestly
how hard it was. If you cannot solve it, say so and still give your best guess.

Output ONLY the JSON object described by the schema."#;

const USER_PROMPT_TEMPLATE: &str = r#"Category: {category}
Puzzle: {content}

Solve it step by step, then report:
- solvingSteps: each step of your reasoning
- ahaMoment: the moment it clicked (or "none")
- finalAnswerGuess: your answer
- perceivedDifficulty: 1-10
- timeBucket: one of instant, quick, moderate, challenging, very_hard
- requiredKnowledge: knowledge tags a player needs
- trickiness: 1-10
- isSolvable: whether a typical player can solve it
- isWellCrafted: whether every symbol pulls its weight
- improvements: concrete suggestions"#;

/// JSON schema for [`SelfAssessment`].
pub fn self_assessment_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": [
            "solvingSteps", "ahaMoment", "finalAnswerGuess", "perceivedDifficulty",
            "timeBucket", "requiredKnowledge", "trickiness", "isSolvable",
            "isWellCrafted", "improvements"
        ],
        "properties": {
            "solvingSteps": {"type": "array", "items": {"type": "string"}},
            "ahaMoment": {"type": "string"},
            "finalAnswerGuess": {"type": "string"},
            "perceivedDifficulty": {"type": "integer", "minimum": 1, "maximum": 10},
            "timeBucket": {
                "type": "string",
                "enum": ["instant", "quick", "moderate", "challenging", "very_hard"]
            },
            "requiredKnowledge": {"type": "array", "items": {"type": "string"}},
            "trickiness": {"type": "integer", "minimum": 1, "maximum": 10},
            "isSolvable": {"type": "boolean"},
            "isWellCrafted": {"type": "boolean"},
            "improvements": {"type": "array", "items": {"type": "string"}}
        }
    })
}

/// Blind solve report from the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfAssessment {
    #[serde(default)]
    pub solving_steps: Vec<String>,
    #[serde(default)]
    pub aha_moment: String,
    #[serde(default)]
    pub final_answer_guess: String,
    pub perceived_difficulty: i64,
    pub time_bucket: TimeBucket,
    #[serde(default)]
    pub required_knowledge: Vec<String>,
    pub trickiness: i64,
    pub is_solvable: bool,
    pub is_well_crafted: bool,
    #[serde(default)]
    pub improvements: Vec<String>,
}

impl StructuredOutput for SelfAssessment {
    fn validate(&self) -> Result<(), String> {
        let range = i64::from(MIN_DIFFICULTY)..=i64::from(MAX_DIFFICULTY);
        if !range.contains(&self.perceived_difficulty) {
            return Err(format!(
                "perceivedDifficulty {} outside 1-10",
                self.perceived_difficulty
            ));
        }
        if !range.contains(&self.trickiness) {
            return Err(format!("trickiness {} outside 1-10", self.trickiness));
        }
        Ok(())
    }
}

impl SelfAssessment {
    /// Perceived difficulty as a validated 1-10 value.
    pub fn perceived(&self) -> u8 {
        self.perceived_difficulty
            .clamp(i64::from(MIN_DIFFICULTY), i64::from(MAX_DIFFICULTY)) as u8
    }
}

/// Calibration result for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub proposed: u8,
    pub structural: DifficultyProfile,
    pub self_assessment: SelfAssessment,
    pub calibrated: u8,
    /// `|calibrated - proposed|`.
    pub delta: u8,
    pub level: DifficultyLevel,
    pub recommendation: CalibrationRecommendation,
    pub message: String,
    /// Whether the blind guess matched the real answer.
    pub guessed_correctly: bool,
}

impl CalibrationReport {
    /// Builds the report from the three estimates.
    pub fn fuse(
        proposed: u8,
        structural: DifficultyProfile,
        self_assessment: SelfAssessment,
        answer: &str,
    ) -> Self {
        let calibrated = fuse_difficulty(proposed, structural.overall, self_assessment.perceived());
        let delta = calibrated.abs_diff(proposed);
        let recommendation = CalibrationRecommendation::from_delta(delta);
        let guessed_correctly = answer_similarity(
            &normalize_answer(&self_assessment.final_answer_guess),
            &normalize_answer(answer),
        ) >= GUESS_MATCH_THRESHOLD;

        Self {
            proposed,
            structural,
            calibrated,
            delta,
            level: DifficultyLevel::from_value(calibrated),
            message: recommendation.message(proposed, calibrated),
            recommendation,
            guessed_correctly,
            self_assessment,
        }
    }
}

/// Configuration for the Difficulty Calibrator.
#[derive(Debug, Clone)]
pub struct CalibratorConfig {
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub model_tier: ModelTier,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 1500,
            timeout: DEFAULT_CALL_TIMEOUT,
            model_tier: ModelTier::Fast,
        }
    }
}

impl CalibratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_model_tier(mut self, tier: ModelTier) -> Self {
        self.model_tier = tier;
        self
    }
}

/// Difficulty Calibrator Agent.
pub struct DifficultyCalibrator {
    adapter: GenerativeAdapter,
    categories: Arc<CategoryRegistry>,
    config: CalibratorConfig,
}

impl std::fmt::Debug for DifficultyCalibrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DifficultyCalibrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DifficultyCalibrator {
    /// Agent name constant for identification.
    pub const AGENT_NAME: &'static str = "difficulty_calibrator";

    pub fn new(
        adapter: GenerativeAdapter,
        categories: Arc<CategoryRegistry>,
        config: CalibratorConfig,
    ) -> Self {
        Self {
            adapter,
            categories,
            config,
        }
    }

    pub fn config(&self) -> &CalibratorConfig {
        &self.config
    }

    /// Structural profile of a candidate given recent category usage.
    pub fn structural_profile(
        &self,
        candidate: &Candidate,
        usage: &CategoryUsage,
    ) -> AgentResult<DifficultyProfile> {
        let strategy = self.categories.get(candidate.category()).ok_or_else(|| {
            AgentError::ConfigurationError(format!(
                "no strategy registered for category '{}'",
                candidate.category()
            ))
        })?;
        Ok(structural_profile(candidate, strategy, usage))
    }

    /// Calibrates `proposed` for `candidate` with a blind self-assessment.
    pub async fn calibrate(
        &self,
        candidate: &Candidate,
        proposed: u8,
        usage: &CategoryUsage,
    ) -> AgentResult<CalibrationReport> {
        let structural = self.structural_profile(candidate, usage)?;
        let assessment = self.self_assess(candidate).await?;

        let report = CalibrationReport::fuse(
            proposed.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY),
            structural,
            assessment,
            candidate.answer(),
        );

        debug!(
            agent = Self::AGENT_NAME,
            proposed = report.proposed,
            structural = structural.overall,
            perceived = report.self_assessment.perceived(),
            calibrated = report.calibrated,
            recommendation = %report.recommendation,
            "Difficulty calibrated"
        );
        Ok(report)
    }

    async fn self_assess(&self, candidate: &Candidate) -> AgentResult<SelfAssessment> {
        let prompt = USER_PROMPT_TEMPLATE
            .replace("{category}", candidate.category().slug())
            .replace("{content}", candidate.content());

        let request = StructuredRequest::new(SELF_ASSESSMENT_SCHEMA, prompt, self_assessment_schema())
            .with_system_instructions(SYSTEM_PROMPT)
            .with_temperature(self.config.temperature)
            .with_model_tier(self.config.model_tier)
            .with_timeout(self.config.timeout)
            .with_max_tokens(self.config.max_tokens);

        Ok(self.adapter.request(&request).await?)
    }
}
