//! Quality Pipeline Agent.
//!
//! Stage A scores the candidate on seven dimensions and is always run.
//! Stage B is an adversarial review that hunts for ambiguity, alternate
//! answers, bias and logical flaws; callers can skip it to save a call.
//! The verdict itself is the deterministic policy in [`crate::quality::decide`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::llm::{GenerativeAdapter, ModelTier, StructuredOutput, StructuredRequest, DEFAULT_CALL_TIMEOUT};
use crate::puzzle::Candidate;
use crate::quality::{
    decide, AdversarialReport, Attack, DimensionScores, QualityDecision, QualityMetrics,
    QualityVerdict, ReviewVerdict, RobustnessScale, ScoreAnomaly,
};

use super::error::AgentResult;

/// Schema name for the Stage A review.
pub const QUALITY_SCHEMA: &str = "quality_review";

/// Schema name for the Stage B review.
pub const ADVERSARIAL_SCHEMA: &str = "adversarial_review";

const QUALITY_SYSTEM_PROMPT: &str = r#"You are the senior editor of a daily emoji-rebus puzzle game.

Score the puzzle from 0 to 100 on each dimension:
- clarity: every symbol has one clear role
- creativity: the encoding is fresh, not the obvious literal pick
- solvability: a typical player can get there
- appropriateness: family friendly, no stereotypes
- visualAppeal: the emoji sequence reads well
- educationalValue: the player learns or recalls something
- funFactor: the aha moment is satisfying

Then give an overall score, strengths, weaknesses, concrete improvements and a verdict:
excellent, good, acceptable, needs_work or reject.

Output ONLY the JSON object described by the schema."#;

const ADVERSARIAL_SYSTEM_PROMPT: &str = r#"You are a hostile reviewer trying to break a puzzle before release.

Attack it: look for ambiguity, alternate valid answers, cultural bias, logical inconsistency,
and symbols that give the answer away. Rate each attack critical, major or minor and suggest a fix.
Report overallRobustness from 0 to 100 (100 = no weaknesses found).

Output ONLY the JSON object described by the schema."#;

const REVIEW_PROMPT_TEMPLATE: &str = r#"Category: {category}
Puzzle: {content}
Answer: {answer}
Explanation: {explanation}
Hints: {hints}
Author difficulty: {difficulty}/10"#;

/// JSON schema for [`QualityReviewContract`].
pub fn quality_schema() -> serde_json::Value {
    let score = json!({"type": "number", "minimum": 0, "maximum": 100});
    let strings = json!({"type": "array", "items": {"type": "string"}});
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["scores", "analysis", "detailedFeedback"],
        "properties": {
            "scores": {
                "type": "object",
                "additionalProperties": false,
                "required": [
                    "clarity", "creativity", "solvability", "appropriateness",
                    "visualAppeal", "educationalValue", "funFactor", "overall"
                ],
                "properties": {
                    "clarity": score,
                    "creativity": score,
                    "solvability": score,
                    "appropriateness": score,
                    "visualAppeal": score,
                    "educationalValue": score,
                    "funFactor": score,
                    "overall": score
                }
            },
            "analysis": {
                "type": "object",
                "additionalProperties": false,
                "required": ["strengths", "weaknesses", "improvements", "verdict"],
                "properties": {
                    "strengths": strings,
                    "weaknesses": strings,
                    "improvements": strings,
                    "verdict": {
                        "type": "string",
                        "enum": ["excellent", "good", "acceptable", "needs_work", "reject"]
                    }
                }
            },
            "detailedFeedback": {"type": "string"}
        }
    })
}

/// JSON schema for [`AdversarialContract`].
pub fn adversarial_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["attacks", "overallRobustness", "passesAdversarialTest"],
        "properties": {
            "attacks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["attackType", "issue", "severity", "suggestion"],
                    "properties": {
                        "attackType": {"type": "string"},
                        "issue": {"type": "string"},
                        "severity": {"type": "string", "enum": ["critical", "major", "minor"]},
                        "suggestion": {"type": "string"}
                    }
                }
            },
            "overallRobustness": {"type": "number", "minimum": 0, "maximum": 100},
            "passesAdversarialTest": {"type": "boolean"}
        }
    })
}

/// Free-text part of the Stage A response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewAnalysis {
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    pub verdict: ReviewVerdict,
}

/// Stage A response contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReviewContract {
    pub scores: DimensionScores,
    pub analysis: ReviewAnalysis,
    #[serde(default)]
    pub detailed_feedback: String,
}

impl StructuredOutput for QualityReviewContract {
    fn validate(&self) -> Result<(), String> {
        if self.scores.values().iter().any(|s| !s.is_finite()) {
            return Err("scores must be finite numbers".to_string());
        }
        Ok(())
    }
}

impl QualityReviewContract {
    /// Clamped metrics for the verdict policy.
    pub fn into_metrics(self) -> QualityMetrics {
        QualityMetrics::new(
            self.scores,
            self.analysis.strengths,
            self.analysis.weaknesses,
            self.analysis.improvements,
            self.analysis.verdict,
            self.detailed_feedback,
        )
    }
}

/// Stage B response contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdversarialContract {
    #[serde(default)]
    pub attacks: Vec<Attack>,
    pub overall_robustness: f64,
    pub passes_adversarial_test: bool,
}

impl StructuredOutput for AdversarialContract {
    fn validate(&self) -> Result<(), String> {
        if !self.overall_robustness.is_finite() {
            return Err("overallRobustness must be a finite number".to_string());
        }
        Ok(())
    }
}

/// Both stages and the resulting decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub metrics: QualityMetrics,
    pub adversarial: Option<AdversarialReport>,
    pub decision: QualityDecision,
}

impl QualityReport {
    /// Applies the verdict policy to the stage results.
    pub fn new(metrics: QualityMetrics, adversarial: Option<AdversarialReport>) -> Self {
        let decision = decide(&metrics, adversarial.as_ref());
        Self {
            metrics,
            adversarial,
            decision,
        }
    }

    pub fn final_score(&self) -> f64 {
        self.decision.final_score
    }

    pub fn verdict(&self) -> QualityVerdict {
        self.decision.verdict
    }
}

/// Configuration for the Quality Pipeline.
#[derive(Debug, Clone)]
pub struct QualityPipelineConfig {
    /// Run Stage B.
    pub run_adversarial: bool,
    /// How to treat a robustness value that looks like a 0-1 fraction.
    pub robustness_scale: RobustnessScale,
    pub review_temperature: f64,
    pub adversarial_temperature: f64,
    pub timeout: Duration,
    pub model_tier: ModelTier,
}

impl Default for QualityPipelineConfig {
    fn default() -> Self {
        Self {
            run_adversarial: true,
            robustness_scale: RobustnessScale::Strict,
            review_temperature: 0.3,
            adversarial_temperature: 0.5,
            timeout: DEFAULT_CALL_TIMEOUT,
            model_tier: ModelTier::Smart,
        }
    }
}

impl QualityPipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_adversarial(mut self, enabled: bool) -> Self {
        self.run_adversarial = enabled;
        self
    }

    pub fn with_robustness_scale(mut self, scale: RobustnessScale) -> Self {
        self.robustness_scale = scale;
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

/// Quality Pipeline Agent.
pub struct QualityPipeline {
    adapter: GenerativeAdapter,
    config: QualityPipelineConfig,
}

impl std::fmt::Debug for QualityPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl QualityPipeline {
    /// Agent name constant for identification.
    pub const AGENT_NAME: &'static str = "quality_pipeline";

    pub fn new(adapter: GenerativeAdapter, config: QualityPipelineConfig) -> Self {
        Self { adapter, config }
    }

    pub fn config(&self) -> &QualityPipelineConfig {
        &self.config
    }

    /// Runs Stage A, then Stage B when enabled, and applies the verdict policy.
    pub async fn evaluate(&self, candidate: &Candidate) -> AgentResult<QualityReport> {
        let prompt = review_prompt(candidate);

        let metrics = self.review(&prompt).await?;
        let adversarial = if self.config.run_adversarial {
            Some(self.attack(&prompt).await?)
        } else {
            None
        };

        let report = QualityReport::new(metrics, adversarial);
        debug!(
            agent = Self::AGENT_NAME,
            overall = report.metrics.overall(),
            robustness = report.adversarial.as_ref().map(|a| a.robustness),
            final_score = report.final_score(),
            verdict = %report.verdict(),
            "Quality evaluated"
        );
        Ok(report)
    }

    async fn review(&self, prompt: &str) -> AgentResult<QualityMetrics> {
        let request = StructuredRequest::new(QUALITY_SCHEMA, prompt, quality_schema())
            .with_system_instructions(QUALITY_SYSTEM_PROMPT)
            .with_temperature(self.config.review_temperature)
            .with_model_tier(self.config.model_tier)
            .with_timeout(self.config.timeout);

        let contract: QualityReviewContract = self.adapter.request(&request).await?;
        let metrics = contract.into_metrics();
        if metrics.clamped {
            warn!(
                agent = Self::AGENT_NAME,
                "Quality review reported scores outside 0-100; clamped"
            );
        }
        Ok(metrics)
    }

    async fn attack(&self, prompt: &str) -> AgentResult<AdversarialReport> {
        let request = StructuredRequest::new(ADVERSARIAL_SCHEMA, prompt, adversarial_schema())
            .with_system_instructions(ADVERSARIAL_SYSTEM_PROMPT)
            .with_temperature(self.config.adversarial_temperature)
            .with_model_tier(self.config.model_tier)
            .with_timeout(self.config.timeout);

        let contract: AdversarialContract = self.adapter.request(&request).await?;
        let report = AdversarialReport::new(
            contract.attacks,
            contract.overall_robustness,
            contract.passes_adversarial_test,
            self.config.robustness_scale,
        );

        match &report.anomaly {
            Some(ScoreAnomaly::FractionalScale { raw }) => warn!(
                agent = Self::AGENT_NAME,
                raw = *raw,
                used = report.robustness,
                "Robustness looks like a 0-1 fraction"
            ),
            Some(ScoreAnomaly::OutOfRange { raw }) => warn!(
                agent = Self::AGENT_NAME,
                raw = *raw,
                used = report.robustness,
                "Robustness outside 0-100; clamped"
            ),
            None => {}
        }
        Ok(report)
    }
}

fn review_prompt(candidate: &Candidate) -> String {
    let hints = if candidate.hints().is_empty() {
        "(none)".to_string()
    } else {
        candidate.hints().join(" | ")
    };
    REVIEW_PROMPT_TEMPLATE
        .replace("{category}", candidate.category().slug())
        .replace("{content}", candidate.content())
        .replace("{answer}", candidate.answer())
        .replace("{explanation}", candidate.explanation())
        .replace("{hints}", &hints)
        .replace("{difficulty}", &candidate.proposed_difficulty().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::PuzzleCategory;
    use crate::error::LlmError;
    use crate::llm::{
        Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, RetryPolicy, Usage,
    };
    use crate::quality::AttackSeverity;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::Mutex;

    /// Answers by schema name and counts calls per schema.
    struct MockLlmProvider {
        responses: HashMap<String, String>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl MockLlmProvider {
        fn new(responses: &[(&str, String)]) -> Self {
            Self {
                responses: responses
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                calls: Mutex::new(HashMap::new()),
            }
        }

        fn calls(&self, schema: &str) -> usize {
            self.calls
                .lock()
                .expect("lock not poisoned")
                .get(schema)
                .copied()
                .unwrap_or(0)
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlmProvider {
        async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
            let schema = request.schema_name().unwrap_or_default().to_string();
            *self
                .calls
                .lock()
                .expect("lock not poisoned")
                .entry(schema.clone())
                .or_insert(0) += 1;
            let content = self.responses.get(&schema).cloned().ok_or_else(|| {
                LlmError::ApiError {
                    code: 400,
                    message: format!("unexpected schema {}", schema),
                }
            })?;
            Ok(GenerationResponse {
                id: "mock-id".to_string(),
                model: "mock-model".to_string(),
                choices: vec![Choice {
                    index: 0,
                    message: Message::assistant(content),
                    finish_reason: "stop".to_string(),
                }],
                usage: Usage::default(),
            })
        }
    }

    fn review_json(overall: f64) -> String {
        json!({
            "scores": {
                "clarity": 90, "creativity": 85, "solvability": 88, "appropriateness": 100,
                "visualAppeal": 80, "educationalValue": 60, "funFactor": 84, "overall": overall
            },
            "analysis": {
                "strengths": ["Clean two-symbol encoding"],
                "weaknesses": ["Magnifier is a common trope"],
                "improvements": ["Try a net instead of a magnifier"],
                "verdict": "good"
            },
            "detailedFeedback": "Solid."
        })
        .to_string()
    }

    fn adversarial_json(robustness: f64, passes: bool, severity: &str) -> String {
        json!({
            "attacks": [{
                "attackType": "alternate_answer",
                "issue": "Could read as 'Shark Tale'",
                "severity": severity,
                "suggestion": "Use a clownfish-specific cue"
            }],
            "overallRobustness": robustness,
            "passesAdversarialTest": passes
        })
        .to_string()
    }

    fn pipeline(provider: Arc<MockLlmProvider>, config: QualityPipelineConfig) -> QualityPipeline {
        QualityPipeline::new(
            GenerativeAdapter::new(provider).with_retry(RetryPolicy::none()),
            config,
        )
    }

    fn candidate() -> Candidate {
        Candidate::new(
            "🔍🐠",
            "Finding Nemo",
            PuzzleCategory::Movies,
            "Searching for a clownfish",
            vec!["Pixar".to_string()],
            4,
        )
    }

    #[tokio::test]
    async fn test_two_stage_publish() {
        let provider = Arc::new(MockLlmProvider::new(&[
            (QUALITY_SCHEMA, review_json(90.0)),
            (ADVERSARIAL_SCHEMA, adversarial_json(80.0, true, "minor")),
        ]));
        let agent = pipeline(provider.clone(), QualityPipelineConfig::default());

        let report = agent.evaluate(&candidate()).await.expect("evaluate");
        assert_eq!(report.verdict(), QualityVerdict::Publish);
        assert!((report.final_score() - 87.0).abs() < 1e-9);
        assert_eq!(provider.calls(QUALITY_SCHEMA), 1);
        assert_eq!(provider.calls(ADVERSARIAL_SCHEMA), 1);
    }

    #[tokio::test]
    async fn test_stage_b_can_be_skipped() {
        let provider = Arc::new(MockLlmProvider::new(&[(QUALITY_SCHEMA, review_json(75.0))]));
        let agent = pipeline(provider.clone(), QualityPipelineConfig::new().with_adversarial(false));

        let report = agent.evaluate(&candidate()).await.expect("evaluate");
        assert!(report.adversarial.is_none());
        assert_eq!(report.final_score(), 75.0);
        assert_eq!(report.verdict(), QualityVerdict::Publish);
        assert_eq!(provider.calls(ADVERSARIAL_SCHEMA), 0);
    }

    #[tokio::test]
    async fn test_critical_attack_rejects() {
        let provider = Arc::new(MockLlmProvider::new(&[
            (QUALITY_SCHEMA, review_json(80.0)),
            (ADVERSARIAL_SCHEMA, adversarial_json(40.0, false, "critical")),
        ]));
        let agent = pipeline(provider, QualityPipelineConfig::default());

        let report = agent.evaluate(&candidate()).await.expect("evaluate");
        // 80 * 0.7 + 40 * 0.3 = 68, but a critical attack blocks revise.
        assert_eq!(report.verdict(), QualityVerdict::Reject);
        let adversarial = report.adversarial.expect("stage b ran");
        assert_eq!(adversarial.attacks[0].severity, AttackSeverity::Critical);
    }

    #[tokio::test]
    async fn test_fractional_robustness_is_flagged_not_rescaled() {
        let provider = Arc::new(MockLlmProvider::new(&[
            (QUALITY_SCHEMA, review_json(90.0)),
            (ADVERSARIAL_SCHEMA, adversarial_json(0.9, true, "minor")),
        ]));
        let agent = pipeline(provider, QualityPipelineConfig::default());

        let report = agent.evaluate(&candidate()).await.expect("evaluate");
        let adversarial = report.adversarial.as_ref().expect("stage b ran");
        assert!(matches!(
            adversarial.anomaly,
            Some(ScoreAnomaly::FractionalScale { .. })
        ));
        assert!((adversarial.robustness - 0.9).abs() < 1e-9);
        // 90 * 0.7 + 0.9 * 0.3 = 63.27
        assert!((report.final_score() - 63.27).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_out_of_range_scores_are_clamped() {
        let provider = Arc::new(MockLlmProvider::new(&[(QUALITY_SCHEMA, review_json(130.0))]));
        let agent = pipeline(provider, QualityPipelineConfig::new().with_adversarial(false));

        let report = agent.evaluate(&candidate()).await.expect("evaluate");
        assert!(report.metrics.clamped);
        assert_eq!(report.final_score(), 100.0);
    }

    #[test]
    fn test_review_prompt_includes_answer_and_hints() {
        let prompt = review_prompt(&candidate());
        assert!(prompt.contains("Answer: Finding Nemo"));
        assert!(prompt.contains("Hints: Pixar"));
        assert!(prompt.contains("4/10"));
    }
}
