//! Master Orchestrator for the puzzle generation loop.
//!
//! Each attempt runs four stages in order:
//! 1. **Generate** a candidate with its thinking trace
//! 2. **Validate uniqueness**; duplicates are discarded without scoring
//! 3. **Calibrate** difficulty
//! 4. **Quality check** (review plus optional adversarial pass)
//!
//! An attempt whose final score clears the quality threshold with a publish
//! verdict ends the run at once. Otherwise the loop continues until the
//! attempt budget is spent, then falls back to the best scored attempt if it
//! clears the acceptable floor. Every stage reports a [`StageOutcome`]; the
//! loop spends the attempt on `Retry` and stops on `Fatal`.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::categories::CategoryRegistry;
use crate::error::StoreError;
use crate::llm::GenerativeAdapter;
use crate::metrics::ForgeMetrics;
use crate::puzzle::GenerationBrief;
use crate::quality::QualityVerdict;
use crate::storage::{HistoricalStore, StoredPuzzle};

use super::difficulty_calibrator::{CalibrationReport, CalibratorConfig, DifficultyCalibrator};
use super::error::{AgentError, AgentResult, StageOutcome};
use super::generator::{GeneratedPuzzle, GeneratorConfig, PuzzleGenerator};
use super::quality_pipeline::{QualityPipeline, QualityPipelineConfig, QualityReport};
use super::types::{AcceptedPuzzle, AttemptOutcome, AttemptSummary, ForgeEvent, ForgeStage};
use super::uniqueness_validator::{UniquenessConfig, UniquenessReport, UniquenessValidator};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the Master Orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub generator: GeneratorConfig,
    pub uniqueness: UniquenessConfig,
    pub calibrator: CalibratorConfig,
    pub quality: QualityPipelineConfig,
    /// Generation attempts per run.
    pub max_attempts: u32,
    /// Final score that ends the run immediately with a publish verdict.
    pub quality_threshold: f64,
    /// Minimum final score for the best-so-far fallback.
    pub acceptable_floor: f64,
    /// Write accepted puzzles to the historical store.
    pub persist_on_success: bool,
    /// Recent answers passed to the generator as an avoid list.
    pub avoid_recent_answers: usize,
    pub avoid_window: ChronoDuration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorConfig::default(),
            uniqueness: UniquenessConfig::default(),
            calibrator: CalibratorConfig::default(),
            quality: QualityPipelineConfig::default(),
            max_attempts: 3,
            quality_threshold: 85.0,
            acceptable_floor: 70.0,
            persist_on_success: true,
            avoid_recent_answers: 20,
            avoid_window: ChronoDuration::days(14),
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = threshold;
        self
    }

    pub fn with_acceptable_floor(mut self, floor: f64) -> Self {
        self.acceptable_floor = floor;
        self
    }

    pub fn with_persist_on_success(mut self, persist: bool) -> Self {
        self.persist_on_success = persist;
        self
    }

    pub fn with_avoid_recent_answers(mut self, count: usize) -> Self {
        self.avoid_recent_answers = count;
        self
    }

    pub fn with_generator_config(mut self, config: GeneratorConfig) -> Self {
        self.generator = config;
        self
    }

    pub fn with_uniqueness_config(mut self, config: UniquenessConfig) -> Self {
        self.uniqueness = config;
        self
    }

    pub fn with_calibrator_config(mut self, config: CalibratorConfig) -> Self {
        self.calibrator = config;
        self
    }

    pub fn with_quality_config(mut self, config: QualityPipelineConfig) -> Self {
        self.quality = config;
        self
    }
}

// ============================================================================
// Best-so-far selection
// ============================================================================

/// Score of one fully evaluated attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttemptScore {
    pub attempt: u32,
    pub final_score: f64,
    pub verdict: QualityVerdict,
}

/// Highest-scoring attempt; ties go to the earliest.
pub fn select_best(scores: &[AttemptScore]) -> Option<AttemptScore> {
    scores.iter().copied().fold(None, |best, score| match best {
        Some(current) if current.final_score >= score.final_score => Some(current),
        _ => Some(score),
    })
}

/// Fallback choice once the budget is spent: the best non-reject attempt,
/// if it reaches `floor`.
pub fn degraded_choice(scores: &[AttemptScore], floor: f64) -> Option<AttemptScore> {
    let eligible: Vec<AttemptScore> = scores
        .iter()
        .copied()
        .filter(|s| s.verdict != QualityVerdict::Reject)
        .collect();
    select_best(&eligible).filter(|best| best.final_score >= floor)
}

// ============================================================================
// Attempts
// ============================================================================

/// An attempt that made it through every stage.
#[derive(Debug, Clone)]
struct ScoredAttempt {
    attempt: u32,
    generated: GeneratedPuzzle,
    uniqueness: UniquenessReport,
    calibration: CalibrationReport,
    quality: QualityReport,
}

impl ScoredAttempt {
    fn score(&self) -> AttemptScore {
        AttemptScore {
            attempt: self.attempt,
            final_score: self.quality.final_score(),
            verdict: self.quality.verdict(),
        }
    }

    fn to_stored(&self) -> StoredPuzzle {
        let candidate = &self.generated.candidate;
        StoredPuzzle {
            id: candidate.id(),
            fingerprint: self.uniqueness.fingerprint.clone(),
            content: candidate.content().to_string(),
            answer: candidate.answer().to_string(),
            category: candidate.category(),
            pattern: self.uniqueness.pattern,
            explanation: candidate.explanation().to_string(),
            difficulty: self.calibration.calibrated,
            quality_score: self.quality.final_score(),
            created_at: Utc::now(),
        }
    }
}

enum AttemptResult {
    Scored(Box<ScoredAttempt>),
    Duplicate(UniquenessReport),
    Failed { stage: ForgeStage, error: AgentError },
    Aborted { stage: ForgeStage, error: AgentError },
}

/// Unwraps a stage result or ends the attempt with its tag.
macro_rules! try_stage {
    ($stage:expr, $result:expr) => {
        match StageOutcome::from_result($result) {
            StageOutcome::Success(value) => value,
            StageOutcome::Retry(error) => {
                return AttemptResult::Failed {
                    stage: $stage,
                    error,
                }
            }
            StageOutcome::Fatal(error) => {
                return AttemptResult::Aborted {
                    stage: $stage,
                    error,
                }
            }
        }
    };
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Bounded-retry controller for one puzzle.
pub struct MasterOrchestrator {
    generator: PuzzleGenerator,
    uniqueness: UniquenessValidator,
    calibrator: DifficultyCalibrator,
    quality: QualityPipeline,
    store: Arc<dyn HistoricalStore>,
    metrics: Option<Arc<ForgeMetrics>>,
    events: Option<mpsc::Sender<ForgeEvent>>,
    publish_gate: Arc<Mutex<()>>,
    config: OrchestratorConfig,
}

impl std::fmt::Debug for MasterOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MasterOrchestrator {
    /// Agent name constant for identification.
    pub const AGENT_NAME: &'static str = "master_orchestrator";

    pub fn builder() -> MasterOrchestratorBuilder {
        MasterOrchestratorBuilder::new()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs the loop with the configured attempt budget.
    pub async fn run(&self, brief: &GenerationBrief) -> AgentResult<AcceptedPuzzle> {
        self.run_with_budget(brief, self.config.max_attempts).await
    }

    /// Runs the loop with an explicit attempt budget.
    pub async fn run_with_budget(
        &self,
        brief: &GenerationBrief,
        max_attempts: u32,
    ) -> AgentResult<AcceptedPuzzle> {
        let started = Instant::now();

        info!(
            category = %brief.category,
            target_difficulty = brief.target_difficulty,
            max_attempts,
            "Starting puzzle run"
        );
        self.emit(ForgeEvent::run_started(
            brief.category.slug(),
            brief.target_difficulty,
            max_attempts,
        ))
        .await;

        let brief = self.brief_with_recent_answers(brief).await?;
        let mut scored: Vec<ScoredAttempt> = Vec::new();
        let mut log: Vec<AttemptSummary> = Vec::new();
        let mut abort: Option<AgentError> = None;
        let mut attempts_used = 0;

        for attempt in 1..=max_attempts {
            attempts_used = attempt;
            let attempt_started = Instant::now();

            match self.run_attempt(attempt, &brief).await {
                AttemptResult::Scored(result) => {
                    let score = result.score();
                    self.emit(ForgeEvent::attempt_scored(attempt, score.final_score, score.verdict))
                        .await;
                    debug!(
                        attempt,
                        final_score = score.final_score,
                        verdict = %score.verdict,
                        "Attempt scored"
                    );

                    let clears = score.final_score >= self.config.quality_threshold
                        && score.verdict == QualityVerdict::Publish;
                    let outcome = if clears {
                        AttemptOutcome::Accepted
                    } else {
                        AttemptOutcome::Scored
                    };
                    log.push(summary(attempt, outcome, Some(&result), None, attempt_started));

                    if clears {
                        if let Some(accepted) = self
                            .accept(&result, attempts_used, false, &log, started, None)
                            .await?
                        {
                            self.record_attempt(AttemptOutcome::Accepted);
                            return Ok(accepted);
                        }
                        // Another run published the same fingerprint first.
                        if let Some(last) = log.last_mut() {
                            last.outcome = AttemptOutcome::Duplicate;
                            last.detail = Some("published concurrently".to_string());
                        }
                        self.record_attempt(AttemptOutcome::Duplicate);
                        continue;
                    }

                    self.record_attempt(AttemptOutcome::Scored);
                    scored.push(*result);
                }
                AttemptResult::Duplicate(report) => {
                    info!(
                        attempt,
                        similarity = report.nearest_similarity,
                        "Duplicate candidate discarded"
                    );
                    self.emit(ForgeEvent::duplicate_discarded(attempt, report.nearest_similarity))
                        .await;
                    self.record_attempt(AttemptOutcome::Duplicate);
                    log.push(summary(
                        attempt,
                        AttemptOutcome::Duplicate,
                        None,
                        report.recommendations.first().cloned(),
                        attempt_started,
                    ));
                }
                AttemptResult::Failed { stage, error } => {
                    warn!(attempt, stage = %stage, error = %error, "Attempt failed");
                    self.emit(ForgeEvent::attempt_failed(attempt, stage, error.to_string()))
                        .await;
                    self.record_attempt(AttemptOutcome::Failed);
                    log.push(summary(
                        attempt,
                        AttemptOutcome::Failed,
                        None,
                        Some(format!("{}: {}", stage, error)),
                        attempt_started,
                    ));
                }
                AttemptResult::Aborted { stage, error } => {
                    warn!(attempt, stage = %stage, error = %error, "Fatal error, stopping run");
                    self.emit(ForgeEvent::aborted(error.to_string(), error.quota_reset()))
                        .await;
                    self.record_attempt(AttemptOutcome::Aborted);
                    log.push(summary(
                        attempt,
                        AttemptOutcome::Aborted,
                        None,
                        Some(format!("{}: {}", stage, error)),
                        attempt_started,
                    ));
                    abort = Some(error);
                    break;
                }
            }
        }

        let scores: Vec<AttemptScore> = scored.iter().map(ScoredAttempt::score).collect();
        let best_score = select_best(&scores).map(|best| best.final_score);

        if let Some(choice) = degraded_choice(&scores, self.config.acceptable_floor) {
            if let Some(result) = scored.iter().find(|s| s.attempt == choice.attempt) {
                info!(
                    attempt = choice.attempt,
                    final_score = choice.final_score,
                    floor = self.config.acceptable_floor,
                    "Accepting best attempt above the floor"
                );
                if let Some(accepted) = self
                    .accept(result, attempts_used, true, &log, started, abort.as_ref())
                    .await?
                {
                    return Ok(accepted);
                }
            }
        }

        match abort {
            Some(error) => {
                self.record_run(if error.is_quota() { "quota" } else { "aborted" });
                Err(error)
            }
            None => {
                warn!(
                    attempts = attempts_used,
                    best_score = ?best_score,
                    "No acceptable puzzle; nothing persisted"
                );
                self.emit(ForgeEvent::exhausted(attempts_used, best_score)).await;
                self.record_run("exhausted");
                Err(AgentError::Exhausted {
                    attempts: attempts_used,
                    best_score,
                })
            }
        }
    }

    async fn run_attempt(&self, attempt: u32, brief: &GenerationBrief) -> AttemptResult {
        debug!(attempt, "Starting attempt");

        self.emit(ForgeEvent::stage_started(attempt, ForgeStage::Generating))
            .await;
        let generated = try_stage!(ForgeStage::Generating, self.generator.generate(brief).await);

        self.emit(ForgeEvent::stage_started(attempt, ForgeStage::ValidatingUniqueness))
            .await;
        let assessment = try_stage!(
            ForgeStage::ValidatingUniqueness,
            self.uniqueness.validate(&generated.candidate).await
        );
        if assessment.report.is_duplicate() {
            return AttemptResult::Duplicate(assessment.report);
        }

        self.emit(ForgeEvent::stage_started(attempt, ForgeStage::Calibrating))
            .await;
        let calibration = try_stage!(
            ForgeStage::Calibrating,
            self.calibrator
                .calibrate(
                    &generated.candidate,
                    generated.candidate.proposed_difficulty(),
                    &assessment.category_usage,
                )
                .await
        );

        self.emit(ForgeEvent::stage_started(attempt, ForgeStage::QualityChecking))
            .await;
        let quality = try_stage!(
            ForgeStage::QualityChecking,
            self.quality.evaluate(&generated.candidate).await
        );

        AttemptResult::Scored(Box::new(ScoredAttempt {
            attempt,
            generated,
            uniqueness: assessment.report,
            calibration,
            quality,
        }))
    }

    /// Publishes (when configured) and builds the result. `None` means the
    /// fingerprint was published by another run in the meantime.
    async fn accept(
        &self,
        result: &ScoredAttempt,
        attempts_used: u32,
        degraded: bool,
        log: &[AttemptSummary],
        started: Instant,
        stopped_by: Option<&AgentError>,
    ) -> AgentResult<Option<AcceptedPuzzle>> {
        let persisted = if self.config.persist_on_success {
            if !self.publish(result).await? {
                return Ok(None);
            }
            true
        } else {
            false
        };

        let accepted = AcceptedPuzzle {
            candidate: result.generated.candidate.clone(),
            thinking: result.generated.thinking.clone(),
            fingerprint: result.uniqueness.fingerprint.clone(),
            pattern: result.uniqueness.pattern,
            uniqueness_score: result.uniqueness.uniqueness_score(),
            uniqueness: result.uniqueness.clone(),
            calibration: result.calibration.clone(),
            quality: result.quality.clone(),
            final_score: result.quality.final_score(),
            attempt: result.attempt,
            attempts_used,
            degraded,
            persisted,
            elapsed_ms: started.elapsed().as_millis() as u64,
            attempts: log.to_vec(),
            accepted_at: Utc::now(),
            stopped_by: stopped_by.map(|e| e.to_string()),
            quota_reset: stopped_by.and_then(AgentError::quota_reset),
        };

        info!(
            id = %accepted.id(),
            answer = %accepted.candidate.answer(),
            final_score = accepted.final_score,
            difficulty = accepted.calibrated_difficulty(),
            attempts = attempts_used,
            degraded,
            "Puzzle accepted"
        );
        self.emit(ForgeEvent::accepted(&accepted)).await;
        self.record_run(if degraded { "degraded" } else { "accepted" });
        if let Some(metrics) = &self.metrics {
            metrics.observe_final_score(accepted.final_score);
        }
        Ok(Some(accepted))
    }

    /// Re-checks the fingerprint and inserts under the shared publish gate.
    async fn publish(&self, result: &ScoredAttempt) -> AgentResult<bool> {
        let _gate = self.publish_gate.lock().await;

        let fingerprint = &result.uniqueness.fingerprint;
        if self.store.find_by_fingerprint(fingerprint).await?.is_some() {
            warn!(fingerprint = %fingerprint, "Fingerprint published by another run");
            return Ok(false);
        }
        match self.store.insert_on_publish(&result.to_stored()).await {
            Ok(()) => Ok(true),
            Err(StoreError::DuplicateFingerprint(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn brief_with_recent_answers(
        &self,
        brief: &GenerationBrief,
    ) -> AgentResult<GenerationBrief> {
        if !brief.avoid_answers.is_empty() || self.config.avoid_recent_answers == 0 {
            return Ok(brief.clone());
        }
        let recent = self
            .store
            .find_recent(self.config.avoid_window, self.config.avoid_recent_answers)
            .await?;
        let answers = recent.into_iter().map(|p| p.answer).collect();
        Ok(brief.clone().with_avoid_answers(answers))
    }

    /// Sends an event through the channel, ignoring send errors.
    async fn emit(&self, event: ForgeEvent) {
        if let Some(tx) = &self.events {
            // Receiver may have been dropped
            let _ = tx.send(event).await;
        }
    }

    fn record_attempt(&self, outcome: AttemptOutcome) {
        if let Some(metrics) = &self.metrics {
            metrics.record_attempt(outcome.label());
        }
    }

    fn record_run(&self, result: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_run(result);
        }
    }
}

fn summary(
    attempt: u32,
    outcome: AttemptOutcome,
    result: Option<&ScoredAttempt>,
    detail: Option<String>,
    started: Instant,
) -> AttemptSummary {
    AttemptSummary {
        attempt,
        outcome,
        answer: result.map(|r| r.generated.candidate.answer().to_string()),
        final_score: result.map(|r| r.quality.final_score()),
        verdict: result.map(|r| r.quality.verdict()),
        detail,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`MasterOrchestrator`].
#[derive(Default)]
pub struct MasterOrchestratorBuilder {
    adapter: Option<GenerativeAdapter>,
    store: Option<Arc<dyn HistoricalStore>>,
    categories: Option<Arc<CategoryRegistry>>,
    metrics: Option<Arc<ForgeMetrics>>,
    events: Option<mpsc::Sender<ForgeEvent>>,
    publish_gate: Option<Arc<Mutex<()>>>,
    config: OrchestratorConfig,
}

impl MasterOrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the adapter every stage calls through.
    pub fn adapter(mut self, adapter: GenerativeAdapter) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn store(mut self, store: Arc<dyn HistoricalStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn categories(mut self, categories: Arc<CategoryRegistry>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn metrics(mut self, metrics: Arc<ForgeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn events(mut self, events: mpsc::Sender<ForgeEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Shares a publish gate with other orchestrators writing to the same store.
    pub fn publish_gate(mut self, gate: Arc<Mutex<()>>) -> Self {
        self.publish_gate = Some(gate);
        self
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> AgentResult<MasterOrchestrator> {
        let adapter = self.adapter.ok_or_else(|| {
            AgentError::ConfigurationError("orchestrator requires a generative adapter".to_string())
        })?;
        let store = self.store.ok_or_else(|| {
            AgentError::ConfigurationError("orchestrator requires a historical store".to_string())
        })?;
        let categories = self
            .categories
            .unwrap_or_else(|| Arc::new(CategoryRegistry::with_defaults()));
        let config = self.config;

        Ok(MasterOrchestrator {
            generator: PuzzleGenerator::new(
                adapter.clone(),
                Arc::clone(&categories),
                config.generator.clone(),
            ),
            uniqueness: UniquenessValidator::new(Arc::clone(&store), config.uniqueness.clone()),
            calibrator: DifficultyCalibrator::new(
                adapter.clone(),
                categories,
                config.calibrator.clone(),
            ),
            quality: QualityPipeline::new(adapter, config.quality.clone()),
            store,
            metrics: self.metrics,
            events: self.events,
            publish_gate: self.publish_gate.unwrap_or_default(),
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::PuzzleCategory;
    use crate::error::LlmError;
    use crate::llm::{
        Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, RetryPolicy, Usage,
    };
    use crate::storage::InMemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    fn score(attempt: u32, final_score: f64, verdict: QualityVerdict) -> AttemptScore {
        AttemptScore {
            attempt,
            final_score,
            verdict,
        }
    }

    #[test]
    fn test_select_best_prefers_earliest_on_tie() {
        let scores = [
            score(1, 72.0, QualityVerdict::Revise),
            score(2, 80.0, QualityVerdict::Revise),
            score(3, 80.0, QualityVerdict::Revise),
        ];
        assert_eq!(select_best(&scores).map(|s| s.attempt), Some(2));
        assert_eq!(select_best(&[]), None);
    }

    #[test]
    fn test_degraded_choice_applies_floor() {
        let scores = [
            score(1, 55.0, QualityVerdict::Reject),
            score(2, 72.0, QualityVerdict::Revise),
            score(3, 68.0, QualityVerdict::Revise),
        ];
        assert_eq!(degraded_choice(&scores, 70.0).map(|s| s.attempt), Some(2));

        let low = [
            score(1, 40.0, QualityVerdict::Reject),
            score(2, 55.0, QualityVerdict::Reject),
            score(3, 60.0, QualityVerdict::Revise),
        ];
        assert_eq!(degraded_choice(&low, 70.0), None);
    }

    #[test]
    fn test_degraded_choice_skips_rejects() {
        let scores = [
            score(1, 81.5, QualityVerdict::Reject),
            score(2, 74.0, QualityVerdict::Revise),
        ];
        assert_eq!(degraded_choice(&scores, 70.0).map(|s| s.attempt), Some(2));
    }

    /// Answers by schema name; generation replies are consumed in order.
    struct MockLlmProvider {
        generations: StdMutex<Vec<String>>,
        reviews: StdMutex<Vec<f64>>,
        calls: StdMutex<HashMap<String, usize>>,
    }

    impl MockLlmProvider {
        fn new(answers: &[&str], overall: &[f64]) -> Self {
            Self {
                generations: StdMutex::new(answers.iter().map(|a| generation(a)).collect()),
                reviews: StdMutex::new(overall.to_vec()),
                calls: StdMutex::new(HashMap::new()),
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

    fn generation(answer: &str) -> String {
        json!({
            "thinking": {"brainstorm": [answer], "chosenConcept": answer, "reasoning": "fits"},
            "puzzle": {
                "content": "🦁👑",
                "answer": answer,
                "category": "movies",
                "explanation": "A lion wearing a crown",
                "hints": ["Disney"],
                "difficulty": 3
            }
        })
        .to_string()
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

            let content = match schema.as_str() {
                "puzzle_generation" => {
                    let mut queue = self.generations.lock().expect("lock not poisoned");
                    if queue.is_empty() {
                        return Err(LlmError::ApiError {
                            code: 400,
                            message: "no more generations".to_string(),
                        });
                    }
                    queue.remove(0)
                }
                "difficulty_self_assessment" => json!({
                    "solvingSteps": ["lion", "crown"],
                    "ahaMoment": "king of beasts",
                    "finalAnswerGuess": "The Lion King",
                    "perceivedDifficulty": 3,
                    "timeBucket": "instant",
                    "requiredKnowledge": [],
                    "trickiness": 2,
                    "isSolvable": true,
                    "isWellCrafted": true,
                    "improvements": []
                })
                .to_string(),
                "quality_review" => {
                    let mut queue = self.reviews.lock().expect("lock not poisoned");
                    let overall = if queue.is_empty() { 0.0 } else { queue.remove(0) };
                    json!({
                        "scores": {
                            "clarity": overall, "creativity": overall, "solvability": overall,
                            "appropriateness": overall, "visualAppeal": overall,
                            "educationalValue": overall, "funFactor": overall, "overall": overall
                        },
                        "analysis": {
                            "strengths": [], "weaknesses": [],
                            "improvements": ["tighten the encoding"], "verdict": "good"
                        },
                        "detailedFeedback": ""
                    })
                    .to_string()
                }
                other => {
                    return Err(LlmError::ApiError {
                        code: 400,
                        message: format!("unexpected schema {}", other),
                    })
                }
            };

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

    fn orchestrator(
        provider: Arc<MockLlmProvider>,
        store: Arc<InMemoryStore>,
        events: Option<mpsc::Sender<ForgeEvent>>,
    ) -> MasterOrchestrator {
        let config = OrchestratorConfig::default()
            .with_quality_config(QualityPipelineConfig::new().with_adversarial(false));
        let mut builder = MasterOrchestrator::builder()
            .adapter(GenerativeAdapter::new(provider).with_retry(RetryPolicy::none()))
            .store(store)
            .config(config);
        if let Some(tx) = events {
            builder = builder.events(tx);
        }
        builder.build().expect("build orchestrator")
    }

    #[tokio::test]
    async fn test_accepted_puzzle_is_persisted_and_streamed() {
        let provider = Arc::new(MockLlmProvider::new(&["The Lion King"], &[92.0]));
        let store = Arc::new(InMemoryStore::new());
        let (tx, mut rx) = mpsc::channel(64);
        let agent = orchestrator(provider.clone(), store.clone(), Some(tx));

        let accepted = agent
            .run(&GenerationBrief::new(PuzzleCategory::Movies, 3))
            .await
            .expect("accepted");
        drop(agent);

        assert!(!accepted.degraded);
        assert!(accepted.persisted);
        assert_eq!(accepted.attempts_used, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(provider.calls("puzzle_generation"), 1);

        let mut stages = Vec::new();
        let mut saw_accepted = false;
        while let Some(event) = rx.recv().await {
            match event {
                ForgeEvent::StageStarted { stage, .. } => stages.push(stage),
                ForgeEvent::Accepted { .. } => saw_accepted = true,
                _ => {}
            }
        }
        assert_eq!(
            stages,
            vec![
                ForgeStage::Generating,
                ForgeStage::ValidatingUniqueness,
                ForgeStage::Calibrating,
                ForgeStage::QualityChecking,
            ]
        );
        assert!(saw_accepted);
    }

    #[tokio::test]
    async fn test_rejected_attempt_then_accept() {
        let provider = Arc::new(MockLlmProvider::new(&["Madagascar", "Zootopia"], &[50.0, 88.0]));
        let store = Arc::new(InMemoryStore::new());
        let agent = orchestrator(provider.clone(), store, None);

        let accepted = agent
            .run(&GenerationBrief::new(PuzzleCategory::Movies, 3))
            .await
            .expect("accepted on attempt 2");
        assert_eq!(accepted.attempt, 2);
        assert_eq!(accepted.candidate.answer(), "Zootopia");
        assert_eq!(accepted.attempts[0].outcome, AttemptOutcome::Scored);
        assert_eq!(provider.calls("puzzle_generation"), 2);
    }

    #[tokio::test]
    async fn test_builder_requires_store() {
        let provider = Arc::new(MockLlmProvider::new(&[], &[]));
        let result = MasterOrchestrator::builder()
            .adapter(GenerativeAdapter::new(provider))
            .build();
        assert!(matches!(result, Err(AgentError::ConfigurationError(_))));
    }
}
