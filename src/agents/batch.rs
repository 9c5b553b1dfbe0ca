//! Batch generation over many briefs.
//!
//! Each item is an independent orchestration run with a smaller attempt
//! budget. Target difficulties follow a [`DifficultyProgression`] and
//! categories cycle through the configured list. Diversity across the batch
//! is measured and reported, never enforced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use rand::{RngExt, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::categories::PuzzleCategory;
use crate::diversity::BatchDiversityReport;
use crate::puzzle::{GenerationBrief, MAX_DIFFICULTY, MIN_DIFFICULTY};

use super::orchestrator::MasterOrchestrator;
use super::types::AcceptedPuzzle;

/// How target difficulty moves across a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DifficultyProgression {
    /// Evenly spaced from `start` to `end`.
    Linear { start: u8, end: u8 },
    /// Cycles low, mid, high, mid.
    Oscillating { low: u8, high: u8 },
    /// Uniform in `[min, max]`; seeded runs are reproducible.
    BoundedRandom {
        min: u8,
        max: u8,
        #[serde(default)]
        seed: Option<u64>,
    },
}

impl Default for DifficultyProgression {
    fn default() -> Self {
        Self::Linear { start: 3, end: 7 }
    }
}

fn clamp_difficulty(value: u8) -> u8 {
    value.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

impl DifficultyProgression {
    /// Parses a CLI name (`linear`, `oscillating`, `random`) with bounds.
    pub fn from_name(name: &str, low: u8, high: u8, seed: Option<u64>) -> Result<Self, String> {
        match name.to_ascii_lowercase().as_str() {
            "linear" => Ok(Self::Linear {
                start: low,
                end: high,
            }),
            "oscillating" => Ok(Self::Oscillating { low, high }),
            "random" | "bounded-random" | "bounded_random" => Ok(Self::BoundedRandom {
                min: low,
                max: high,
                seed,
            }),
            other => Err(format!(
                "unknown progression '{}' (expected linear, oscillating or random)",
                other
            )),
        }
    }

    /// Target difficulty for each of `count` items, each within 1-10.
    pub fn targets(&self, count: usize) -> Vec<u8> {
        match *self {
            Self::Linear { start, end } => {
                let (start, end) = (clamp_difficulty(start), clamp_difficulty(end));
                if count <= 1 {
                    return vec![start; count];
                }
                let span = f64::from(end) - f64::from(start);
                (0..count)
                    .map(|i| {
                        let step = span * i as f64 / (count - 1) as f64;
                        clamp_difficulty((f64::from(start) + step).round() as u8)
                    })
                    .collect()
            }
            Self::Oscillating { low, high } => {
                let (low, high) = ordered(low, high);
                let mid = low + (high - low) / 2;
                let cycle = [low, mid, high, mid];
                (0..count).map(|i| cycle[i % cycle.len()]).collect()
            }
            Self::BoundedRandom { min, max, seed } => {
                let (min, max) = ordered(min, max);
                let mut rng = match seed {
                    Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                    None => ChaCha8Rng::from_rng(&mut rand::rng()),
                };
                (0..count).map(|_| rng.random_range(min..=max)).collect()
            }
        }
    }
}

fn ordered(a: u8, b: u8) -> (u8, u8) {
    let (a, b) = (clamp_difficulty(a), clamp_difficulty(b));
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Configuration for a batch.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub count: usize,
    /// Attempt budget of each item's run.
    pub attempts_per_item: u32,
    /// Runs in flight at once.
    pub concurrency: usize,
    /// Categories assigned round-robin.
    pub categories: Vec<PuzzleCategory>,
    pub progression: DifficultyProgression,
    pub theme: Option<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            count: 10,
            attempts_per_item: 2,
            concurrency: 1,
            categories: PuzzleCategory::all(),
            progression: DifficultyProgression::default(),
            theme: None,
        }
    }
}

impl BatchConfig {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    pub fn with_attempts_per_item(mut self, attempts: u32) -> Self {
        self.attempts_per_item = attempts;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_categories(mut self, categories: Vec<PuzzleCategory>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_progression(mut self, progression: DifficultyProgression) -> Self {
        self.progression = progression;
        self
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    /// One brief per item.
    pub fn briefs(&self) -> Vec<GenerationBrief> {
        let categories = if self.categories.is_empty() {
            PuzzleCategory::all()
        } else {
            self.categories.clone()
        };
        self.progression
            .targets(self.count)
            .into_iter()
            .zip(categories.into_iter().cycle())
            .map(|(target, category)| {
                let brief = GenerationBrief::new(category, target);
                match &self.theme {
                    Some(theme) => brief.with_theme(theme.clone()),
                    None => brief,
                }
            })
            .collect()
    }
}

/// An item that produced no puzzle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItemFailure {
    /// 0-based position in the batch.
    pub index: usize,
    pub category: PuzzleCategory,
    pub target_difficulty: u8,
    pub error: String,
    /// The item was never started because the batch halted.
    pub skipped: bool,
    pub quota: bool,
}

/// Result of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub requested: usize,
    pub accepted: Vec<AcceptedPuzzle>,
    pub failures: Vec<BatchItemFailure>,
    /// Set when a quota error stopped the remaining items.
    pub halted_reason: Option<String>,
    pub diversity: BatchDiversityReport,
    pub elapsed_ms: u64,
}

impl BatchReport {
    pub fn success_rate(&self) -> f64 {
        if self.requested == 0 {
            return 0.0;
        }
        self.accepted.len() as f64 / self.requested as f64
    }

    pub fn is_halted(&self) -> bool {
        self.halted_reason.is_some()
    }
}

enum ItemResult {
    Accepted(usize, Box<AcceptedPuzzle>),
    Failed(BatchItemFailure),
}

impl ItemResult {
    fn index(&self) -> usize {
        match self {
            ItemResult::Accepted(index, _) => *index,
            ItemResult::Failed(failure) => failure.index,
        }
    }

    fn quota_reason(&self) -> Option<String> {
        match self {
            ItemResult::Accepted(_, puzzle) if puzzle.stopped_by_quota() => puzzle.stopped_by.clone(),
            ItemResult::Failed(failure) if failure.quota => Some(failure.error.clone()),
            _ => None,
        }
    }
}

/// Runs a batch of independent orchestrations.
pub struct BatchGenerator {
    orchestrator: Arc<MasterOrchestrator>,
    config: BatchConfig,
}

impl std::fmt::Debug for BatchGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchGenerator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BatchGenerator {
    pub fn new(orchestrator: Arc<MasterOrchestrator>, config: BatchConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub async fn run(&self) -> BatchReport {
        let started = Instant::now();
        let briefs = self.config.briefs();
        let budget = self.config.attempts_per_item.max(1);
        let halted = AtomicBool::new(false);

        info!(
            count = briefs.len(),
            attempts_per_item = budget,
            concurrency = self.config.concurrency.max(1),
            "Starting batch"
        );

        let halted = &halted;
        let mut results: Vec<ItemResult> = stream::iter(briefs.into_iter().enumerate().map(
            |(index, brief)| async move {
                let failure = |error: String, skipped: bool, quota: bool| {
                    ItemResult::Failed(BatchItemFailure {
                        index,
                        category: brief.category,
                        target_difficulty: brief.target_difficulty,
                        error,
                        skipped,
                        quota,
                    })
                };

                if halted.load(Ordering::SeqCst) {
                    return failure("batch halted".to_string(), true, false);
                }

                match self.orchestrator.run_with_budget(&brief, budget).await {
                    Ok(accepted) => {
                        info!(
                            item = index,
                            answer = %accepted.candidate.answer(),
                            final_score = accepted.final_score,
                            "Batch item accepted"
                        );
                        if accepted.stopped_by_quota() {
                            halted.store(true, Ordering::SeqCst);
                            warn!(item = index, "Quota exhausted after a fallback, halting batch");
                        }
                        ItemResult::Accepted(index, Box::new(accepted))
                    }
                    Err(e) => {
                        let quota = e.is_quota();
                        if quota {
                            halted.store(true, Ordering::SeqCst);
                            warn!(item = index, error = %e, "Quota exhausted, halting batch");
                        } else {
                            warn!(item = index, error = %e, "Batch item failed");
                        }
                        failure(e.to_string(), false, quota)
                    }
                }
            },
        ))
        .buffer_unordered(self.config.concurrency.max(1))
        .collect()
        .await;

        results.sort_by_key(ItemResult::index);
        let halted_reason = results.iter().find_map(ItemResult::quota_reason);

        let mut accepted = Vec::new();
        let mut failures = Vec::new();
        for result in results {
            match result {
                ItemResult::Accepted(_, puzzle) => accepted.push(*puzzle),
                ItemResult::Failed(failure) => failures.push(failure),
            }
        }

        let entries: Vec<_> = accepted
            .iter()
            .map(|p| (p.pattern, p.candidate.category()))
            .collect();
        let diversity = BatchDiversityReport::calculate(&entries);

        info!(
            requested = self.config.count,
            accepted = accepted.len(),
            failed = failures.len(),
            pattern_entropy = diversity.pattern_entropy,
            halted = halted_reason.is_some(),
            "Batch complete"
        );
        if !diversity.repeated_patterns.is_empty() {
            warn!(patterns = ?diversity.repeated_patterns, "Patterns repeated across batch");
        }

        BatchReport {
            requested: self.config.count,
            accepted,
            failures,
            halted_reason,
            diversity,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_targets() {
        let progression = DifficultyProgression::Linear { start: 2, end: 8 };
        assert_eq!(progression.targets(4), vec![2, 4, 6, 8]);
        assert_eq!(progression.targets(1), vec![2]);
        assert!(progression.targets(0).is_empty());

        let descending = DifficultyProgression::Linear { start: 9, end: 5 };
        assert_eq!(descending.targets(3), vec![9, 7, 5]);
    }

    #[test]
    fn test_oscillating_targets() {
        let progression = DifficultyProgression::Oscillating { low: 2, high: 8 };
        assert_eq!(progression.targets(6), vec![2, 5, 8, 5, 2, 5]);
    }

    #[test]
    fn test_bounded_random_is_seeded_and_bounded() {
        let progression = DifficultyProgression::BoundedRandom {
            min: 7,
            max: 3,
            seed: Some(42),
        };
        let first = progression.targets(20);
        assert_eq!(first, progression.targets(20));
        assert!(first.iter().all(|d| (3..=7).contains(d)));
    }

    #[test]
    fn test_targets_are_clamped() {
        let progression = DifficultyProgression::Linear { start: 0, end: 15 };
        let targets = progression.targets(3);
        assert_eq!(targets.first(), Some(&1));
        assert_eq!(targets.last(), Some(&10));
    }

    #[test]
    fn test_from_name() {
        assert_eq!(
            DifficultyProgression::from_name("random", 2, 6, Some(1)),
            Ok(DifficultyProgression::BoundedRandom {
                min: 2,
                max: 6,
                seed: Some(1)
            })
        );
        assert!(DifficultyProgression::from_name("spiral", 1, 2, None).is_err());
    }

    #[test]
    fn test_briefs_cycle_categories() {
        let config = BatchConfig::new(3)
            .with_categories(vec![PuzzleCategory::Movies, PuzzleCategory::Music])
            .with_progression(DifficultyProgression::Linear { start: 4, end: 4 })
            .with_theme("space");
        let briefs = config.briefs();
        let categories: Vec<_> = briefs.iter().map(|b| b.category).collect();
        assert_eq!(
            categories,
            vec![PuzzleCategory::Movies, PuzzleCategory::Music, PuzzleCategory::Movies]
        );
        assert!(briefs.iter().all(|b| b.target_difficulty == 4));
        assert!(briefs.iter().all(|b| b.theme.as_deref() == Some("space")));
    }

    #[test]
    fn test_progression_serde_tag() {
        let value = serde_json::to_value(DifficultyProgression::Oscillating { low: 2, high: 6 })
            .expect("serialize");
        assert_eq!(value["kind"], "oscillating");
    }
}
