//! Uniqueness Validator Agent.
//!
//! Classifies a candidate against published history. Checks run in order and
//! the strongest signal short-circuits:
//! 1. exact fingerprint match
//! 2. answer/symbol similarity against the most recent puzzles
//! 3. symbol-set reuse over a trailing window
//! 4. pattern-category frequency over a shorter trailing window
//!
//! Only the first two can make a candidate non-unique; the last two add flags
//! and recommendations.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::difficulty::CategoryUsage;
use crate::diversity::{
    classify_pattern, extract_components, fingerprint, jaccard, similarity, Fingerprint,
    PatternType, PuzzleSignature,
};
use crate::puzzle::Candidate;
use crate::storage::{HistoricalStore, StoredPuzzle};

use super::error::AgentResult;

/// Configuration for the Uniqueness Validator.
#[derive(Debug, Clone)]
pub struct UniquenessConfig {
    /// How many recent puzzles to compare against.
    pub recent_limit: usize,
    /// Age cap on the recent comparison set; `None` compares against the
    /// latest `recent_limit` puzzles regardless of age.
    pub recent_window: Option<Duration>,
    /// Similarity above this is recorded as a conflict.
    pub conflict_threshold: f64,
    /// Similarity above this makes the candidate a duplicate.
    pub hard_reject_threshold: f64,
    /// Window for symbol-set reuse and category usage.
    pub component_window: Duration,
    /// Max history rows read for the component window.
    pub component_limit: usize,
    /// Symbol-set Jaccard above this flags reuse.
    pub component_overlap_threshold: f64,
    /// Window for the pattern-frequency cap.
    pub pattern_window: Duration,
    /// Allowed uses of one pattern category within the pattern window.
    pub max_pattern_uses: usize,
}

impl Default for UniquenessConfig {
    fn default() -> Self {
        Self {
            recent_limit: 100,
            recent_window: None,
            conflict_threshold: 0.7,
            hard_reject_threshold: 0.8,
            component_window: Duration::days(30),
            component_limit: 500,
            component_overlap_threshold: 0.7,
            pattern_window: Duration::days(3),
            max_pattern_uses: 1,
        }
    }
}

impl UniquenessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recent_limit(mut self, limit: usize) -> Self {
        self.recent_limit = limit;
        self
    }

    pub fn with_recent_window(mut self, window: Duration) -> Self {
        self.recent_window = Some(window);
        self
    }

    pub fn with_conflict_threshold(mut self, threshold: f64) -> Self {
        self.conflict_threshold = threshold;
        self
    }

    pub fn with_hard_reject_threshold(mut self, threshold: f64) -> Self {
        self.hard_reject_threshold = threshold;
        self
    }

    pub fn with_component_window(mut self, window: Duration) -> Self {
        self.component_window = window;
        self
    }

    pub fn with_pattern_window(mut self, window: Duration) -> Self {
        self.pattern_window = window;
        self
    }

    pub fn with_max_pattern_uses(mut self, uses: usize) -> Self {
        self.max_pattern_uses = uses;
        self
    }
}

/// A stored puzzle the candidate resembles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: Uuid,
    pub answer: String,
    pub similarity: f64,
}

/// Outcome of the uniqueness checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniquenessReport {
    pub fingerprint: Fingerprint,
    pub is_unique: bool,
    /// Highest similarity among conflicts; 1.0 on an exact match, 0.0 when
    /// there are no conflicts.
    pub similarity_score: f64,
    /// Highest similarity against any compared puzzle.
    pub nearest_similarity: f64,
    pub conflicts: Vec<Conflict>,
    /// Puzzles whose symbol set overlaps the candidate's.
    pub component_reuse: Vec<Uuid>,
    pub pattern: PatternType,
    pub pattern_overused: bool,
    pub recommendations: Vec<String>,
}

impl UniquenessReport {
    /// Zero when not unique; otherwise 100 less similarity and conflict penalties.
    pub fn uniqueness_score(&self) -> f64 {
        if !self.is_unique {
            return 0.0;
        }
        let penalty = self.similarity_score * 30.0 + 10.0 * self.conflicts.len() as f64;
        (100.0 - penalty).max(0.0)
    }

    /// True when the orchestrator must discard the attempt.
    pub fn is_duplicate(&self) -> bool {
        !self.is_unique
    }
}

/// Uniqueness report plus the category mix of the component window, which
/// the difficulty calibrator reuses for pattern novelty.
#[derive(Debug, Clone)]
pub struct UniquenessAssessment {
    pub report: UniquenessReport,
    pub category_usage: CategoryUsage,
}

/// Uniqueness Validator Agent.
pub struct UniquenessValidator {
    store: Arc<dyn HistoricalStore>,
    config: UniquenessConfig,
}

impl std::fmt::Debug for UniquenessValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniquenessValidator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl UniquenessValidator {
    /// Agent name constant for identification.
    pub const AGENT_NAME: &'static str = "uniqueness_validator";

    pub fn new(store: Arc<dyn HistoricalStore>, config: UniquenessConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &UniquenessConfig {
        &self.config
    }

    /// Runs the ordered checks for `candidate`.
    pub async fn validate(&self, candidate: &Candidate) -> AgentResult<UniquenessAssessment> {
        let digest = fingerprint(candidate);
        let components = extract_components(candidate.content());
        let pattern = classify_pattern(&components, candidate.explanation());

        if let Some(existing) = self.store.find_by_fingerprint(&digest).await? {
            debug!(
                agent = Self::AGENT_NAME,
                existing = %existing.id,
                "Exact fingerprint match"
            );
            let report = UniquenessReport {
                fingerprint: digest,
                is_unique: false,
                similarity_score: 1.0,
                nearest_similarity: 1.0,
                conflicts: vec![Conflict {
                    id: existing.id,
                    answer: existing.answer.clone(),
                    similarity: 1.0,
                }],
                component_reuse: Vec::new(),
                pattern,
                pattern_overused: false,
                recommendations: vec![format!(
                    "Exact duplicate of published puzzle '{}'; generate a different concept",
                    existing.answer
                )],
            };
            return Ok(UniquenessAssessment {
                report,
                category_usage: CategoryUsage::default(),
            });
        }

        let recent_window = self
            .config
            .recent_window
            .unwrap_or_else(|| Utc::now() - DateTime::<Utc>::UNIX_EPOCH);
        let recent = self
            .store
            .find_recent(recent_window, self.config.recent_limit)
            .await?;
        let signature = PuzzleSignature::of(candidate);
        let (conflicts, nearest) = self.find_conflicts(&signature, &recent);
        let similarity_score = conflicts.first().map_or(0.0, |c| c.similarity);
        let mut recommendations = Vec::new();

        if nearest > self.config.hard_reject_threshold {
            let closest = conflicts.first().map(|c| c.answer.as_str()).unwrap_or("");
            recommendations.push(format!(
                "Too similar to '{}' ({:.2}); pick a different answer and symbols",
                closest, nearest
            ));
            let report = UniquenessReport {
                fingerprint: digest,
                is_unique: false,
                similarity_score,
                nearest_similarity: nearest,
                conflicts,
                component_reuse: Vec::new(),
                pattern,
                pattern_overused: false,
                recommendations,
            };
            return Ok(UniquenessAssessment {
                report,
                category_usage: CategoryUsage::from_categories(recent.iter().map(|r| r.category)),
            });
        }

        if !conflicts.is_empty() {
            recommendations.push(format!(
                "{} recent puzzle(s) are similar; vary the answer or the symbol choice",
                conflicts.len()
            ));
        }

        let window = self
            .store
            .find_recent(self.config.component_window, self.config.component_limit)
            .await?;

        let component_reuse = self.find_component_reuse(&components.symbols, &window);
        if !component_reuse.is_empty() {
            recommendations.push(
                "Symbol combination was used in the last month; try fresh emoji".to_string(),
            );
        }

        let pattern_uses = self.pattern_uses(pattern, &window);
        let pattern_overused = pattern_uses >= self.config.max_pattern_uses;
        if pattern_overused {
            recommendations.push(format!(
                "The {} pattern was used {} time(s) recently; consider another style",
                pattern, pattern_uses
            ));
        }

        debug!(
            agent = Self::AGENT_NAME,
            conflicts = conflicts.len(),
            nearest,
            reuse = component_reuse.len(),
            pattern = %pattern,
            pattern_overused,
            "Uniqueness checks complete"
        );

        Ok(UniquenessAssessment {
            report: UniquenessReport {
                fingerprint: digest,
                is_unique: true,
                similarity_score,
                nearest_similarity: nearest,
                conflicts,
                component_reuse,
                pattern,
                pattern_overused,
                recommendations,
            },
            category_usage: CategoryUsage::from_categories(window.iter().map(|r| r.category)),
        })
    }

    /// Conflicts sorted by similarity, highest first, plus the nearest
    /// similarity over all compared puzzles.
    fn find_conflicts(
        &self,
        signature: &PuzzleSignature,
        recent: &[StoredPuzzle],
    ) -> (Vec<Conflict>, f64) {
        let mut nearest: f64 = 0.0;
        let mut conflicts: Vec<Conflict> = recent
            .iter()
            .filter_map(|stored| {
                let score = similarity(signature, &stored.signature());
                nearest = nearest.max(score);
                (score > self.config.conflict_threshold).then(|| Conflict {
                    id: stored.id,
                    answer: stored.answer.clone(),
                    similarity: score,
                })
            })
            .collect();
        conflicts.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        (conflicts, nearest)
    }

    fn find_component_reuse(
        &self,
        symbols: &std::collections::BTreeSet<String>,
        window: &[StoredPuzzle],
    ) -> Vec<Uuid> {
        if symbols.is_empty() {
            return Vec::new();
        }
        window
            .iter()
            .filter(|stored| {
                jaccard(symbols, &stored.symbols()) > self.config.component_overlap_threshold
            })
            .map(|stored| stored.id)
            .collect()
    }

    fn pattern_uses(&self, pattern: PatternType, window: &[StoredPuzzle]) -> usize {
        let cutoff = Utc::now() - self.config.pattern_window;
        window
            .iter()
            .filter(|stored| stored.created_at >= cutoff && stored.pattern == pattern)
            .count()
    }
}
