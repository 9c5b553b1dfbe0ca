//! Difficulty system for puzzles.
//!
//! This module provides the structural difficulty profile, the fusion of
//! independent difficulty estimates, and the calibration recommendation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use crate::categories::{CategoryStrategy, PuzzleCategory};
use crate::diversity::extract_components;
use crate::puzzle::{Candidate, MAX_DIFFICULTY, MIN_DIFFICULTY};

/// Factor weights in profile order: visual ambiguity, cognitive steps,
/// background knowledge, vocabulary level, pattern novelty.
pub const FACTOR_WEIGHTS: [f64; 5] = [0.20, 0.30, 0.20, 0.15, 0.15];

/// Fusion weight of the author's proposed difficulty.
pub const PROPOSED_WEIGHT: f64 = 0.3;

/// Fusion weight of the structural profile.
pub const STRUCTURAL_WEIGHT: f64 = 0.3;

/// Fusion weight of the model's self-assessed difficulty.
pub const PERCEIVED_WEIGHT: f64 = 0.4;

const FACTOR_MIN: f64 = 1.0;
const FACTOR_MAX: f64 = 10.0;

/// Coarse difficulty band of a calibrated 1-10 value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Easy,
    Medium,
    Hard,
}

impl DifficultyLevel {
    /// Band for a 1-10 difficulty: 1-3 easy, 4-6 medium, 7-10 hard.
    pub fn from_value(value: u8) -> Self {
        match value {
            0..=3 => DifficultyLevel::Easy,
            4..=6 => DifficultyLevel::Medium,
            _ => DifficultyLevel::Hard,
        }
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifficultyLevel::Easy => write!(f, "easy"),
            DifficultyLevel::Medium => write!(f, "medium"),
            DifficultyLevel::Hard => write!(f, "hard"),
        }
    }
}

/// Self-reported time-to-solve bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBucket {
    Instant,
    Quick,
    Moderate,
    Challenging,
    VeryHard,
}

/// Five independent difficulty factors, each in [1, 10], and their weighted sum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    pub visual_ambiguity: f64,
    pub cognitive_steps: f64,
    pub background_knowledge: f64,
    pub vocabulary_level: f64,
    pub pattern_novelty: f64,
    pub overall: f64,
}

impl DifficultyProfile {
    /// Builds a profile from raw factor values, clamping each to [1, 10].
    pub fn from_raw(
        visual_ambiguity: f64,
        cognitive_steps: f64,
        background_knowledge: f64,
        vocabulary_level: f64,
        pattern_novelty: f64,
    ) -> Self {
        let factors = [
            clamp_factor(visual_ambiguity),
            clamp_factor(cognitive_steps),
            clamp_factor(background_knowledge),
            clamp_factor(vocabulary_level),
            clamp_factor(pattern_novelty),
        ];
        let overall = factors
            .iter()
            .zip(FACTOR_WEIGHTS.iter())
            .map(|(factor, weight)| factor * weight)
            .sum();

        Self {
            visual_ambiguity: factors[0],
            cognitive_steps: factors[1],
            background_knowledge: factors[2],
            vocabulary_level: factors[3],
            pattern_novelty: factors[4],
            overall,
        }
    }

    pub fn factors(&self) -> [f64; 5] {
        [
            self.visual_ambiguity,
            self.cognitive_steps,
            self.background_knowledge,
            self.vocabulary_level,
            self.pattern_novelty,
        ]
    }
}

fn clamp_factor(value: f64) -> f64 {
    if value.is_nan() {
        return FACTOR_MIN;
    }
    value.clamp(FACTOR_MIN, FACTOR_MAX)
}

/// Category frequencies over a trailing window of stored puzzles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryUsage {
    counts: HashMap<PuzzleCategory, usize>,
    total: usize,
}

impl CategoryUsage {
    pub fn from_categories(categories: impl IntoIterator<Item = PuzzleCategory>) -> Self {
        let mut usage = Self::default();
        for category in categories {
            *usage.counts.entry(category).or_insert(0) += 1;
            usage.total += 1;
        }
        usage
    }

    /// Fraction of the window in `category`; `None` for an empty window.
    pub fn share(&self, category: PuzzleCategory) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        let count = self.counts.get(&category).copied().unwrap_or(0);
        Some(count as f64 / self.total as f64)
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

static STEP_INDICATORS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(first|second|third|then|next|after|afterwards|finally|step|combined?|combining|plus|becomes|together|and then)\b",
    )
    .ok()
});

/// Counts step-indicator keywords ("first", "then", "combine", ...) in text.
pub fn step_indicator_hits(text: &str) -> usize {
    STEP_INDICATORS
        .as_ref()
        .map(|re| re.find_iter(text).count())
        .unwrap_or(0)
}

/// Derives the structural difficulty profile of a candidate.
///
/// `usage` is the category mix of recently stored puzzles; rarer categories
/// score higher on pattern novelty.
pub fn structural_profile(
    candidate: &Candidate,
    strategy: &dyn CategoryStrategy,
    usage: &CategoryUsage,
) -> DifficultyProfile {
    let components = extract_components(candidate.content());
    let symbols = components.symbols.len() as f64;
    let auxiliary =
        (components.directionals.len() + components.numbers.len() + components.other.len()) as f64;
    let text_present = if components.has_text() { 1.0 } else { 0.0 };

    let visual_ambiguity = 1.0 + 1.5 * symbols + 0.5 * auxiliary - text_present;

    let steps = step_indicator_hits(candidate.explanation()) as f64;
    let cognitive_steps = 1.0 + 1.5 * steps + 0.5 * (symbols - 2.0).max(0.0);

    let background_knowledge = strategy.background_knowledge();

    let words: Vec<&str> = candidate.answer().split_whitespace().collect();
    let word_count = words.len().max(1) as f64;
    let avg_word_len = if words.is_empty() {
        0.0
    } else {
        words
            .iter()
            .map(|w| w.chars().filter(|c| c.is_alphanumeric()).count())
            .sum::<usize>() as f64
            / words.len() as f64
    };
    let vocabulary_level = 1.0 + 1.2 * (word_count - 1.0) + 0.5 * (avg_word_len - 4.0).max(0.0);

    let pattern_novelty = match usage.share(candidate.category()) {
        Some(share) => 10.0 * (1.0 - share),
        None => 5.0,
    };

    DifficultyProfile::from_raw(
        visual_ambiguity,
        cognitive_steps,
        background_knowledge,
        vocabulary_level,
        pattern_novelty,
    )
}

/// Fuses the three independent estimates into one calibrated 1-10 value.
pub fn fuse_difficulty(proposed: u8, structural_overall: f64, perceived: u8) -> u8 {
    let fused = PROPOSED_WEIGHT * f64::from(proposed)
        + STRUCTURAL_WEIGHT * structural_overall
        + PERCEIVED_WEIGHT * f64::from(perceived);
    let rounded = fused.round().clamp(f64::from(MIN_DIFFICULTY), f64::from(MAX_DIFFICULTY));
    rounded as u8
}

/// Classification of the gap between calibrated and proposed difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationRecommendation {
    AccuratelyCalibrated,
    MinorAdjustment,
    MismatchRegenerate,
}

impl CalibrationRecommendation {
    /// Delta above 2 is a mismatch, above 1 a minor adjustment.
    pub fn from_delta(delta: u8) -> Self {
        if delta > 2 {
            CalibrationRecommendation::MismatchRegenerate
        } else if delta > 1 {
            CalibrationRecommendation::MinorAdjustment
        } else {
            CalibrationRecommendation::AccuratelyCalibrated
        }
    }

    /// Human-readable recommendation.
    pub fn message(&self, proposed: u8, calibrated: u8) -> String {
        match self {
            CalibrationRecommendation::MismatchRegenerate => format!(
                "Difficulty mismatch (proposed {}, calibrated {}): regenerate for the intended level",
                proposed, calibrated
            ),
            CalibrationRecommendation::MinorAdjustment => format!(
                "Minor adjustment: use difficulty {} instead of {}",
                calibrated, proposed
            ),
            CalibrationRecommendation::AccuratelyCalibrated => {
                format!("Accurately calibrated at difficulty {}", calibrated)
            }
        }
    }
}

impl fmt::Display for CalibrationRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationRecommendation::AccuratelyCalibrated => write!(f, "accurately calibrated"),
            CalibrationRecommendation::MinorAdjustment => write!(f, "minor adjustment"),
            CalibrationRecommendation::MismatchRegenerate => write!(f, "mismatch, regenerate"),
        }
    }
}
