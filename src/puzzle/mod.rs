//! Core puzzle records.
//!
//! A [`Candidate`] is immutable once built: validators and calibrators produce
//! new records that reference it instead of editing it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::categories::PuzzleCategory;

/// Lowest authorable difficulty.
pub const MIN_DIFFICULTY: u8 = 1;

/// Highest authorable difficulty.
pub const MAX_DIFFICULTY: u8 = 10;

/// One generated puzzle for a single orchestration attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default = "Uuid::new_v4")]
    id: Uuid,
    content: String,
    answer: String,
    category: PuzzleCategory,
    explanation: String,
    #[serde(default)]
    hints: Vec<String>,
    proposed_difficulty: u8,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
}

impl Candidate {
    /// Creates a candidate. `proposed_difficulty` is clamped to 1-10.
    pub fn new(
        content: impl Into<String>,
        answer: impl Into<String>,
        category: PuzzleCategory,
        explanation: impl Into<String>,
        hints: Vec<String>,
        proposed_difficulty: u8,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            answer: answer.into(),
            category,
            explanation: explanation.into(),
            hints,
            proposed_difficulty: proposed_difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The puzzle body shown to players.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn category(&self) -> PuzzleCategory {
        self.category
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn hints(&self) -> &[String] {
        &self.hints
    }

    /// Author-proposed difficulty, 1-10.
    pub fn proposed_difficulty(&self) -> u8 {
        self.proposed_difficulty
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// The model's reasoning trace that accompanies a generated candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingTrace {
    #[serde(default)]
    pub brainstorm: Vec<String>,
    #[serde(default)]
    pub chosen_concept: String,
    #[serde(default)]
    pub reasoning: String,
}

/// What the generator is asked to produce for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationBrief {
    pub category: PuzzleCategory,
    /// Target difficulty, 1-10.
    pub target_difficulty: u8,
    pub theme: Option<String>,
    /// Recent answers the generator should steer away from.
    #[serde(default)]
    pub avoid_answers: Vec<String>,
}

impl GenerationBrief {
    pub fn new(category: PuzzleCategory, target_difficulty: u8) -> Self {
        Self {
            category,
            target_difficulty: target_difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY),
            theme: None,
            avoid_answers: Vec::new(),
        }
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn with_avoid_answers(mut self, answers: Vec<String>) -> Self {
        self.avoid_answers = answers;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_clamps_difficulty() {
        let high = Candidate::new("🦁👑", "The Lion King", PuzzleCategory::Movies, "lion + king", vec![], 14);
        assert_eq!(high.proposed_difficulty(), 10);

        let low = Candidate::new("🦁👑", "The Lion King", PuzzleCategory::Movies, "lion + king", vec![], 0);
        assert_eq!(low.proposed_difficulty(), 1);
    }

    #[test]
    fn test_candidate_deserializes_without_id() {
        let json = r#"{
            "content": "🌧️🐱🐶",
            "answer": "Raining cats and dogs",
            "category": "idioms",
            "explanation": "rain, cat, dog",
            "proposed_difficulty": 3
        }"#;
        let candidate: Candidate = serde_json::from_str(json).expect("should parse");
        assert_eq!(candidate.category(), PuzzleCategory::Idioms);
        assert!(candidate.hints().is_empty());
        assert!(!candidate.id().is_nil());
    }

    #[test]
    fn test_brief_builder() {
        let brief = GenerationBrief::new(PuzzleCategory::Food, 12)
            .with_theme("desserts")
            .with_avoid_answers(vec!["Cheesecake".to_string()]);
        assert_eq!(brief.target_difficulty, 10);
        assert_eq!(brief.theme.as_deref(), Some("desserts"));
        assert_eq!(brief.avoid_answers.len(), 1);
    }
}
