//! Puzzle category taxonomy.
//!
//! Categories are a closed set; every category has exactly one strategy in
//! [`super::CategoryRegistry`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Content category of a puzzle's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PuzzleCategory {
    Movies,
    Music,
    Books,
    Food,
    Animals,
    Places,
    Idioms,
    Science,
}

impl PuzzleCategory {
    /// Returns all categories in declaration order.
    pub fn all() -> Vec<PuzzleCategory> {
        vec![
            PuzzleCategory::Movies,
            PuzzleCategory::Music,
            PuzzleCategory::Books,
            PuzzleCategory::Food,
            PuzzleCategory::Animals,
            PuzzleCategory::Places,
            PuzzleCategory::Idioms,
            PuzzleCategory::Science,
        ]
    }

    /// Stable identifier used in prompts, fingerprints and storage.
    pub fn slug(&self) -> &'static str {
        match self {
            PuzzleCategory::Movies => "movies",
            PuzzleCategory::Music => "music",
            PuzzleCategory::Books => "books",
            PuzzleCategory::Food => "food",
            PuzzleCategory::Animals => "animals",
            PuzzleCategory::Places => "places",
            PuzzleCategory::Idioms => "idioms",
            PuzzleCategory::Science => "science",
        }
    }

    /// Slugs joined for use in prompts and schema enums.
    pub fn all_slugs() -> Vec<&'static str> {
        Self::all().iter().map(|c| c.slug()).collect()
    }
}

impl fmt::Display for PuzzleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for PuzzleCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        PuzzleCategory::all()
            .into_iter()
            .find(|c| c.slug() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown category '{}', expected one of: {}",
                    s,
                    PuzzleCategory::all_slugs().join(", ")
                )
            })
    }
}
