//! Rule-based pattern classification.
//!
//! A pattern is the construction technique a puzzle relies on. Rules are
//! evaluated in a fixed order and the first match wins.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use super::components::ContentComponents;

/// Construction technique of a puzzle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Sound-alike wordplay.
    Homophone,
    /// Uses digits or keycaps.
    Numeric,
    /// Uses arrows to express motion or order.
    Directional,
    /// Mixes symbols with words.
    TextHybrid,
    /// Symbols stand for abstract meanings.
    Metaphor,
    /// Several symbols combine into one answer.
    Compound,
    /// Symbols depict the answer directly.
    Literal,
}

impl PatternType {
    pub fn all() -> Vec<PatternType> {
        vec![
            PatternType::Homophone,
            PatternType::Numeric,
            PatternType::Directional,
            PatternType::TextHybrid,
            PatternType::Metaphor,
            PatternType::Compound,
            PatternType::Literal,
        ]
    }

    pub fn slug(&self) -> &'static str {
        match self {
            PatternType::Homophone => "homophone",
            PatternType::Numeric => "numeric",
            PatternType::Directional => "directional",
            PatternType::TextHybrid => "text_hybrid",
            PatternType::Metaphor => "metaphor",
            PatternType::Compound => "compound",
            PatternType::Literal => "literal",
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for PatternType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        PatternType::all()
            .into_iter()
            .find(|p| p.slug() == normalized)
            .ok_or_else(|| format!("unknown pattern type '{}'", s))
    }
}

const HOMOPHONE_PATTERNS: &[&str] = &[
    r"(?i)\bsounds?\s+like\b",
    r"(?i)\bhomophones?\b",
    r"(?i)\bsound-?alike\b",
    r"(?i)\bpun\b",
    r"(?i)\brhym(e|es|ing)\s+with\b",
];

const METAPHOR_PATTERNS: &[&str] = &[
    r"(?i)\brepresents?\b",
    r"(?i)\bsymboli[sz](e|es|ing)\b",
    r"(?i)\bmetaphor(ical)?\b",
    r"(?i)\bstands?\s+for\b",
];

const COMPOUND_PATTERNS: &[&str] = &[
    r"(?i)\bcombin(e|ed|es|ing)\b",
    r"(?i)\bput\s+together\b",
    r"(?i)\bplus\b",
    r"\w\s*\+\s*\w",
];

/// Symbol count at which a puzzle counts as compound without keywords.
const COMPOUND_SYMBOL_COUNT: usize = 3;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

static HOMOPHONE: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(HOMOPHONE_PATTERNS));
static METAPHOR: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(METAPHOR_PATTERNS));
static COMPOUND: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(COMPOUND_PATTERNS));

fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|re| re.is_match(text))
}

/// Classifies a puzzle from its components and explanation.
pub fn classify_pattern(components: &ContentComponents, explanation: &str) -> PatternType {
    if any_match(&HOMOPHONE, explanation) {
        PatternType::Homophone
    } else if !components.numbers.is_empty() {
        PatternType::Numeric
    } else if !components.directionals.is_empty() {
        PatternType::Directional
    } else if components.has_text() {
        PatternType::TextHybrid
    } else if any_match(&METAPHOR, explanation) {
        PatternType::Metaphor
    } else if components.symbols.len() >= COMPOUND_SYMBOL_COUNT || any_match(&COMPOUND, explanation) {
        PatternType::Compound
    } else {
        PatternType::Literal
    }
}
