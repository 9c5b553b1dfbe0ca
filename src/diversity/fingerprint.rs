//! Content fingerprints for exact-duplicate detection.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::components::extract_components;
use crate::categories::PuzzleCategory;
use crate::puzzle::Candidate;

/// Hex-encoded SHA-256 digest of a puzzle's normalized content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hashes an already-normalized key.
    pub fn from_normalized(key: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Wraps a stored hex digest.
    pub fn from_hex(hex_digest: impl Into<String>) -> Self {
        Self(hex_digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lowercases and strips everything that is not alphanumeric.
pub fn normalize_answer(answer: &str) -> String {
    answer
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Fingerprint of a candidate.
pub fn fingerprint(candidate: &Candidate) -> Fingerprint {
    fingerprint_parts(candidate.answer(), candidate.content(), candidate.category())
}

/// Fingerprint from raw parts: normalized answer, sorted symbol set, sorted
/// word set and category slug.
pub fn fingerprint_parts(answer: &str, content: &str, category: PuzzleCategory) -> Fingerprint {
    let components = extract_components(content);
    // BTreeSet iteration is already sorted.
    let symbols: Vec<&str> = components.symbols.iter().map(String::as_str).collect();
    let tokens: Vec<&str> = components.text.iter().map(String::as_str).collect();

    let key = format!(
        "{}|{}|{}|{}",
        normalize_answer(answer),
        symbols.join(","),
        tokens.join(","),
        category.slug()
    );
    Fingerprint::from_normalized(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_answer() {
        assert_eq!(normalize_answer("The Lion King!"), "thelionking");
        assert_eq!(normalize_answer("  Café-Society "), "cafésociety");
        assert_eq!(normalize_answer("???"), "");
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = fingerprint_parts("Finding Nemo", "🐟🔍", PuzzleCategory::Movies);
        let b = fingerprint_parts("Finding Nemo", "🐟🔍", PuzzleCategory::Movies);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_fingerprint_ignores_order_case_and_spacing() {
        let a = fingerprint_parts("Finding Nemo", "🐟 🔍 🐟", PuzzleCategory::Movies);
        let b = fingerprint_parts("finding-nemo", "🔍🐟", PuzzleCategory::Movies);
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_depends_on_category_and_answer() {
        let movie = fingerprint_parts("Jaws", "🦈", PuzzleCategory::Movies);
        let animal = fingerprint_parts("Jaws", "🦈", PuzzleCategory::Animals);
        let other = fingerprint_parts("Shark Tale", "🦈", PuzzleCategory::Movies);
        assert_ne!(movie, animal);
        assert_ne!(movie, other);
    }

    #[test]
    fn test_fingerprint_of_candidate_matches_parts() {
        let candidate = Candidate::new("🍎🥧", "Apple Pie", PuzzleCategory::Food, "apple + pie", vec![], 2);
        assert_eq!(
            fingerprint(&candidate),
            fingerprint_parts("apple pie", "🥧🍎", PuzzleCategory::Food)
        );
    }
}
