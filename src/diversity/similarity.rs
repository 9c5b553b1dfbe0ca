//! Pairwise similarity between puzzles.
//!
//! `similarity = 0.6 * answer_similarity + 0.4 * symbol_jaccard`, where answer
//! similarity is `(max_len - levenshtein) / max_len` over normalized answers.
//! When neither puzzle has symbols the answer term is the whole score.

use std::collections::BTreeSet;

use super::components::extract_components;
use super::fingerprint::normalize_answer;
use crate::puzzle::Candidate;

/// Weight of the answer edit-distance term.
pub const ANSWER_WEIGHT: f64 = 0.6;

/// Weight of the symbol-set Jaccard term.
pub const SYMBOL_WEIGHT: f64 = 0.4;

/// The parts of a puzzle that similarity is computed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleSignature {
    pub normalized_answer: String,
    pub symbols: BTreeSet<String>,
}

impl PuzzleSignature {
    pub fn new(answer: &str, content: &str) -> Self {
        Self {
            normalized_answer: normalize_answer(answer),
            symbols: extract_components(content).symbols,
        }
    }

    pub fn of(candidate: &Candidate) -> Self {
        Self::new(candidate.answer(), candidate.content())
    }
}

/// Levenshtein distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// Normalized edit-distance similarity in [0, 1]. Two empty strings are identical.
pub fn answer_similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein(a, b);
    (max_len - distance) as f64 / max_len as f64
}

/// Jaccard index of two sets. Two empty sets are identical.
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Blended similarity in [0, 1]; symmetric, 1.0 for identical signatures.
pub fn similarity(a: &PuzzleSignature, b: &PuzzleSignature) -> f64 {
    let answer = answer_similarity(&a.normalized_answer, &b.normalized_answer);
    if a.symbols.is_empty() && b.symbols.is_empty() {
        return answer.clamp(0.0, 1.0);
    }
    let symbols = jaccard(&a.symbols, &b.symbols);
    (ANSWER_WEIGHT * answer + SYMBOL_WEIGHT * symbols).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(answer: &str, content: &str) -> PuzzleSignature {
        PuzzleSignature::new(answer, content)
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
        assert_eq!(levenshtein("🦁", "🐯"), 1);
    }

    #[test]
    fn test_answer_similarity() {
        assert_eq!(answer_similarity("", ""), 1.0);
        assert_eq!(answer_similarity("abcd", "abcd"), 1.0);
        assert!((answer_similarity("kitten", "sitting") - 4.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_jaccard() {
        let a: BTreeSet<&str> = ["🦁", "👑"].into_iter().collect();
        let b: BTreeSet<&str> = ["🦁", "🌍"].into_iter().collect();
        let empty: BTreeSet<&str> = BTreeSet::new();
        assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(jaccard(&empty, &empty), 1.0);
        assert_eq!(jaccard(&a, &empty), 0.0);
    }

    #[test]
    fn test_self_similarity_is_one() {
        let samples = [
            sig("The Lion King", "🦁👑"),
            sig("", ""),
            sig("Raining cats and dogs", "🌧️🐱🐶"),
        ];
        for s in &samples {
            assert_eq!(similarity(s, s), 1.0);
        }
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let samples = [
            sig("The Lion King", "🦁👑"),
            sig("Lion King", "🦁👑🌍"),
            sig("Finding Nemo", "🐟🔍"),
            sig("Jaws", "🦈🌊"),
            sig("", "🦈"),
        ];
        for a in &samples {
            for b in &samples {
                assert_eq!(similarity(a, b), similarity(b, a));
            }
        }
    }

    #[test]
    fn test_text_only_puzzles_score_on_answer_alone() {
        let cake = sig("Piece of Cake", "PIECE of ... (easy task)");
        let pie = sig("Piece of Pie", "PIE ce  + (dessert slice)");
        assert!(cake.symbols.is_empty() && pie.symbols.is_empty());

        let score = similarity(&cake, &pie);
        assert_eq!(
            score,
            answer_similarity(&cake.normalized_answer, &pie.normalized_answer)
        );
        assert!(score < 0.8, "distinct text-only puzzles scored {}", score);
        assert_eq!(similarity(&cake, &cake), 1.0);
    }

    #[test]
    fn test_near_duplicate_scores_high() {
        let a = sig("The Lion King", "🦁👑");
        let b = sig("Lion King", "🦁👑");
        assert!(similarity(&a, &b) > 0.8);

        let unrelated = sig("Finding Nemo", "🐟🔍");
        assert!(similarity(&a, &unrelated) < 0.3);
    }
}
