//! Diversity metrics for a batch of accepted puzzles.
//!
//! Batch runs report how evenly their output spreads across patterns and
//! categories. The report is informational; nothing is rejected based on it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::patterns::PatternType;
use crate::categories::PuzzleCategory;

/// Pattern and category spread of a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchDiversityReport {
    /// Number of puzzles analyzed.
    pub total: usize,
    /// Puzzles per pattern slug.
    pub pattern_distribution: HashMap<String, usize>,
    /// Puzzles per category slug.
    pub category_distribution: HashMap<String, usize>,
    /// Normalized Shannon entropy of the pattern distribution (0.0 to 1.0).
    pub pattern_entropy: f64,
    /// Normalized Shannon entropy of the category distribution (0.0 to 1.0).
    pub category_entropy: f64,
    /// Gini coefficient of the pattern distribution (0 = even).
    pub pattern_gini: f64,
    /// Pattern slugs used more than once, sorted.
    pub repeated_patterns: Vec<String>,
}

impl BatchDiversityReport {
    /// Builds a report from the pattern and category of each puzzle.
    pub fn calculate(entries: &[(PatternType, PuzzleCategory)]) -> Self {
        if entries.is_empty() {
            return Self::default();
        }

        let mut pattern_distribution: HashMap<String, usize> = HashMap::new();
        let mut category_distribution: HashMap<String, usize> = HashMap::new();
        for (pattern, category) in entries {
            *pattern_distribution.entry(pattern.slug().to_string()).or_insert(0) += 1;
            *category_distribution.entry(category.slug().to_string()).or_insert(0) += 1;
        }

        let mut repeated_patterns: Vec<String> = pattern_distribution
            .iter()
            .filter(|(_, &count)| count > 1)
            .map(|(slug, _)| slug.clone())
            .collect();
        repeated_patterns.sort();

        Self {
            total: entries.len(),
            pattern_entropy: normalized_entropy(&pattern_distribution),
            category_entropy: normalized_entropy(&category_distribution),
            pattern_gini: gini_coefficient(&pattern_distribution),
            pattern_distribution,
            category_distribution,
            repeated_patterns,
        }
    }

    /// Number of distinct patterns used.
    pub fn distinct_patterns(&self) -> usize {
        self.pattern_distribution.len()
    }
}

/// Calculates Shannon entropy of a distribution (natural log).
pub fn shannon_entropy(distribution: &HashMap<String, usize>) -> f64 {
    let total: usize = distribution.values().sum();
    if total == 0 {
        return 0.0;
    }

    let total_f = total as f64;
    distribution
        .values()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total_f;
            -p * p.ln()
        })
        .sum()
}

/// Calculates entropy normalized by the maximum for the number of buckets.
///
/// A single bucket has no spread and scores 0.0.
pub fn normalized_entropy(distribution: &HashMap<String, usize>) -> f64 {
    let max_entropy = (distribution.len() as f64).ln();
    if max_entropy > 0.0 {
        (shannon_entropy(distribution) / max_entropy).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Calculates the Gini coefficient of a distribution.
///
/// 0 means every bucket has the same count.
pub fn gini_coefficient(distribution: &HashMap<String, usize>) -> f64 {
    let mut values: Vec<f64> = distribution.values().map(|&v| v as f64).collect();
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len() as f64;
    let total: f64 = values.iter().sum();
    if total == 0.0 {
        return 0.0;
    }

    let weighted: f64 = values
        .iter()
        .enumerate()
        .map(|(i, &value)| (2.0 * (i as f64 + 1.0) - n - 1.0) * value)
        .sum();
    weighted / (n * total)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(pairs: &[(&str, usize)]) -> HashMap<String, usize> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_entropy_of_uniform_distribution() {
        let uniform = dist(&[("a", 5), ("b", 5), ("c", 5), ("d", 5)]);
        assert!((shannon_entropy(&uniform) - 4f64.ln()).abs() < 1e-9);
        assert!((normalized_entropy(&uniform) - 1.0).abs() < 1e-9);
        assert!(gini_coefficient(&uniform).abs() < 1e-9);
    }

    #[test]
    fn test_single_bucket_has_no_spread() {
        let single = dist(&[("a", 10)]);
        assert_eq!(shannon_entropy(&single), 0.0);
        assert_eq!(normalized_entropy(&single), 0.0);
    }

    #[test]
    fn test_gini_of_skewed_distribution() {
        let skewed = dist(&[("a", 1), ("b", 1), ("c", 10)]);
        let even = dist(&[("a", 4), ("b", 4), ("c", 4)]);
        assert!(gini_coefficient(&skewed) > gini_coefficient(&even));
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(shannon_entropy(&HashMap::new()), 0.0);
        assert_eq!(gini_coefficient(&HashMap::new()), 0.0);
        assert_eq!(BatchDiversityReport::calculate(&[]).total, 0);
    }

    #[test]
    fn test_batch_report() {
        let report = BatchDiversityReport::calculate(&[
            (PatternType::Compound, PuzzleCategory::Movies),
            (PatternType::Compound, PuzzleCategory::Food),
            (PatternType::Literal, PuzzleCategory::Movies),
            (PatternType::Homophone, PuzzleCategory::Idioms),
        ]);

        assert_eq!(report.total, 4);
        assert_eq!(report.distinct_patterns(), 3);
        assert_eq!(report.pattern_distribution.get("compound"), Some(&2));
        assert_eq!(report.category_distribution.get("movies"), Some(&2));
        assert_eq!(report.repeated_patterns, vec!["compound".to_string()]);
        assert!(report.pattern_entropy > 0.9 && report.pattern_entropy < 1.0);
    }
}
