//! Discriminative token vocabulary
//!
//! Scores every n-gram token by how far its positive rate sits from the
//! base rate, weighted by log frequency, and keeps the best ones.

use crate::config::VocabularyConfig;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

/// Upper bound on selected tokens
pub const MAX_VOCAB_SIZE: usize = 5000;

/// Minimum-count thresholds tried in order until one yields candidates
pub const MIN_COUNT_CASCADE: [usize; 3] = [3, 2, 1];

/// Per-token statistics for a selected token
#[derive(Debug, Clone, PartialEq)]
pub struct VocabularyEntry {
    pub token: String,
    /// Number of examples containing the token
    pub count: usize,
    /// Number of positive examples containing the token
    pub positive_count: usize,
    pub score: f64,
}

/// Ordered, size-capped token vocabulary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vocabulary {
    entries: Vec<VocabularyEntry>,
    /// Threshold of the cascade step that produced the entries
    min_count: Option<usize>,
}

impl Vocabulary {
    pub fn entries(&self) -> &[VocabularyEntry] {
        &self.entries
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.token.as_str())
    }

    pub fn min_count(&self) -> Option<usize> {
        self.min_count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Default)]
struct TokenStat {
    count: usize,
    positive_count: usize,
}

/// Builds a `Vocabulary` from per-example token sets and labels
#[derive(Debug, Clone)]
pub struct VocabularySelector {
    max_size: usize,
    min_counts: Vec<usize>,
}

impl Default for VocabularySelector {
    fn default() -> Self {
        Self {
            max_size: MAX_VOCAB_SIZE,
            min_counts: MIN_COUNT_CASCADE.to_vec(),
        }
    }
}

impl VocabularySelector {
    pub fn new(max_size: usize, min_counts: Vec<usize>) -> Self {
        let min_counts = if min_counts.is_empty() {
            MIN_COUNT_CASCADE.to_vec()
        } else {
            min_counts
        };
        Self {
            max_size: max_size.min(MAX_VOCAB_SIZE),
            min_counts,
        }
    }

    pub fn from_config(config: &VocabularyConfig) -> Self {
        Self::new(config.max_size, config.min_counts.clone())
    }

    /// Select tokens. `token_sets[i]` holds the distinct tokens of example
    /// `i`, so a token counts at most once per example.
    pub fn select(&self, token_sets: &[HashSet<String>], labels: &[u8]) -> Vocabulary {
        if token_sets.is_empty() || token_sets.len() != labels.len() {
            return Vocabulary::default();
        }

        let positives = labels.iter().filter(|&&l| l == 1).count();
        let base_rate = positives as f64 / labels.len() as f64;

        let mut stats: FxHashMap<&str, TokenStat> = FxHashMap::default();
        for (tokens, &label) in token_sets.iter().zip(labels) {
            for token in tokens {
                let stat = stats.entry(token.as_str()).or_default();
                stat.count += 1;
                if label == 1 {
                    stat.positive_count += 1;
                }
            }
        }

        for &min_count in &self.min_counts {
            let mut ranked: Vec<VocabularyEntry> = stats
                .iter()
                .filter(|(_, s)| s.count >= min_count)
                .filter_map(|(token, s)| {
                    let score = score(s, base_rate);
                    (score > 0.0).then(|| VocabularyEntry {
                        token: (*token).to_string(),
                        count: s.count,
                        positive_count: s.positive_count,
                        score,
                    })
                })
                .collect();

            if ranked.is_empty() {
                debug!("No scoring tokens with count >= {}", min_count);
                continue;
            }

            ranked.sort_by(rank_order);
            ranked.truncate(self.max_size);
            debug!(
                "Selected {} tokens at min count {} (from {} distinct)",
                ranked.len(),
                min_count,
                stats.len()
            );
            return Vocabulary {
                entries: ranked,
                min_count: Some(min_count),
            };
        }

        Vocabulary::default()
    }
}

fn score(stat: &TokenStat, base_rate: f64) -> f64 {
    let token_rate = stat.positive_count as f64 / stat.count as f64;
    (token_rate - base_rate).abs() * (stat.count as f64).ln_1p()
}

/// Score desc, count desc, token asc
fn rank_order(a: &VocabularyEntry, b: &VocabularyEntry) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.count.cmp(&a.count))
        .then_with(|| a.token.cmp(&b.token))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(tokens: &[&str]) -> HashSet<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_scores_and_order() {
        let sets = vec![
            set(&["ng3:pay me now", "ng3:hello there you"]),
            set(&["ng3:pay me now"]),
            set(&["ng3:pay me now", "ng3:hello there you"]),
            set(&["ng3:hello there you"]),
        ];
        let labels = vec![1, 1, 0, 0];
        let vocab = VocabularySelector::default().select(&sets, &labels);

        // both tokens have count 3; only count >= 3 is needed
        assert_eq!(vocab.min_count(), Some(3));
        assert_eq!(vocab.len(), 2);

        let entry = vocab
            .entries()
            .iter()
            .find(|e| e.token == "ng3:pay me now")
            .unwrap();
        assert_eq!(entry.count, 3);
        assert_eq!(entry.positive_count, 2);
        let expected = (2.0 / 3.0 - 0.5f64).abs() * 4.0f64.ln();
        assert!((entry.score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_rank_order_tie_breaks() {
        let entry = |token: &str, count, score| VocabularyEntry {
            token: token.to_string(),
            count,
            positive_count: 0,
            score,
        };
        let mut entries = vec![
            entry("ng3:b", 2, 1.0),
            entry("ng3:a", 2, 1.0),
            entry("ng3:c", 5, 1.0),
            entry("ng3:z", 1, 2.0),
        ];
        entries.sort_by(rank_order);
        let tokens: Vec<_> = entries.iter().map(|e| e.token.as_str()).collect();
        assert_eq!(tokens, vec!["ng3:z", "ng3:c", "ng3:a", "ng3:b"]);
    }

    #[test]
    fn test_zero_score_tokens_are_excluded() {
        let sets = vec![
            set(&["ng3:b b b", "ng3:a a a"]),
            set(&["ng3:b b b"]),
            set(&["ng3:b b b"]),
            set(&["ng3:a a a"]),
            set(&["ng3:a a a"]),
            set(&[]),
        ];
        let labels = vec![1, 1, 1, 0, 1, 0];
        let vocab = VocabularySelector::default().select(&sets, &labels);
        let tokens: Vec<_> = vocab.tokens().collect();
        // b: rate 1.0 vs base 4/6; a: rate 2/3 == base, score 0 and excluded
        assert_eq!(tokens, vec!["ng3:b b b"]);
    }

    #[test]
    fn test_cascade_falls_back_to_lower_thresholds() {
        let sets = vec![
            set(&["ng3:x y z"]),
            set(&["ng3:x y z"]),
            set(&[]),
            set(&[]),
        ];
        let labels = vec![1, 1, 0, 0];
        let vocab = VocabularySelector::default().select(&sets, &labels);
        assert_eq!(vocab.min_count(), Some(2));
        assert_eq!(vocab.len(), 1);

        let sets = vec![set(&["ng3:only once here"]), set(&[])];
        let vocab = VocabularySelector::default().select(&sets, &[1, 0]);
        assert_eq!(vocab.min_count(), Some(1));
        assert_eq!(vocab.len(), 1);
    }

    #[test]
    fn test_exhausted_cascade_is_empty() {
        // every token has the base rate, so every score is zero
        let sets = vec![set(&["ng3:a b c"]), set(&["ng3:a b c"])];
        let vocab = VocabularySelector::default().select(&sets, &[1, 0]);
        assert!(vocab.is_empty());
        assert_eq!(vocab.min_count(), None);

        assert!(VocabularySelector::default().select(&[], &[]).is_empty());
    }

    #[test]
    fn test_size_cap_and_uniqueness() {
        let mut sets = Vec::new();
        let mut labels = Vec::new();
        for i in 0..6000 {
            sets.push(set(&[&format!("ng3:t {} x", i)]));
            labels.push(1);
        }
        sets.push(set(&[]));
        labels.push(0);

        let vocab = VocabularySelector::default().select(&sets, &labels);
        assert_eq!(vocab.len(), MAX_VOCAB_SIZE);
        let unique: HashSet<_> = vocab.tokens().collect();
        assert_eq!(unique.len(), vocab.len());

        let small = VocabularySelector::new(10, vec![]).select(&sets, &labels);
        assert_eq!(small.len(), 10);
        // equal scores and counts: lexicographic order
        let tokens: Vec<_> = small.tokens().collect();
        let mut sorted = tokens.clone();
        sorted.sort_unstable();
        assert_eq!(tokens, sorted);
    }
}
