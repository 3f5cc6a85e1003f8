//! Word n-gram tokens for message text
//!
//! A message is lower-cased and scanned for maximal runs of `[a-z0-9_]`.
//! Any other character (space, punctuation, non-ASCII letters) separates
//! runs. Runs of 3 to 24 characters are words; shorter or longer runs are
//! removed before windowing, so they never break a run of kept words.
//! Each window of 3, 4 or 5 consecutive words becomes one token,
//! `ng{n}:{w1} {w2} ... {wn}`.

use regex::Regex;
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::sync::OnceLock;

/// Window sizes emitted for every start position
pub const NGRAM_ORDERS: RangeInclusive<usize> = 3..=5;

const MIN_WORD_LEN: usize = 3;
const MAX_WORD_LEN: usize = 24;

fn word_pattern() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"[a-z0-9_]+").expect("static word pattern"))
}

/// Kept words of a message, in order
pub fn words(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    word_pattern()
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|w| (MIN_WORD_LEN..=MAX_WORD_LEN).contains(&w.len()))
        .map(str::to_string)
        .collect()
}

/// Distinct n-gram tokens of a message
pub fn extract_tokens(text: &str) -> HashSet<String> {
    let words = words(text);
    let mut tokens = HashSet::new();

    for start in 0..words.len() {
        for n in NGRAM_ORDERS {
            let Some(window) = words.get(start..start + n) else {
                break;
            };
            tokens.insert(format!("ng{}:{}", n, window.join(" ")));
        }
    }

    tokens
}
