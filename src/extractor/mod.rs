//! N-gram skill extraction from free text
//!
//! Skills are matched by sliding windows of one to `max_ngram` words over a
//! normalized token stream. A candidate phrase counts only when it is a key of
//! the whitelist, so the output is always a subset of the whitelist.

use crate::{HarvestError, Result};
use std::collections::HashMap;

/// Punctuation kept inside tokens so that "c++", "c#", "asp.net", "node.js",
/// "ci/cd" and "t-sql" survive normalization.
const TOKEN_PUNCTUATION: [char; 5] = ['.', '+', '#', '-', '/'];

/// Counts whitelist phrases occurring in `text`
///
/// The text is lower-cased, every character that is not a letter, digit,
/// whitespace or one of `. + # - /` is replaced by a space, and the result is
/// split on whitespace. Every window of 1 to `max_ngram` consecutive tokens is
/// joined with single spaces, stripped of one trailing period, and counted if
/// it is a whitelist key. Overlapping windows are evaluated independently.
///
/// Only the whitelist keys are consulted; values are ignored.
///
/// # Errors
///
/// Returns `HarvestError::InvalidInput` if `text` or `whitelist` is empty or
/// `max_ngram` is zero.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use skill_harvester::extract_skills;
///
/// let whitelist: HashMap<String, u32> = [("go".to_string(), 1), ("python".to_string(), 1)]
///     .into_iter()
///     .collect();
/// let found = extract_skills("We need: Go, Python!", &whitelist, 1).unwrap();
/// assert_eq!(found.get("go"), Some(&1));
/// assert_eq!(found.get("python"), Some(&1));
/// ```
pub fn extract_skills<V>(
    text: &str,
    whitelist: &HashMap<String, V>,
    max_ngram: usize,
) -> Result<HashMap<String, u32>> {
    if text.is_empty() {
        return Err(HarvestError::InvalidInput(
            "text cannot be empty".to_string(),
        ));
    }
    if whitelist.is_empty() {
        return Err(HarvestError::InvalidInput(
            "whitelist cannot be empty".to_string(),
        ));
    }
    if max_ngram == 0 {
        return Err(HarvestError::InvalidInput(
            "max_ngram must be positive".to_string(),
        ));
    }

    let normalized = normalize(text);
    let words: Vec<&str> = normalized.split_whitespace().collect();

    let mut result = HashMap::new();
    let n = words.len();
    for i in 0..n {
        for j in 1..=max_ngram.min(n - i) {
            let phrase = words[i..i + j].join(" ");
            let candidate = phrase.strip_suffix('.').unwrap_or(&phrase);
            if whitelist.contains_key(candidate) {
                *result.entry(candidate.to_string()).or_insert(0) += 1;
            }
        }
    }

    Ok(result)
}

/// Lower-cases the text and blanks out characters that cannot be part of a skill token
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphabetic()
                || c.is_numeric()
                || c.is_whitespace()
                || TOKEN_PUNCTUATION.contains(&c)
            {
                c
            } else {
                ' '
            }
        })
        .collect()
}
