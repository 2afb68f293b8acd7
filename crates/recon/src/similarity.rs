//! Injectable string-similarity scoring for identity resolution.
//!
//! The resolver only depends on the 0–100 contract, so the concrete
//! algorithm is swappable and independently testable.

use strsim::normalized_levenshtein;

/// Partial substring similarity on a 0–100 scale.
pub trait Scorer: Send + Sync {
    fn score(&self, a: &str, b: &str) -> u8;
}

/// Partial-ratio scorer: the shorter string is slid across every
/// equal-length window of the longer one, and the best normalized
/// Levenshtein similarity wins. An abbreviated address therefore scores 100
/// against any stored address that contains it.
#[derive(Debug, Default, Clone, Copy)]
pub struct PartialRatio;

impl Scorer for PartialRatio {
    fn score(&self, a: &str, b: &str) -> u8 {
        let (shorter, longer) = if a.chars().count() <= b.chars().count() {
            (a, b)
        } else {
            (b, a)
        };

        if shorter.is_empty() {
            return if longer.is_empty() { 100 } else { 0 };
        }

        let short_len = shorter.chars().count();
        let long_chars: Vec<char> = longer.chars().collect();

        let mut best: f64 = 0.0;
        for start in 0..=(long_chars.len() - short_len) {
            let window: String = long_chars[start..start + short_len].iter().collect();
            let similarity = normalized_levenshtein(shorter, &window);
            if similarity > best {
                best = similarity;
            }
            if best >= 1.0 {
                break;
            }
        }

        (best * 100.0).round() as u8
    }
}
