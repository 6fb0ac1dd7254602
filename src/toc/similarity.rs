//! Title similarity used for rename matching.
//!
//! The base metric is a Ratcliff-Obershelp ratio (twice the matched
//! characters over the combined length). It is blended with a length ratio
//! and a shared-prefix bonus so that a short title does not match a long one
//! just because it appears inside it. Weights are part of the rename config;
//! the defaults below are the values histories are reproduced with.

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_WEIGHT: f64 = 0.8;
pub const DEFAULT_LENGTH_WEIGHT: f64 = 0.1;
pub const DEFAULT_PREFIX_WEIGHT: f64 = 0.1;
pub const PREFIX_CHARS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityWeights {
    pub base: f64,
    pub length: f64,
    pub prefix: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_WEIGHT,
            length: DEFAULT_LENGTH_WEIGHT,
            prefix: DEFAULT_PREFIX_WEIGHT,
        }
    }
}

impl SimilarityWeights {
    pub fn total(&self) -> f64 {
        self.base + self.length + self.prefix
    }
}

#[cfg(test)]
pub fn similarity(a: &str, b: &str) -> f64 {
    weighted_similarity(a, b, &SimilarityWeights::default())
}

/// Case-insensitive blended similarity in `[0, 1]`.
pub fn weighted_similarity(a: &str, b: &str, weights: &SimilarityWeights) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    match (a.is_empty(), b.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }
    if a == b {
        return 1.0;
    }

    let base = ratio_chars(&a, &b);
    let length = a.len().min(b.len()) as f64 / a.len().max(b.len()) as f64;
    let prefix_len = PREFIX_CHARS.min(a.len()).min(b.len());
    let prefix = if a[..prefix_len] == b[..prefix_len] {
        1.0
    } else {
        0.0
    };

    let total = weights.total();
    if total <= 0.0 {
        return base;
    }
    let blended = (weights.base * base + weights.length * length + weights.prefix * prefix) / total;
    blended.clamp(0.0, 1.0)
}

/// Plain Ratcliff-Obershelp ratio, case-insensitive.
#[cfg(test)]
pub fn base_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    ratio_chars(&a, &b)
}

fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched_chars(a, b) as f64 / total as f64
}

/// Sum of the longest-common-block sizes found by recursive splitting.
fn matched_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0usize;
    let mut pending = vec![(0usize, a.len(), 0usize, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            pending.push((i + size, ahi, j + size, bhi));
        }
    }

    matched
}

/// Longest common substring of `a[alo..ahi]` and `b[blo..bhi]`; ties go to
/// the earliest start in `a`, then in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0usize);
    let width = bhi - blo;
    let mut prev = vec![0usize; width + 1];
    let mut curr = vec![0usize; width + 1];

    for i in alo..ahi {
        for j in blo..bhi {
            let col = j - blo + 1;
            curr[col] = if a[i] == b[j] { prev[col - 1] + 1 } else { 0 };
            let k = curr[col];
            if k > best_size {
                best_i = i + 1 - k;
                best_j = j + 1 - k;
                best_size = k;
            }
        }
        std::mem::swap(&mut prev, &mut curr);
        curr.iter_mut().for_each(|v| *v = 0);
    }

    (best_i, best_j, best_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_titles_score_one() {
        for title in ["History", "See also", "Ü", "a"] {
            assert_eq!(similarity(title, title), 1.0);
        }
        assert_eq!(similarity("History", "HISTORY"), 1.0);
    }

    #[test]
    fn scores_stay_in_bounds() {
        let titles = [
            "History",
            "Uses",
            "Applications",
            "Early history",
            "References",
            "Further reading",
            "x",
            "Mechanism of action",
        ];
        for a in titles {
            for b in titles {
                let s = similarity(a, b);
                assert!((0.0..=1.0).contains(&s), "{a} vs {b} -> {s}");
            }
        }
    }

    #[test]
    fn base_ratio_matches_known_values() {
        // "abcd" vs "bcde": one block "bcd", 2*3/8
        assert!((base_ratio("abcd", "bcde") - 0.75).abs() < 1e-9);
        assert_eq!(base_ratio("abc", "xyz"), 0.0);
        // three single-character blocks: a, b, c
        assert!((base_ratio("axbyc", "abc") - 0.75).abs() < 1e-9);
    }

    #[test]
    fn unrelated_titles_score_low() {
        let s = similarity("Uses", "Applications");
        assert!(s < 0.2, "got {s}");
    }

    #[test]
    fn close_variants_score_high() {
        assert!(similarity("Side effects", "Side-effects") > 0.9);
        assert!(similarity("Early life", "Early life and career") > 0.65);
    }

    #[test]
    fn prefix_bonus_rewards_shared_start() {
        let shared = similarity("Receptions", "Reception");
        let differing = similarity("Deception", "Reception");
        assert!(shared > differing);
        assert!(differing < base_ratio("Deception", "Reception"));
    }

    #[test]
    fn empty_titles_are_handled() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("", "x"), 0.0);
    }

    #[test]
    fn custom_weights_are_normalised() {
        let weights = SimilarityWeights {
            base: 2.0,
            length: 0.0,
            prefix: 0.0,
        };
        let s = weighted_similarity("abcd", "bcde", &weights);
        assert!((s - 0.75).abs() < 1e-9);
    }
}
