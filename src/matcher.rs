//! Near-duplicate string matching.
//!
//! Similarity is the Ratcliff/Obershelp ratio `2*M / (len(a) + len(b))`,
//! where `M` counts the characters in the recursively found longest common
//! blocks. Tag-merging cutoffs are tuned against this exact measure, so it
//! is computed the same way as Python's `difflib.SequenceMatcher.ratio`
//! (without junk heuristics, which only kick in for 200+ character inputs).

use std::collections::HashMap;

/// Similarity of two strings in `[0, 1]`.
///
/// Not fully symmetric: `a` is the candidate, `b` the word being matched.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

/// Upper bound on `ratio` from the lengths alone.
fn length_bound(a: usize, b: usize) -> f64 {
    let total = a + b;
    if total == 0 {
        1.0
    } else {
        2.0 * a.min(b) as f64 / total as f64
    }
}

/// Best candidate whose similarity to `word` is at least `cutoff`.
///
/// Ties go to the lexically greatest candidate, so the result does not depend
/// on iteration order.
pub fn close_match<'a, I>(word: &str, candidates: I, cutoff: f64) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let word_len = word.chars().count();
    let mut best: Option<(f64, &'a str)> = None;

    for candidate in candidates {
        if length_bound(candidate.chars().count(), word_len) < cutoff {
            continue;
        }
        let score = ratio(candidate, word);
        if score < cutoff {
            continue;
        }
        match best {
            Some(current) if current >= (score, candidate) => {}
            _ => best = Some((score, candidate)),
        }
    }

    best.map(|(_, candidate)| candidate)
}

/// Total size of all matching blocks between `a` and `b`.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, c) in b.iter().enumerate() {
        b2j.entry(*c).or_default().push(j);
    }

    let mut total = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, &b2j, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        total += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }
    total
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]` as `(i, j, size)`.
/// Among equally long blocks, the one starting earliest in `a` wins, then
/// earliest in `b`.
fn longest_match(
    a: &[char],
    b2j: &HashMap<char, Vec<usize>>,
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    // run length of the match ending at b[j], for the previous row of a
    let mut j2len: HashMap<usize, usize> = HashMap::new();

    for (i, c) in a.iter().enumerate().take(ahi).skip(alo) {
        let mut next: HashMap<usize, usize> = HashMap::new();
        if let Some(positions) = b2j.get(c) {
            for &j in positions {
                if j < blo {
                    continue;
                }
                if j >= bhi {
                    break;
                }
                let k = j
                    .checked_sub(1)
                    .and_then(|prev| j2len.get(&prev))
                    .copied()
                    .unwrap_or(0)
                    + 1;
                next.insert(j, k);
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        j2len = next;
    }

    (best_i, best_j, best_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_ratio_identical_and_disjoint() {
        assert!(approx(ratio("jazz", "jazz"), 1.0));
        assert!(approx(ratio("abc", "xyz"), 0.0));
        assert!(approx(ratio("", ""), 1.0));
        assert!(approx(ratio("rock", ""), 0.0));
    }

    #[test]
    fn test_ratio_known_values() {
        // values cross-checked against difflib.SequenceMatcher(None, a, b).ratio()
        assert!(approx(ratio("abcd", "bcde"), 0.75));
        assert!(approx(ratio("metal", "metals"), 10.0 / 11.0));
        assert!(approx(ratio("emo", "demo"), 6.0 / 7.0));
        assert!(approx(ratio("trance", "dance"), 8.0 / 11.0));
        assert!(approx(ratio("electro", "electronic"), 14.0 / 17.0));
    }

    #[test]
    fn test_ratio_recurses_both_sides() {
        // "ab" + "d" on the left of the longest block "xyz", "ef" on the right
        assert!(approx(ratio("abdxyzef", "abcxyzef"), 14.0 / 16.0));
    }

    #[test]
    fn test_close_match_cutoff_boundary() {
        // one substitution in 7 chars: 6/7 = 0.857142... just below the cutoff
        assert_eq!(close_match("shoegax", ["shoegaz"], 0.8572), None);
        // one substitution in 8 chars: 7/8 = 0.875, above it
        assert_eq!(close_match("shoegaxe", ["shoegaze"], 0.8572), Some("shoegaze"));
    }

    #[test]
    fn test_close_match_picks_best() {
        let candidates = ["progressive rock", "progressive metal", "regressive rock"];
        assert_eq!(
            close_match("progresive rock", candidates, 0.8572),
            Some("progressive rock")
        );
    }

    #[test]
    fn test_close_match_tie_is_order_independent() {
        // "abcx" and "abcy" both score 0.75 against "abcz"
        assert_eq!(close_match("abcz", ["abcx", "abcy"], 0.7), Some("abcy"));
        assert_eq!(close_match("abcz", ["abcy", "abcx"], 0.7), Some("abcy"));
    }

    #[test]
    fn test_close_match_empty_pool() {
        assert_eq!(close_match("rock", std::iter::empty::<&str>(), 0.5), None);
    }
}
