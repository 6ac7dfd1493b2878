use std::collections::{BTreeSet, HashMap};

use super::Grouping;

/// Per-album tag scores, one bucket per grouping.
///
/// Also owns the set of canonical names seen so far, which later tags are
/// fuzzy-matched against. The set only grows between resets.
#[derive(Debug, Default)]
pub struct TagAccumulator {
    artist: HashMap<String, f64>,
    album: HashMap<String, f64>,
    known: BTreeSet<String>,
}

impl TagAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, grouping: Grouping, name: &str, score: f64) {
        *self.bucket_mut(grouping).entry(name.to_string()).or_insert(0.0) += score;
        if !self.known.contains(name) {
            self.known.insert(name.to_string());
        }
    }

    pub fn scores(&self, grouping: Grouping) -> &HashMap<String, f64> {
        match grouping {
            Grouping::Artist => &self.artist,
            Grouping::Album => &self.album,
        }
    }

    fn bucket_mut(&mut self, grouping: Grouping) -> &mut HashMap<String, f64> {
        match grouping {
            Grouping::Artist => &mut self.artist,
            Grouping::Album => &mut self.album,
        }
    }

    /// Whether a canonical name is already present in any grouping.
    pub fn contains(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    /// Canonical names accumulated so far, across both groupings.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        self.known.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.artist.is_empty() && self.album.is_empty()
    }

    /// Scores of one grouping divided by its maximum, best first
    /// (ties by name). Empty if the grouping has no positive score.
    pub fn normalized(&self, grouping: Grouping) -> Vec<(String, f64)> {
        let scores = self.scores(grouping);
        let max = scores.values().copied().fold(0.0_f64, f64::max);
        if max <= 0.0 {
            return Vec::new();
        }
        let mut out: Vec<(String, f64)> = scores
            .iter()
            .map(|(name, score)| (name.clone(), score / max))
            .collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_additive_per_grouping() {
        let mut acc = TagAccumulator::new();
        acc.add(Grouping::Album, "rock", 0.5);
        acc.add(Grouping::Album, "rock", 0.25);
        acc.add(Grouping::Artist, "rock", 1.0);
        assert_eq!(acc.scores(Grouping::Album)["rock"], 0.75);
        assert_eq!(acc.scores(Grouping::Artist)["rock"], 1.0);
        assert_eq!(acc.candidates().count(), 1);
        assert!(acc.contains("rock"));
    }

    #[test]
    fn test_normalized_top_is_one() {
        let mut acc = TagAccumulator::new();
        acc.add(Grouping::Artist, "jazz", 0.4);
        acc.add(Grouping::Artist, "soul", 0.8);
        acc.add(Grouping::Artist, "funk", 0.8);
        let normalized = acc.normalized(Grouping::Artist);
        assert_eq!(normalized[0], ("funk".to_string(), 1.0));
        assert_eq!(normalized[1], ("soul".to_string(), 1.0));
        assert_eq!(normalized[2], ("jazz".to_string(), 0.5));
        assert!(acc.normalized(Grouping::Album).is_empty());
    }

    #[test]
    fn test_empty() {
        let acc = TagAccumulator::new();
        assert!(acc.is_empty());
        assert_eq!(acc.candidates().count(), 0);
    }
}
