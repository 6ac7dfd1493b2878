use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which scoring bucket a source's tags belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grouping {
    Artist,
    Album,
}

impl Grouping {
    pub const ALL: [Grouping; 2] = [Grouping::Artist, Grouping::Album];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Artist => "artist",
            Self::Album => "album",
        }
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tags as handed over by a data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTagPayload {
    /// Tag name → vote count.
    Counts(BTreeMap<String, f64>),
    /// Tag names ordered by relevance, best first.
    Ranked(Vec<String>),
}

impl RawTagPayload {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Counts(counts) => counts.is_empty(),
            Self::Ranked(names) => names.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Counts(counts) => counts.len(),
            Self::Ranked(names) => names.len(),
        }
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for RawTagPayload {
    fn from_iter<T: IntoIterator<Item = (S, f64)>>(iter: T) -> Self {
        Self::Counts(iter.into_iter().map(|(name, count)| (name.into(), count)).collect())
    }
}
