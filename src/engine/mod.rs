//! Genre tag engine.
//!
//! One [`TagEngine`] processes one album at a time: [`TagEngine::reset`]
//! starts an album, [`TagEngine::add_tags`] feeds it each source's tags, and
//! [`TagEngine::get`] merges the artist and album groupings into a ranked
//! list of display names.
//!
//! Every tag passes through the same gates in [`TagEngine::add`]: cleanup,
//! bad-tag filter, punctuation canonicalization, rule replacements, fuzzy
//! matching against already known tags, splitting of compound tags, length
//! and score floors, filter groups, and finally the love/hate bonus.

mod accumulator;
pub mod album_filter;
mod payload;

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::album::AlbumContext;
use crate::config::ScoreConfig;
use crate::matcher;
use crate::rules::{GENERIC, INSTRUMENT, LOCATION, RuleTable};

pub use accumulator::TagAccumulator;
pub use payload::{Grouping, RawTagPayload};

/// Similarity needed to merge a tag into a known one. Tuned so plural and
/// typo variants merge while distinct short genres ("emo"/"demo") do not;
/// add replacements instead of lowering it.
pub const MATCH_CUTOFF: f64 = 0.8572;

/// Rank decay for tags without counts.
const RANK_DECAY: f64 = 0.85;
/// Counts below this share of the top count are noise.
const COUNT_FLOOR: f64 = 0.1;
/// At most this many counted tags are considered per payload.
const MAX_COUNTED_TAGS: usize = 99;
/// Tags scoring below this are dropped.
const MIN_SCORE: f64 = 0.1;
const MIN_TAG_LEN: usize = 3;
const MAX_TAG_LEN: usize = 19;
/// Split parts are themselves split, but only this deep.
const MAX_SPLIT_DEPTH: usize = 3;

// Separators that join several genres in one tag
static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[_/\\,;.+*]| and ").unwrap());

static INVALID_CHAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9&\- ]").unwrap());

static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s_]+").unwrap());

static DECADE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^[0-9]{4}s").unwrap());

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown source '{0}': no weight configured")]
    UnknownSource(String),
    #[error("Tags added before reset: no album in progress")]
    NoAlbum,
}

/// Outcome of the split decision for one tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    /// Sub-tags to add on their own.
    pub parts: Vec<String>,
    /// Score each part is added with.
    pub part_score: f64,
    /// Whether the tag itself is still added.
    pub keep_original: bool,
}

impl Split {
    fn none() -> Self {
        Self {
            parts: Vec::new(),
            part_score: 0.0,
            keep_original: true,
        }
    }
}

pub struct TagEngine<'a> {
    rules: &'a RuleTable,
    scores: &'a ScoreConfig,
    album_filter: Option<Regex>,
    tags: TagAccumulator,
    in_album: bool,
}

impl<'a> TagEngine<'a> {
    pub fn new(rules: &'a RuleTable, scores: &'a ScoreConfig) -> Self {
        Self {
            rules,
            scores,
            album_filter: None,
            tags: TagAccumulator::new(),
            in_album: false,
        }
    }

    /// Start a new album: rebuild the album filter and drop all scores.
    pub fn reset(&mut self, album: &AlbumContext) {
        self.album_filter = album_filter::build(album);
        self.tags = TagAccumulator::new();
        self.in_album = true;
    }

    /// Current accumulated scores.
    pub fn tags(&self) -> &TagAccumulator {
        &self.tags
    }

    /// Add all tags one source returned for a grouping.
    ///
    /// Returns how many tags were accepted. A split tag counts once if any
    /// of its parts was accepted.
    pub fn add_tags(
        &mut self,
        source: &str,
        grouping: Grouping,
        payload: &RawTagPayload,
    ) -> Result<usize, EngineError> {
        if !self.in_album {
            return Err(EngineError::NoAlbum);
        }
        let weight = self
            .scores
            .source_weight(source)
            .ok_or_else(|| EngineError::UnknownSource(source.to_string()))?;
        if payload.is_empty() {
            return Ok(0);
        }

        let mut added = 0;
        match payload {
            RawTagPayload::Counts(counts) => {
                let top = counts.values().copied().fold(1.0_f64, f64::max);
                let mut ranked: Vec<(&String, f64)> =
                    counts.iter().map(|(name, count)| (name, *count)).collect();
                ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
                for (name, count) in ranked.into_iter().take(MAX_COUNTED_TAGS) {
                    let share = count / top;
                    if share < COUNT_FLOOR {
                        log::trace!("tag noise   {name} ({count})");
                        continue;
                    }
                    if self.add(grouping, name, share * weight) {
                        added += 1;
                    }
                }
            }
            RawTagPayload::Ranked(names) => {
                let mut score = weight;
                for name in names {
                    if self.add(grouping, name, score) {
                        added += 1;
                    }
                    score *= RANK_DECAY;
                }
            }
        }
        Ok(added)
    }

    /// Add a single tag. Returns whether it (or any of its split parts)
    /// was accepted.
    pub fn add(&mut self, grouping: Grouping, raw: &str, score: f64) -> bool {
        self.add_at_depth(grouping, raw, score, 0)
    }

    fn add_at_depth(&mut self, grouping: Grouping, raw: &str, score: f64, depth: usize) -> bool {
        let name = pre_normalize(raw);
        if score <= 0.0 || score.is_nan() || self.rules.is_bad(&name) {
            log::debug!("tag filter  {name}");
            return false;
        }

        let name = canonicalize(&name);
        let name = collapse_spaces(&self.rules.replace(&name));
        if name.len() < MIN_TAG_LEN || self.rules.is_bad(&name) {
            log::debug!("tag filter  {name}");
            return false;
        }

        let name = self.resolve(name);

        let split = if depth < MAX_SPLIT_DEPTH {
            self.split(&name, score)
        } else {
            Split::none()
        };
        let mut score = score;
        let mut parts_added = false;
        if !split.parts.is_empty() {
            log::debug!("tag split   {name} -> {}", split.parts.join(", "));
        }
        for part in &split.parts {
            if self.add_at_depth(grouping, part, split.part_score, depth + 1) {
                parts_added = true;
            }
        }
        // "&" tags are never kept, even when no parts are left
        if !split.keep_original {
            return parts_added;
        }
        if !split.parts.is_empty() {
            score *= self.scores.splitup;
        }

        self.accept(grouping, &name, score) || parts_added
    }

    /// Final gates for a canonical name, then accumulate.
    fn accept(&mut self, grouping: Grouping, name: &str, score: f64) -> bool {
        if !(MIN_TAG_LEN..=MAX_TAG_LEN).contains(&name.len()) || score < MIN_SCORE {
            log::debug!("tag filter  {name} ({score:.3})");
            return false;
        }
        if self.rules.is_filtered(name)
            || self.album_filter.as_ref().is_some_and(|f| f.is_match(name))
        {
            log::debug!("tag filter  {name}");
            return false;
        }
        let score = score * self.rules.bonus(name);
        self.tags.add(grouping, name, score);
        log::debug!("tag add     {name} ({score:.3})");
        true
    }

    /// Merge a name into an already known tag if one is close enough.
    fn resolve(&self, name: String) -> String {
        let vocabulary = self.rules.vocabulary();
        if self.tags.contains(&name) || vocabulary.contains(&name) {
            return name;
        }
        let pool = self
            .tags
            .candidates()
            .chain(vocabulary.iter().map(String::as_str));
        match matcher::close_match(&name, pool, MATCH_CUTOFF) {
            Some(known) => {
                log::debug!("tag match   {name} -> {known}");
                known.to_string()
            }
            None => name,
        }
    }

    /// Decide whether and how a canonical tag splits into sub-tags.
    pub fn split(&self, name: &str, score: f64) -> Split {
        if self.rules.is_dont_split(name) {
            return Split::none();
        }

        if name.contains('&') {
            let parts = name
                .split('&')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
            return Split {
                parts,
                part_score: score,
                keep_original: false,
            };
        }

        let tokens: Vec<&str> = name.split_whitespace().collect();
        if tokens.len() > 2 {
            let mut parts = Vec::new();
            for (i, first) in tokens.iter().enumerate() {
                for second in &tokens[i + 1..] {
                    parts.push(format!("{first} {second}"));
                }
            }
            let part_score = score / parts.len() as f64;
            return Split {
                parts,
                part_score,
                keep_original: false,
            };
        }

        if tokens.len() == 2 {
            let splittable = tokens.iter().any(|t| {
                self.rules.in_group(INSTRUMENT, t)
                    || self.rules.in_group(LOCATION, t)
                    || self.rules.is_split_part(t)
            });
            if splittable {
                return Split {
                    parts: tokens.iter().map(|t| t.to_string()).collect(),
                    part_score: score,
                    keep_original: tokens.iter().any(|t| self.rules.in_group(GENERIC, t)),
                };
            }
        }

        Split::none()
    }

    /// Merge both groupings and return display names, best first.
    /// Consumes the album's scores; the next album needs a new `reset`.
    pub fn get(&mut self, various: bool) -> Vec<String> {
        self.get_scored(various)
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }

    /// Like [`TagEngine::get`], with the merged scores.
    ///
    /// Each grouping is normalized to a top score of 1.0, the artist grouping
    /// is weighted by the artist or various-artists weight, and the love/hate
    /// bonus is applied once more to the merged score. Equal scores are
    /// ordered by name.
    pub fn get_scored(&mut self, various: bool) -> Vec<(String, f64)> {
        let tags = std::mem::take(&mut self.tags);
        self.in_album = false;
        let mut merged: HashMap<String, f64> = HashMap::new();

        for grouping in Grouping::ALL {
            let normalized = tags.normalized(grouping);
            if normalized.is_empty() {
                continue;
            }
            log_best(grouping, &normalized, |name| self.format(name));

            let weight = match grouping {
                Grouping::Artist if various => self.scores.various,
                Grouping::Artist => self.scores.artist,
                Grouping::Album => 1.0,
            };
            for (name, score) in normalized {
                *merged.entry(name).or_insert(0.0) += score * weight;
            }
        }

        let mut genres: HashMap<String, f64> = HashMap::new();
        for (name, score) in merged {
            let score = score * self.rules.bonus(&name);
            *genres.entry(self.format(&name)).or_insert(0.0) += score;
        }

        let mut genres: Vec<(String, f64)> = genres.into_iter().collect();
        genres.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        genres
    }

    /// Best `limit` genres, formatted.
    pub fn top_genres(&mut self, various: bool, limit: usize) -> Vec<String> {
        let mut genres = self.get(various);
        genres.truncate(limit);
        genres
    }

    /// Display form of a canonical tag name.
    pub fn format(&self, name: &str) -> String {
        let decade = DECADE_RE.is_match(name);
        name.split(' ')
            .map(|token| {
                if (token.len() < 3 && token != "nu") || self.rules.is_uppercase(token) {
                    token.to_uppercase()
                } else if decade {
                    token.to_lowercase()
                } else {
                    title_case(token)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Keep printable ASCII only, lowercase and trim.
fn pre_normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .collect::<String>()
        .to_ascii_lowercase()
        .trim()
        .to_string()
}

/// Turn separators into `&`, dashes into spaces, and drop everything else
/// that can't be part of a tag name.
fn canonicalize(name: &str) -> String {
    let name = SEPARATOR_RE.replace_all(name, "&");
    let name = name.replace('-', " ");
    let name = INVALID_CHAR_RE.replace_all(&name, "");
    collapse_spaces(&name)
}

fn collapse_spaces(name: &str) -> String {
    SPACE_RE.replace_all(name, " ").trim().to_string()
}

/// Uppercase the first letter of every letter run, lowercase the rest.
fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut in_word = false;
    for c in word.chars() {
        if in_word {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        in_word = c.is_alphabetic();
    }
    out
}

fn log_best(grouping: Grouping, tags: &[(String, f64)], format: impl Fn(&str) -> String) {
    if !log::log_enabled!(log::Level::Info) {
        return;
    }
    let limit = if log::log_enabled!(log::Level::Debug) { 24 } else { 12 };
    let shown: Vec<(String, f64)> = tags
        .iter()
        .filter(|(_, score)| *score > MIN_SCORE)
        .take(limit)
        .map(|(name, score)| (format(name), *score))
        .collect();
    log::info!("Best {:<6} genres ({}):\n{}", grouping.as_str(), shown.len(), columns(&shown));
}

/// Lay out scored names in three columns, filled top to bottom.
fn columns(tags: &[(String, f64)]) -> String {
    let rows = tags.len().div_ceil(3);
    (0..rows)
        .map(|row| {
            (0..3)
                .filter_map(|col| tags.get(row + rows * col))
                .map(|(name, score)| format!("{score:4.2} {name:<20}"))
                .collect::<Vec<_>>()
                .join(" ")
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
