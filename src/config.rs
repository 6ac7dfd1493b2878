use std::collections::BTreeMap;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Source '{0}' is active but has no weight in [scores.sources]")]
    MissingSourceWeight(String),
    #[error("No sources configured")]
    NoSources,
}

/// Application configuration loaded from TOML config file.
/// Every field has a default, so the config file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Active data sources, in query order.
    pub sources: Vec<String>,
    /// Maximum number of genres written back per album.
    pub tag_limit: usize,
    /// Custom rules file (replaces the built-in one).
    pub rules_path: Option<PathBuf>,
    /// Optional whitelist file, one genre per line.
    pub whitelist_path: Option<PathBuf>,
    /// Directories to scan for albums (used when `scan` has no CLI args).
    pub music_dirs: Vec<PathBuf>,
    pub scores: ScoreConfig,
    pub genres: GenresConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sources: vec!["whatcd".into(), "lastfm".into(), "mbrainz".into()],
            tag_limit: 4,
            rules_path: None,
            whitelist_path: None,
            music_dirs: Vec::new(),
            scores: ScoreConfig::default(),
            genres: GenresConfig::default(),
        }
    }
}

/// Score multipliers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    /// Weight of the artist grouping when merging with the album grouping.
    pub artist: f64,
    /// Replaces `artist` for Various Artists albums.
    pub various: f64,
    /// Retention factor for a compound tag that was split but kept.
    pub splitup: f64,
    /// Per-source multiplier, keyed by source name.
    pub sources: BTreeMap<String, f64>,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        let sources = [
            ("whatcd", 1.5),
            ("lastfm", 0.66),
            ("discogs", 1.0),
            ("mbrainz", 0.66),
            ("echonest", 1.0),
        ]
        .into_iter()
        .map(|(name, weight)| (name.to_string(), weight))
        .collect();

        Self {
            artist: 1.33,
            various: 0.66,
            splitup: 0.33,
            sources,
        }
    }
}

const ARTIST_RANGE: (f64, f64) = (0.5, 2.0);
const VARIOUS_RANGE: (f64, f64) = (0.1, 1.0);
const SPLITUP_RANGE: (f64, f64) = (0.0, 1.0);
const SOURCE_RANGE: (f64, f64) = (0.5, 2.0);

impl ScoreConfig {
    /// Clamp every multiplier into its allowed range, warning on each correction.
    pub fn clamp(&mut self) {
        self.artist = clamp_weight("artist", self.artist, ARTIST_RANGE);
        self.various = clamp_weight("various", self.various, VARIOUS_RANGE);
        self.splitup = clamp_weight("splitup", self.splitup, SPLITUP_RANGE);
        for (name, weight) in self.sources.iter_mut() {
            *weight = clamp_weight(name, *weight, SOURCE_RANGE);
        }
    }

    /// Weight for a source, if configured.
    pub fn source_weight(&self, source: &str) -> Option<f64> {
        self.sources.get(&source.to_lowercase()).copied()
    }
}

fn clamp_weight(name: &str, value: f64, (min, max): (f64, f64)) -> f64 {
    if value.is_nan() || value < min {
        log::warn!("Score '{name}' too small ({value:.2}): setting to min {min:.2}");
        min
    } else if value > max {
        log::warn!("Score '{name}' too large ({value:.2}): setting to max {max:.2}");
        max
    } else {
        value
    }
}

/// User genre preferences.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenresConfig {
    /// Tags that get a score bonus.
    pub love: Vec<String>,
    /// Tags that get a score penalty.
    pub hate: Vec<String>,
    /// Tags that are never accepted.
    pub blacklist: Vec<String>,
    /// Filter groups from the rules file to activate, on top of `badtags` and `generic`.
    pub filters: Vec<String>,
}

impl Default for GenresConfig {
    fn default() -> Self {
        Self {
            love: Vec::new(),
            hate: ["alternative", "electronic", "indie", "pop", "rock"]
                .into_iter()
                .map(String::from)
                .collect(),
            blacklist: Vec::new(),
            filters: vec!["instrument".into(), "location".into()],
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/genretags/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Normalize list entries and score ranges, then check that every
    /// active source can be weighted.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.scores.clamp();
        self.scores.sources = std::mem::take(&mut self.scores.sources)
            .into_iter()
            .map(|(name, weight)| (name.trim().to_lowercase(), weight))
            .collect();

        for list in [
            &mut self.sources,
            &mut self.genres.love,
            &mut self.genres.hate,
            &mut self.genres.blacklist,
            &mut self.genres.filters,
        ] {
            normalize_list(list);
        }

        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        for source in &self.sources {
            if self.scores.source_weight(source).is_none() {
                return Err(ConfigError::MissingSourceWeight(source.clone()));
            }
        }
        Ok(())
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

fn normalize_list(list: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    list.retain_mut(|item| {
        *item = item.trim().to_lowercase();
        !item.is_empty() && seen.insert(item.clone())
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.tag_limit, 4);
        assert_eq!(config.scores.artist, 1.33);
        assert_eq!(config.scores.various, 0.66);
        assert_eq!(config.scores.splitup, 0.33);
        assert_eq!(config.scores.source_weight("whatcd"), Some(1.5));
        assert!(config.genres.hate.contains(&"rock".to_string()));
    }

    #[test]
    fn test_parse_partial_file() {
        let config = AppConfig::parse(
            r#"
            sources = ["lastfm", "discogs"]
            tag_limit = 6

            [scores]
            artist = 1.0

            [genres]
            love = ["Jazz ", "soul"]
            hate = []
            "#,
        )
        .unwrap();
        assert_eq!(config.sources, vec!["lastfm", "discogs"]);
        assert_eq!(config.tag_limit, 6);
        assert_eq!(config.scores.artist, 1.0);
        // untouched fields keep their defaults
        assert_eq!(config.scores.various, 0.66);
        assert!(config.genres.hate.is_empty());
        assert_eq!(config.genres.filters, vec!["instrument", "location"]);
    }

    #[test]
    fn test_validate_clamps_and_normalizes() {
        let mut config = AppConfig::parse(
            r#"
            sources = [" LastFM", "lastfm", ""]

            [scores]
            artist = 5.0
            splitup = -1.0

            [scores.sources]
            LastFM = 0.1

            [genres]
            love = ["Jazz ", "jazz"]
            "#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.sources, vec!["lastfm"]);
        assert_eq!(config.scores.artist, 2.0);
        assert_eq!(config.scores.splitup, 0.0);
        assert_eq!(config.scores.source_weight("lastfm"), Some(0.5));
        assert_eq!(config.genres.love, vec!["jazz"]);
    }

    #[test]
    fn test_validate_rejects_unweighted_source() {
        let mut config = AppConfig::parse(r#"sources = ["bandcamp"]"#).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingSourceWeight(ref s) if s == "bandcamp"));
    }

    #[test]
    fn test_validate_rejects_empty_sources() {
        let mut config = AppConfig::parse("sources = []").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::NoSources)));
    }
}
