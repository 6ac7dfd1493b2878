use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::engine::{EngineError, Grouping, RawTagPayload, TagEngine};

/// What is known about an album before any data provider is asked.
/// Fields are `None` when unknown or when the album's tracks disagree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlbumContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub artist: Option<String>,
    pub albumartist: Option<String>,
    pub album: Option<String>,
    pub year: Option<u32>,
    pub mbid_artist: Option<String>,
    pub mbid_album: Option<String>,
    pub mbid_relgrp: Option<String>,
    /// No single artist across the album's tracks.
    pub various: bool,
    pub tracks: usize,
}

impl AlbumContext {
    /// Album artist if known, otherwise the common track artist.
    pub fn main_artist(&self) -> Option<&str> {
        self.albumartist.as_deref().or(self.artist.as_deref())
    }
}

/// Tags one data provider returned for one grouping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceTags {
    pub source: String,
    pub grouping: Grouping,
    #[serde(default)]
    pub tags: Option<RawTagPayload>,
}

/// An album plus everything the providers said about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumRequest {
    pub album: AlbumContext,
    /// Overrides `album.various` when set.
    #[serde(default)]
    pub various: Option<bool>,
    #[serde(default)]
    pub sources: Vec<SourceTags>,
}

impl AlbumRequest {
    pub fn is_various(&self) -> bool {
        self.various.unwrap_or(self.album.various)
    }

    /// Run the whole album through the engine and return scored genres,
    /// best first. Sources outside `active` are skipped.
    pub fn score(
        &self,
        engine: &mut TagEngine<'_>,
        active: &[String],
    ) -> Result<Vec<(String, f64)>, EngineError> {
        engine.reset(&self.album);
        for entry in &self.sources {
            let source = entry.source.to_lowercase();
            if !active.contains(&source) {
                log::info!("Skipping inactive source {source}");
                continue;
            }
            let Some(tags) = &entry.tags else {
                continue;
            };
            let added = engine.add_tags(&source, entry.grouping, tags)?;
            log::info!(
                "{source:>8} {:<6} {added} of {} tags added",
                entry.grouping.as_str(),
                tags.len()
            );
        }
        Ok(engine.get_scored(self.is_various()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GenresConfig, ScoreConfig};
    use crate::rules::{RuleTable, RulesFile};

    const RULES: &str = r#"
        basictags = []
        uppercase = []
        dontsplit = []
        replace = []
        [filter.badtags]
        exact = ["seen live"]
        [filter.generic]
        exact = ["music"]
        [filter.instrument]
        [filter.location]
    "#;

    fn rules() -> RuleTable {
        let genres = GenresConfig {
            love: vec![],
            hate: vec![],
            blacklist: vec![],
            filters: vec![],
        };
        RuleTable::new(RulesFile::parse(RULES).unwrap(), &genres).unwrap()
    }

    #[test]
    fn test_request_from_json() {
        let json = r#"{
            "album": {"artist": "Miles Davis", "album": "Kind of Blue", "year": 1959},
            "sources": [
                {"source": "lastfm", "grouping": "album", "tags": {"jazz": 100, "seen live": 40, "modal": 30}},
                {"source": "discogs", "grouping": "album", "tags": ["jazz", "modal"]},
                {"source": "mbrainz", "grouping": "artist"},
                {"source": "whatcd", "grouping": "artist", "tags": ["cool jazz"]}
            ]
        }"#;
        let request: AlbumRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.album.main_artist(), Some("Miles Davis"));
        assert!(!request.is_various());
        assert_eq!(request.sources.len(), 4);
        assert!(request.sources[2].tags.is_none());

        let rules = rules();
        let scores = ScoreConfig::default();
        let mut engine = TagEngine::new(&rules, &scores);
        let active = vec!["lastfm".to_string(), "discogs".to_string(), "mbrainz".to_string()];
        let genres = request.score(&mut engine, &active).unwrap();
        let names: Vec<&str> = genres.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["Jazz", "Modal"]);
    }

    #[test]
    fn test_various_override() {
        let mut request: AlbumRequest =
            serde_json::from_str(r#"{"album": {"various": true}}"#).unwrap();
        assert!(request.is_various());
        request.various = Some(false);
        assert!(!request.is_various());
    }

    #[test]
    fn test_unknown_active_source_fails() {
        let request: AlbumRequest = serde_json::from_str(
            r#"{"album": {}, "sources": [{"source": "bandcamp", "grouping": "album", "tags": ["rock"]}]}"#,
        )
        .unwrap();
        let rules = rules();
        let scores = ScoreConfig::default();
        let mut engine = TagEngine::new(&rules, &scores);
        let err = request.score(&mut engine, &["bandcamp".to_string()]).unwrap_err();
        assert!(matches!(err, EngineError::UnknownSource(ref s) if s == "bandcamp"));
    }
}
