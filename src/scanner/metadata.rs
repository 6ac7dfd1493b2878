use lofty::file::TaggedFileExt;
use lofty::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::album::AlbumContext;

/// Album-level tags of one audio file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackTags {
    pub artist: Option<String>,
    pub albumartist: Option<String>,
    pub album: Option<String>,
    pub year: Option<u32>,
    pub mbid_artist: Option<String>,
    pub mbid_album: Option<String>,
    pub mbid_relgrp: Option<String>,
}

/// Read tags from an audio file. Returns empty tags on failure.
pub fn read_tags(path: &Path) -> TrackTags {
    let tagged_file = match lofty::read_from_path(path) {
        Ok(f) => f,
        Err(e) => {
            log::debug!("Could not read tags from {}: {}", path.display(), e);
            return TrackTags::default();
        }
    };

    let tag = match tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        Some(t) => t,
        None => return TrackTags::default(),
    };

    let text = |key: &ItemKey| tag.get_string(key).and_then(clean);

    TrackTags {
        artist: tag.artist().as_deref().and_then(clean),
        albumartist: text(&ItemKey::AlbumArtist),
        album: tag.album().as_deref().and_then(clean),
        year: tag.year().filter(|y| *y > 0).or_else(|| {
            tag.get_string(&ItemKey::RecordingDate)
                .and_then(|d| d.get(..4))
                .and_then(|y| y.parse().ok())
        }),
        mbid_artist: text(&ItemKey::MusicBrainzArtistId),
        mbid_album: text(&ItemKey::MusicBrainzReleaseId),
        mbid_relgrp: text(&ItemKey::MusicBrainzReleaseGroupId),
    }
}

fn clean(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() { None } else { Some(value.to_string()) }
}

/// Derive an album's context from its tracks.
///
/// A field is set only when every track agrees on it. The album counts as
/// Various Artists when its album artist says so, or when there is no
/// common album artist and the tracks name more than one artist.
pub fn album_context(dir: &Path, tracks: &[TrackTags]) -> AlbumContext {
    let artist = common(tracks, |t| t.artist.as_deref());
    let albumartist = common(tracks, |t| t.albumartist.as_deref());

    let artists: BTreeSet<String> = tracks
        .iter()
        .filter_map(|t| t.artist.as_deref())
        .map(str::to_lowercase)
        .collect();
    let various = match albumartist.as_deref() {
        Some(name) => is_various_name(name),
        None => artists.len() > 1,
    };

    AlbumContext {
        path: Some(PathBuf::from(dir)),
        artist,
        albumartist,
        album: common(tracks, |t| t.album.as_deref()),
        year: common_by(tracks, |t| t.year),
        mbid_artist: common(tracks, |t| t.mbid_artist.as_deref()),
        mbid_album: common(tracks, |t| t.mbid_album.as_deref()),
        mbid_relgrp: common(tracks, |t| t.mbid_relgrp.as_deref()),
        various,
        tracks: tracks.len(),
    }
}

fn is_various_name(name: &str) -> bool {
    matches!(name.to_lowercase().as_str(), "various artists" | "various" | "va")
}

fn common<'a>(
    tracks: &'a [TrackTags],
    field: impl Fn(&'a TrackTags) -> Option<&'a str>,
) -> Option<String> {
    common_by(tracks, field).map(str::to_string)
}

/// The value every track has, or `None` if any track lacks it or differs.
fn common_by<'a, T: PartialEq>(
    tracks: &'a [TrackTags],
    field: impl Fn(&'a TrackTags) -> Option<T>,
) -> Option<T> {
    let mut values = tracks.iter().map(field);
    let first = values.next()??;
    for value in values {
        if value.as_ref() != Some(&first) {
            return None;
        }
    }
    Some(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(artist: &str, album: &str) -> TrackTags {
        TrackTags {
            artist: Some(artist.into()),
            album: Some(album.into()),
            year: Some(1997),
            ..Default::default()
        }
    }

    #[test]
    fn test_common_values() {
        let tracks = vec![track("Radiohead", "OK Computer"), track("Radiohead", "OK Computer")];
        let context = album_context(Path::new("/music/ok"), &tracks);
        assert_eq!(context.artist.as_deref(), Some("Radiohead"));
        assert_eq!(context.album.as_deref(), Some("OK Computer"));
        assert_eq!(context.year, Some(1997));
        assert_eq!(context.tracks, 2);
        assert!(!context.various);
        assert!(context.mbid_album.is_none());
    }

    #[test]
    fn test_disagreeing_tracks_are_unknown() {
        let mut second = track("Massive Attack", "Mezzanine");
        second.year = Some(1998);
        let tracks = vec![track("Radiohead", "OK Computer"), second];
        let context = album_context(Path::new("/music/mix"), &tracks);
        assert!(context.artist.is_none());
        assert!(context.album.is_none());
        assert!(context.year.is_none());
        assert!(context.various);
    }

    #[test]
    fn test_missing_value_is_unknown() {
        let mut second = track("Radiohead", "OK Computer");
        second.year = None;
        let tracks = vec![track("Radiohead", "OK Computer"), second];
        assert!(album_context(Path::new("/x"), &tracks).year.is_none());
    }

    #[test]
    fn test_album_artist() {
        let mut tracks = vec![track("Sade", "Now 12"), track("Seal", "Now 12")];
        for t in &mut tracks {
            t.albumartist = Some("Soul II Soul".into());
        }
        let context = album_context(Path::new("/x"), &tracks);
        assert!(!context.various);
        assert_eq!(context.main_artist(), Some("Soul II Soul"));

        for t in &mut tracks {
            t.albumartist = Some("Various Artists".into());
        }
        assert!(album_context(Path::new("/x"), &tracks).various);
    }

    #[test]
    fn test_read_tags_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mp3");
        std::fs::write(&path, b"not audio").unwrap();
        assert_eq!(read_tags(&path), TrackTags::default());
    }
}
