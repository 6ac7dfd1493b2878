pub mod metadata;

use crate::SUPPORTED_EXTENSIONS;
use crate::album::AlbumContext;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Progress bar template: {0}")]
    Template(#[from] indicatif::style::TemplateError),
}

/// Scan directories for audio files and describe every album found.
///
/// An album is a directory directly containing supported audio files.
/// Albums are returned in path order.
pub fn scan(paths: &[PathBuf]) -> Result<Vec<AlbumContext>, ScanError> {
    // First pass: collect audio files, grouped by directory
    let mut albums: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for path in paths {
        if !path.is_dir() {
            return Err(ScanError::NotADirectory(path.clone()));
        }
        for entry in WalkDir::new(path).follow_links(true).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() || !is_audio(entry.path()) {
                continue;
            }
            let dir = entry.path().parent().map(Path::to_path_buf).unwrap_or_default();
            albums.entry(dir).or_default().push(entry.into_path());
        }
    }

    let total: usize = albums.values().map(Vec::len).sum();
    log::info!("Found {} audio files in {} directories", total, albums.len());

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) ({eta}) {msg}",
        )?
        .progress_chars("#>-"),
    );
    pb.set_message("Reading tags...");

    let mut contexts = Vec::with_capacity(albums.len());
    for (dir, mut files) in albums {
        files.sort();
        let tracks: Vec<metadata::TrackTags> = files
            .iter()
            .map(|file| {
                let tags = metadata::read_tags(file);
                pb.inc(1);
                tags
            })
            .collect();
        let context = metadata::album_context(&dir, &tracks);
        log::debug!(
            "{}: {} / {} ({} tracks{})",
            dir.display(),
            context.main_artist().unwrap_or("unknown"),
            context.album.as_deref().unwrap_or("unknown"),
            context.tracks,
            if context.various { ", various" } else { "" }
        );
        contexts.push(context);
    }

    pb.finish_with_message(format!("Done: {} albums", contexts.len()));
    Ok(contexts)
}

fn is_audio(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_files_by_directory() {
        let root = tempfile::tempdir().unwrap();
        let first = root.path().join("Artist/First Album");
        let second = root.path().join("Artist/Second Album");
        std::fs::create_dir_all(&first).unwrap();
        std::fs::create_dir_all(&second).unwrap();
        for name in ["01.mp3", "02.FLAC", "cover.jpg", "notes.txt"] {
            std::fs::write(first.join(name), b"x").unwrap();
        }
        std::fs::write(second.join("01.ogg"), b"x").unwrap();

        let albums = scan(&[root.path().to_path_buf()]).unwrap();
        assert_eq!(albums.len(), 2);
        assert_eq!(albums[0].path.as_deref(), Some(first.as_path()));
        assert_eq!(albums[0].tracks, 2);
        assert_eq!(albums[1].tracks, 1);
        // unreadable files carry no tags
        assert!(albums[0].artist.is_none());
        assert!(!albums[0].various);
    }

    #[test]
    fn test_empty_and_missing_directories() {
        let root = tempfile::tempdir().unwrap();
        assert!(scan(&[root.path().to_path_buf()]).unwrap().is_empty());

        let missing = root.path().join("missing");
        assert!(matches!(
            scan(&[missing]),
            Err(ScanError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_is_audio() {
        assert!(is_audio(Path::new("a/b.mp3")));
        assert!(is_audio(Path::new("a/b.Opus")));
        assert!(!is_audio(Path::new("a/b.cue")));
        assert!(!is_audio(Path::new("a/mp3")));
    }
}
