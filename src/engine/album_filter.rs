use std::sync::LazyLock;

use regex::Regex;

use crate::album::AlbumContext;

// Bracketed or quoted segments: "(Deluxe Edition)", "[Live]", "'Stop Making Sense'"
static ENCLOSED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\([^)]*\)|\[[^\]]*\]|\{[^}]*\}|"[^"]*"|'[^']*'"#).unwrap()
});

static STOPWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|\s)(the|and)(\s|$)").unwrap());

static NON_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Minimum alphanumeric length for a scrubbed token to become a filter.
const MIN_TOKEN_LEN: usize = 3;

/// Build a case-insensitive regex that matches tags restating the album's
/// own artist or title. Returns `None` if nothing usable remains.
pub fn build(album: &AlbumContext) -> Option<Regex> {
    let mut sources: Vec<&str> = Vec::new();
    let artist = album.main_artist().filter(|s| !is_unknown(s));
    if let Some(artist) = artist {
        sources.push(artist);
    }
    if let Some(title) = album.album.as_deref().filter(|s| !is_unknown(s)) {
        sources.push(title);
    }
    if let Some(artist) = artist.filter(|a| a.trim().contains(' ')) {
        sources.extend(artist.split_whitespace());
    }

    let mut tokens: Vec<String> = Vec::new();
    for source in sources {
        match scrub(source) {
            Some(token) if !tokens.contains(&token) => tokens.push(token),
            _ => {}
        }
    }
    if tokens.is_empty() {
        return None;
    }

    let pattern = format!("(?i)(?:{})", tokens.join("|"));
    match Regex::new(&pattern) {
        Ok(regex) => {
            log::debug!("album filter {pattern}");
            Some(regex)
        }
        Err(e) => {
            log::warn!("Invalid album filter {pattern}: {e}");
            None
        }
    }
}

/// Reduce a name to a wildcard pattern: words joined by `.*`.
fn scrub(raw: &str) -> Option<String> {
    let mut text = raw.to_lowercase();
    loop {
        let stripped = ENCLOSED_RE.replace_all(&text, " ");
        let stripped = STOPWORD_RE.replace_all(&stripped, " ").into_owned();
        if stripped == text {
            break;
        }
        text = stripped;
    }

    let words: Vec<String> = NON_WORD_RE
        .split(&text)
        .filter(|w| !w.is_empty())
        .map(regex::escape)
        .collect();
    let len: usize = words.iter().map(String::len).sum();
    if len < MIN_TOKEN_LEN {
        return None;
    }
    Some(words.join(".*"))
}

fn is_unknown(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn album(artist: &str, title: &str) -> AlbumContext {
        AlbumContext {
            albumartist: Some(artist.to_string()),
            album: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_scrub() {
        assert_eq!(scrub("The Beatles").as_deref(), Some("beatles"));
        assert_eq!(scrub("Abbey Road (Remastered)").as_deref(), Some("abbey.*road"));
        assert_eq!(scrub("AC/DC").as_deref(), Some("ac.*dc"));
        assert_eq!(scrub("Simon and Garfunkel").as_deref(), Some("simon.*garfunkel"));
        assert_eq!(scrub("The The").as_deref(), None);
        assert_eq!(scrub("U2").as_deref(), None);
        assert_eq!(scrub("[Live] 'Bonus'").as_deref(), None);
    }

    #[test]
    fn test_filter_matches_identity_tags() {
        let regex = build(&album("The Beatles", "Abbey Road")).unwrap();
        assert!(regex.is_match("beatles"));
        assert!(regex.is_match("the beatles"));
        assert!(regex.is_match("abbey road"));
        assert!(!regex.is_match("rock"));
    }

    #[test]
    fn test_filter_includes_artist_words() {
        let regex = build(&album("Pink Floyd", "Animals")).unwrap();
        assert!(regex.is_match("floyd"));
        assert!(regex.is_match("pink"));
        assert!(regex.is_match("pink floyd"));
        assert!(regex.is_match("animals"));
        assert!(!regex.is_match("psychedelic rock"));
    }

    #[test]
    fn test_falls_back_to_track_artist() {
        let context = AlbumContext {
            artist: Some("Portishead".into()),
            album: Some("Dummy".into()),
            ..Default::default()
        };
        let regex = build(&context).unwrap();
        assert!(regex.is_match("portishead"));
    }

    #[test]
    fn test_unknown_values_are_ignored() {
        assert!(build(&album("unknown", "")).is_none());
        assert!(build(&AlbumContext::default()).is_none());
    }
}
