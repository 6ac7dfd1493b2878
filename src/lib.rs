pub mod album;
pub mod config;
pub mod engine;
pub mod matcher;
pub mod rules;
pub mod scanner;

/// Audio file extensions we read tags from
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "opus", "m4a", "aac", "wav",
    "aif", "aiff", "ape", "wv", "mpc", "spx",
];

/// Application name for XDG paths
pub const APP_NAME: &str = "genretags";
