//! Tag rule table: known tags, replacements, split rules and filter groups.
//!
//! The rules live in a TOML file (the built-in one is embedded from
//! `tags.toml`). [`RuleTable::new`] compiles it together with the user's
//! genre preferences into an immutable value that is built once at startup
//! and shared by reference with the tag engine.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::config::GenresConfig;

pub const BADTAGS: &str = "badtags";
pub const GENERIC: &str = "generic";
pub const INSTRUMENT: &str = "instrument";
pub const LOCATION: &str = "location";

/// Filter groups every rules file must define.
const REQUIRED_GROUPS: [&str; 4] = [BADTAGS, GENERIC, INSTRUMENT, LOCATION];
/// Filter groups that are active regardless of configuration.
const ALWAYS_ACTIVE: [&str; 2] = [BADTAGS, GENERIC];

const BUILTIN_RULES: &str = include_str!("tags.toml");

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse rules file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Rules file has no [{0}] section")]
    MissingSection(String),
    #[error("Configured filter '{0}' has no [filter.{0}] section in the rules file")]
    UnknownFilter(String),
    #[error("Invalid pattern in [{section}]: {source}")]
    Pattern {
        section: String,
        #[source]
        source: regex::Error,
    },
    #[error("Whitelist {0} contains no genres")]
    EmptyWhitelist(PathBuf),
}

/// Raw rules file, as deserialized from TOML.
#[derive(Debug, Deserialize)]
pub struct RulesFile {
    basictags: Option<Vec<String>>,
    uppercase: Option<Vec<String>>,
    dontsplit: Option<Vec<String>>,
    #[serde(default)]
    splitpart: Vec<String>,
    /// Ordered `[pattern, replacement]` pairs.
    replace: Option<Vec<(String, String)>>,
    #[serde(default)]
    aliases: BTreeMap<String, String>,
    #[serde(default)]
    filter: BTreeMap<String, FilterGroup>,
}

/// A named filter group. `exact` entries must match the whole tag,
/// `fuzzy` entries match anywhere inside it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FilterGroup {
    pub exact: Vec<String>,
    pub fuzzy: Vec<String>,
}

impl RulesFile {
    pub fn builtin() -> Result<Self, RuleError> {
        Self::parse(BUILTIN_RULES)
    }

    pub fn load(path: &Path) -> Result<Self, RuleError> {
        let contents = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, RuleError> {
        Ok(toml::from_str(contents)?)
    }
}

/// Compiled, immutable rule table.
#[derive(Debug)]
pub struct RuleTable {
    /// Static fuzzy-match vocabulary: basic tags plus love, hate and blacklist.
    vocabulary: BTreeSet<String>,
    aliases: HashMap<String, String>,
    /// Union of all replacement patterns, to skip the replace loop for most tags.
    replace_guard: Option<Regex>,
    replacements: Vec<(Regex, String)>,
    dont_split: Option<Regex>,
    split_part: Option<Regex>,
    uppercase: HashSet<String>,
    groups: HashMap<String, Regex>,
    active: Vec<String>,
    love: HashSet<String>,
    hate: HashSet<String>,
    blacklist: HashSet<String>,
    whitelist: Option<HashSet<String>>,
}

impl RuleTable {
    /// Compile a rules file with the user's genre preferences.
    ///
    /// Fails on missing required sections, invalid patterns, and configured
    /// filters without a matching `[filter.<name>]` group.
    pub fn new(file: RulesFile, genres: &GenresConfig) -> Result<Self, RuleError> {
        let basictags = required(file.basictags, "basictags")?;
        let uppercase = required(file.uppercase, "uppercase")?;
        let dontsplit = required(file.dontsplit, "dontsplit")?;
        let replace = required(file.replace, "replace")?;

        let filters: BTreeMap<String, FilterGroup> = file
            .filter
            .into_iter()
            .map(|(name, group)| (name.trim().to_lowercase(), group))
            .collect();

        for name in REQUIRED_GROUPS {
            if !filters.contains_key(name) {
                return Err(RuleError::MissingSection(format!("filter.{name}")));
            }
        }

        let mut groups = HashMap::new();
        for (name, group) in &filters {
            let section = format!("filter.{name}");
            let mut patterns = group.exact.clone();
            patterns.extend(group.fuzzy.iter().map(|f| format!(".*{f}.*")));
            if let Some(regex) = anchored(&section, &patterns)? {
                groups.insert(name.clone(), regex);
            }
        }

        let mut active: Vec<String> = ALWAYS_ACTIVE.iter().map(|s| s.to_string()).collect();
        for name in &genres.filters {
            let name = name.to_lowercase();
            if !filters.contains_key(&name) {
                return Err(RuleError::UnknownFilter(name));
            }
            if !active.contains(&name) {
                active.push(name);
            }
        }

        let mut replacements = Vec::with_capacity(replace.len());
        for (pattern, repl) in &replace {
            let regex = Regex::new(&format!("(?i){pattern}")).map_err(|source| {
                RuleError::Pattern {
                    section: "replace".into(),
                    source,
                }
            })?;
            replacements.push((regex, repl.to_lowercase()));
        }
        let guard = replace
            .iter()
            .map(|(pattern, _)| format!("(?:{pattern})"))
            .collect::<Vec<_>>();
        let replace_guard = if guard.is_empty() {
            None
        } else {
            Some(
                Regex::new(&format!("(?i){}", guard.join("|"))).map_err(|source| {
                    RuleError::Pattern {
                        section: "replace".into(),
                        source,
                    }
                })?,
            )
        };

        let love = lower_set(&genres.love);
        let hate = lower_set(&genres.hate);
        let blacklist = lower_set(&genres.blacklist);

        let mut vocabulary: BTreeSet<String> = lower_set(&basictags).into_iter().collect();
        vocabulary.extend(love.iter().cloned());
        vocabulary.extend(hate.iter().cloned());
        vocabulary.extend(blacklist.iter().cloned());

        let aliases = file
            .aliases
            .iter()
            .map(|(from, to)| (from.trim().to_lowercase(), to.trim().to_lowercase()))
            .collect();

        log::debug!(
            "Rule table: {} known tags, {} replacements, {} filter groups ({} active)",
            vocabulary.len(),
            replacements.len(),
            groups.len(),
            active.len()
        );

        Ok(Self {
            vocabulary,
            aliases,
            replace_guard,
            replacements,
            dont_split: anchored("dontsplit", &dontsplit)?,
            split_part: anchored("splitpart", &file.splitpart)?,
            uppercase: lower_set(&uppercase),
            groups,
            active,
            love,
            hate,
            blacklist,
            whitelist: None,
        })
    }

    /// Only accept tags on this whitelist.
    pub fn with_whitelist(mut self, whitelist: HashSet<String>) -> Self {
        self.whitelist = Some(whitelist);
        self
    }

    /// Known tag names seeded into every fuzzy match.
    pub fn vocabulary(&self) -> &BTreeSet<String> {
        &self.vocabulary
    }

    /// Resolve aliases, then apply every replacement in table order.
    pub fn replace(&self, name: &str) -> String {
        if let Some(alias) = self.aliases.get(name) {
            log::debug!("tag alias   {name} -> {alias}");
            return alias.clone();
        }
        match &self.replace_guard {
            Some(guard) if guard.is_match(name) => {
                let mut out = name.to_string();
                for (regex, repl) in &self.replacements {
                    out = regex.replace_all(&out, repl.as_str()).into_owned();
                }
                log::debug!("tag replace {name} -> {out}");
                out
            }
            _ => name.to_string(),
        }
    }

    /// Whether `name` matches the named filter group.
    pub fn in_group(&self, group: &str, name: &str) -> bool {
        self.groups.get(group).is_some_and(|regex| regex.is_match(name))
    }

    pub fn is_bad(&self, name: &str) -> bool {
        self.in_group(BADTAGS, name)
    }

    /// Blacklist, whitelist and active filter groups.
    pub fn is_filtered(&self, name: &str) -> bool {
        if self.blacklist.contains(name) {
            return true;
        }
        if self.whitelist.as_ref().is_some_and(|w| !w.contains(name)) {
            return true;
        }
        self.active.iter().any(|group| self.in_group(group, name))
    }

    pub fn is_dont_split(&self, name: &str) -> bool {
        self.dont_split.as_ref().is_some_and(|regex| regex.is_match(name))
    }

    pub fn is_split_part(&self, token: &str) -> bool {
        self.split_part.as_ref().is_some_and(|regex| regex.is_match(token))
    }

    pub fn is_uppercase(&self, token: &str) -> bool {
        self.uppercase.contains(token)
    }

    /// Love/hate multiplier for a canonical tag name.
    pub fn bonus(&self, name: &str) -> f64 {
        let mut bonus = 1.0;
        if self.love.contains(name) {
            bonus *= 2.0;
        }
        if self.hate.contains(name) {
            bonus *= 0.5;
        }
        bonus
    }

    /// Section sizes and filter states, for `genretags rules`.
    pub fn summary(&self) -> Vec<(String, String)> {
        let mut rows: Vec<(String, String)> = [
            ("known tags", self.vocabulary.len()),
            ("aliases", self.aliases.len()),
            ("replacements", self.replacements.len()),
            ("uppercase", self.uppercase.len()),
            ("love", self.love.len()),
            ("hate", self.hate.len()),
            ("blacklist", self.blacklist.len()),
        ]
        .into_iter()
        .map(|(name, count)| (name.to_string(), count.to_string()))
        .collect();
        if let Some(whitelist) = &self.whitelist {
            rows.push(("whitelist".to_string(), whitelist.len().to_string()));
        }
        let mut groups: Vec<&String> = self.groups.keys().collect();
        groups.sort();
        for group in groups {
            let state = if self.active.contains(group) { "active" } else { "inactive" };
            rows.push((format!("filter {group}"), state.to_string()));
        }
        rows
    }
}

/// Read a whitelist file: one genre per line, `#` starts a comment line.
pub fn read_whitelist(path: &Path) -> Result<HashSet<String>, RuleError> {
    let contents = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let whitelist: HashSet<String> = contents
        .lines()
        .map(|line| line.trim().to_lowercase())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();
    if whitelist.is_empty() {
        return Err(RuleError::EmptyWhitelist(path.to_path_buf()));
    }
    Ok(whitelist)
}

fn required<T>(section: Option<T>, name: &str) -> Result<T, RuleError> {
    section.ok_or_else(|| RuleError::MissingSection(name.to_string()))
}

fn lower_set(items: &[String]) -> HashSet<String> {
    items
        .iter()
        .map(|item| item.trim().to_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Compile patterns into one case-insensitive regex matching whole names.
fn anchored(section: &str, patterns: &[String]) -> Result<Option<Regex>, RuleError> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let alternation = patterns
        .iter()
        .map(|p| format!("(?:{p})"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i)^(?:{alternation})$"))
        .map(Some)
        .map_err(|source| RuleError::Pattern {
            section: section.to_string(),
            source,
        })
}
