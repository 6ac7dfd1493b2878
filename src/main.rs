use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use genretags::album::AlbumRequest;
use genretags::config::AppConfig;
use genretags::engine::TagEngine;
use genretags::rules::{self, RuleTable, RulesFile};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "genretags", version, about = "Genre tag normalizer and scorer")]
struct Cli {
    /// Rules file to use instead of the configured or built-in one
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score genres for one album from a JSON document of source tags
    Genres {
        /// Album JSON file ("-" reads stdin)
        input: PathBuf,

        /// Number of genres to keep (defaults to config tag_limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Print every genre with its score
        #[arg(long)]
        all: bool,
    },

    /// Scan directories and print the album contexts found as JSON
    Scan {
        /// Directories to scan (defaults to config file music_dirs)
        paths: Vec<PathBuf>,
    },

    /// Validate the rule table and summarize it
    Rules,

    /// Print the display form of canonical tag names
    Format {
        /// Tag names, e.g. "nu jazz"
        #[arg(required = true)]
        names: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let mut config = AppConfig::load();
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Commands::Scan { paths } => {
            // Resolve scan paths: CLI args > config music_dirs
            let scan_paths = if !paths.is_empty() {
                paths
            } else if !config.music_dirs.is_empty() {
                config.music_dirs.clone()
            } else {
                anyhow::bail!(
                    "No directories to scan. Pass paths as arguments or set music_dirs in config."
                );
            };

            let albums = genretags::scanner::scan(&scan_paths).context("Scan failed")?;
            let json = serde_json::to_string_pretty(&albums)?;
            println!("{json}");
        }

        Commands::Genres { input, limit, all } => {
            let table = load_rules(&config, cli.rules.as_deref())?;
            let request = read_request(&input)?;
            let mut engine = TagEngine::new(&table, &config.scores);
            let genres = request
                .score(&mut engine, &config.sources)
                .context("Genre scoring failed")?;

            if all {
                for (name, score) in &genres {
                    println!("{score:6.3}  {name}");
                }
            } else {
                let limit = limit.unwrap_or(config.tag_limit);
                let names: Vec<&str> = genres
                    .iter()
                    .take(limit)
                    .map(|(name, _)| name.as_str())
                    .collect();
                println!("{}", names.join(", "));
            }
        }

        Commands::Rules => {
            let table = load_rules(&config, cli.rules.as_deref())?;
            println!("{:<20} {}", "section", "entries");
            println!("{}", "-".repeat(32));
            for (name, value) in table.summary() {
                println!("{name:<20} {value}");
            }
            println!();
            println!("Active sources: {}", config.sources.join(", "));
        }

        Commands::Format { names } => {
            let table = load_rules(&config, cli.rules.as_deref())?;
            let engine = TagEngine::new(&table, &config.scores);
            for name in names {
                println!("{}", engine.format(&name.trim().to_lowercase()));
            }
        }
    }

    Ok(())
}

/// Compile the rule table once: CLI rules file > config rules_path > built-in.
fn load_rules(config: &AppConfig, cli_path: Option<&Path>) -> Result<RuleTable> {
    let file = match cli_path.or(config.rules_path.as_deref()) {
        Some(path) => {
            log::info!("Rules: {}", path.display());
            RulesFile::load(path)?
        }
        None => RulesFile::builtin()?,
    };
    let mut table = RuleTable::new(file, &config.genres).context("Invalid rule table")?;

    if let Some(path) = &config.whitelist_path {
        let whitelist = rules::read_whitelist(path).context("Failed to load whitelist")?;
        log::info!("Whitelist: {} genres from {}", whitelist.len(), path.display());
        table = table.with_whitelist(whitelist);
    }
    Ok(table)
}

fn read_request(input: &Path) -> Result<AlbumRequest> {
    let contents = if input.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))?
    };
    serde_json::from_str(&contents)
        .with_context(|| format!("Invalid album document {}", input.display()))
}
