//! Command-line interface definitions for capsearch.
//!
//! # Example
//!
//! ```bash
//! # Find images whose description mentions a dragon
//! capsearch search dragon
//!
//! # Search another folder, 8 concurrent requests, JSON output
//! capsearch search "red rose" --dir ~/tattoos --jobs 8 --output json
//!
//! # Describe every image up front, replacing cached descriptions
//! capsearch describe --refetch
//!
//! # Inspect or reset the cache
//! capsearch cache stats
//! capsearch cache clear
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::Overrides;
use crate::search::ResultOrder;

/// Search a folder of images by their AI-generated descriptions.
///
/// Each image is described once by a local vision model; descriptions are
/// cached on disk so later searches are instant.
#[derive(Debug, Parser)]
#[command(name = "capsearch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors and results
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    /// Report fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Path to a TOML config file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Find files whose description contains a query (case-insensitive)
    Search(SearchArgs),
    /// Describe every input file and print the descriptions
    Describe(DescribeArgs),
    /// Inspect or reset the description cache
    Cache(CacheArgs),
}

/// Options shared by every command that talks to the captioning service.
#[derive(Debug, Clone, Args)]
pub struct FetchArgs {
    /// Folder containing the files to describe
    #[arg(short, long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Path to the description cache file
    #[arg(long, value_name = "PATH")]
    pub cache: Option<PathBuf>,

    /// Include files in subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Number of concurrent requests to the captioning service
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Attempts per file before giving up
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Vision model to use
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Ollama server URL
    #[arg(long, value_name = "URL")]
    pub host: Option<String>,
}

impl FetchArgs {
    /// Convert to config overrides.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            data_dir: self.dir.clone(),
            cache_path: self.cache.clone(),
            recursive: self.recursive.then_some(true),
            host: self.host.clone(),
            model: self.model.clone(),
            max_attempts: self.max_attempts,
            jobs: self.jobs,
            order: None,
        }
    }
}

/// Arguments for the search subcommand.
#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Text to look for in descriptions (empty matches every described file)
    #[arg(value_name = "QUERY", default_value = "")]
    pub query: String,

    #[command(flatten)]
    pub fetch: FetchArgs,

    /// Order of the results
    #[arg(long, value_enum)]
    pub order: Option<ResultOrder>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the describe subcommand.
#[derive(Debug, Args)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub fetch: FetchArgs,

    /// Ignore cached descriptions and ask the service again
    #[arg(long)]
    pub refetch: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the cache subcommand.
#[derive(Debug, Args)]
pub struct CacheArgs {
    /// Path to the description cache file
    #[arg(long, global = true, value_name = "PATH")]
    pub cache: Option<PathBuf>,

    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache maintenance actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum CacheAction {
    /// Show the number of cached descriptions
    Stats,
    /// Remove every cached description
    Clear,
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_help() {
        let result = Cli::try_parse_from(["capsearch", "--help"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_search_basic() {
        let cli = Cli::try_parse_from(["capsearch", "search", "dragon"]).unwrap();
        assert_eq!(cli.verbose, 0);
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.query, "dragon");
                assert_eq!(args.output, OutputFormat::Text);
                assert!(args.order.is_none());
                assert!(args.fetch.dir.is_none());
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_parse_search_without_query() {
        let cli = Cli::try_parse_from(["capsearch", "search"]).unwrap();
        match cli.command {
            Commands::Search(args) => assert_eq!(args.query, ""),
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_parse_search_options() {
        let cli = Cli::try_parse_from([
            "capsearch",
            "-vv",
            "search",
            "red rose",
            "--dir",
            "/tmp/imgs",
            "--jobs",
            "8",
            "--max-attempts",
            "5",
            "--order",
            "completion",
            "--output",
            "json",
            "--recursive",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.query, "red rose");
                assert_eq!(args.fetch.dir, Some(PathBuf::from("/tmp/imgs")));
                assert_eq!(args.fetch.jobs, Some(8));
                assert_eq!(args.fetch.max_attempts, Some(5));
                assert_eq!(args.order, Some(ResultOrder::Completion));
                assert_eq!(args.output, OutputFormat::Json);

                let overrides = args.fetch.overrides();
                assert_eq!(overrides.recursive, Some(true));
                assert_eq!(overrides.jobs, Some(8));
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_parse_describe_refetch() {
        let cli = Cli::try_parse_from(["capsearch", "describe", "--refetch"]).unwrap();
        match cli.command {
            Commands::Describe(args) => {
                assert!(args.refetch);
                assert_eq!(args.fetch.overrides().recursive, None);
            }
            _ => panic!("Expected Describe command"),
        }
    }

    #[test]
    fn test_cli_parse_cache_actions() {
        let cli = Cli::try_parse_from(["capsearch", "cache", "stats"]).unwrap();
        match cli.command {
            Commands::Cache(args) => assert_eq!(args.action, CacheAction::Stats),
            _ => panic!("Expected Cache command"),
        }

        let cli =
            Cli::try_parse_from(["capsearch", "cache", "clear", "--cache", "/tmp/c.json"]).unwrap();
        match cli.command {
            Commands::Cache(args) => {
                assert_eq!(args.action, CacheAction::Clear);
                assert_eq!(args.cache, Some(PathBuf::from("/tmp/c.json")));
            }
            _ => panic!("Expected Cache command"),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["capsearch", "-q", "-v", "search", "x"]);
        assert!(result.is_err());
    }
}
