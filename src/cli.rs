//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and the selected output mode.

use clap::Parser;
use std::path::PathBuf;

/// bhunter - find stale repositories and branches in a Bitbucket workspace
///
/// Lists every repository in a workspace with its inferred creator and
/// branch activity, highlighting repositories not accessed for 12 months and
/// branches not pushed for 6 months.
///
/// Examples:
///   bhunter                                   # all repositories with branches
///   bhunter --repo-only                       # repository information only
///   bhunter --summary                         # summary statistics only
///   bhunter -r my-repo                        # a single repository
///   bhunter --exclude archive,sandbox --csv   # CSV without archived repos
///   bhunter --output | bkiller                # stale branches for piping
///   bhunter --init-config                     # write a sample bhunter.toml
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Bitbucket username
    #[arg(short, long)]
    pub username: Option<String>,

    /// Bitbucket app password
    #[arg(short, long)]
    pub password: Option<String>,

    /// Bitbucket workspace (defaults to the username)
    #[arg(short, long)]
    pub workspace: Option<String>,

    /// Analyze only this repository
    #[arg(short, long, value_name = "NAME")]
    pub repo: Option<String>,

    /// Only repositories whose name contains one of these terms (comma-separated)
    ///
    /// Takes precedence over --exclude when both are given.
    #[arg(long, value_name = "TERMS", value_delimiter = ',')]
    pub include: Option<Vec<String>>,

    /// Skip repositories whose name contains one of these terms (comma-separated)
    #[arg(long, value_name = "TERMS", value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,

    /// Show only repository information (no branch details)
    #[arg(long)]
    pub repo_only: bool,

    /// Print stale branches (>6 months) as workspace/repo:branch for piping
    #[arg(short, long, conflicts_with_all = ["csv", "summary", "json"])]
    pub output: bool,

    /// Output repository information in CSV format
    #[arg(long, conflicts_with_all = ["summary", "json"])]
    pub csv: bool,

    /// Show summary statistics (repos, branches, old branches)
    #[arg(long, conflicts_with = "json")]
    pub summary: bool,

    /// Output enriched repositories as JSON
    #[arg(long)]
    pub json: bool,

    /// Number of concurrent creator lookups
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Bitbucket API base URL
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, bhunter.toml and friends are searched in the current
    /// and home directories
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a sample bhunter.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// What the run produces on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Colored per-repository listing.
    Listing,
    Summary,
    Csv,
    Json,
    /// `workspace/repo:branch` lines, nothing else.
    StaleFeed,
}

impl OutputMode {
    /// Modes whose stdout is meant for other programs.
    pub fn is_machine_readable(self) -> bool {
        !matches!(self, OutputMode::Listing)
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if let Some(concurrency) = self.concurrency {
            if concurrency == 0 {
                return Err("Concurrency must be at least 1".to_string());
            }
        }

        if let Some(ref url) = self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref repo) = self.repo {
            if repo.trim().is_empty() || repo.contains('/') {
                return Err("Repository name must be a bare name without '/'".to_string());
            }
        }

        Ok(())
    }

    /// The selected output mode.
    pub fn output_mode(&self) -> OutputMode {
        if self.output {
            OutputMode::StaleFeed
        } else if self.csv {
            OutputMode::Csv
        } else if self.summary {
            OutputMode::Summary
        } else if self.json {
            OutputMode::Json
        } else {
            OutputMode::Listing
        }
    }

    /// Returns the log level based on verbosity settings and output mode.
    pub fn log_level(&self) -> tracing::level_filters::LevelFilter {
        use tracing::level_filters::LevelFilter;

        match self.output_mode() {
            OutputMode::StaleFeed => LevelFilter::OFF,
            _ if self.quiet => LevelFilter::ERROR,
            _ if self.verbose => LevelFilter::DEBUG,
            mode if mode.is_machine_readable() => LevelFilter::WARN,
            _ => LevelFilter::INFO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    fn make_args() -> Args {
        Args {
            username: Some("alice".to_string()),
            password: Some("secret".to_string()),
            ..Args::default()
        }
    }

    #[test]
    fn test_parse_comma_separated_terms() {
        let args = Args::try_parse_from(["bhunter", "--include", "api,web", "--exclude", "archive"])
            .unwrap();
        assert_eq!(args.include, Some(vec!["api".to_string(), "web".to_string()]));
        assert_eq!(args.exclude, Some(vec!["archive".to_string()]));
    }

    #[test]
    fn test_output_modes_conflict() {
        assert!(Args::try_parse_from(["bhunter", "--csv", "--summary"]).is_err());
        assert!(Args::try_parse_from(["bhunter", "-o", "--json"]).is_err());
    }

    #[test]
    fn test_output_mode_selection() {
        let mut args = make_args();
        assert_eq!(args.output_mode(), OutputMode::Listing);

        args.csv = true;
        assert_eq!(args.output_mode(), OutputMode::Csv);

        args.csv = false;
        args.output = true;
        assert_eq!(args.output_mode(), OutputMode::StaleFeed);
    }

    #[test]
    fn test_validation_zero_concurrency() {
        let mut args = make_args();
        args.concurrency = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_bad_base_url() {
        let mut args = make_args();
        args.base_url = Some("api.bitbucket.org".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_repo_with_slash() {
        let mut args = make_args();
        args.repo = Some("acme/api".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), LevelFilter::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), LevelFilter::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), LevelFilter::ERROR);

        args.quiet = false;
        args.csv = true;
        assert_eq!(args.log_level(), LevelFilter::WARN);

        args.csv = false;
        args.output = true;
        assert_eq!(args.log_level(), LevelFilter::OFF);
    }
}
