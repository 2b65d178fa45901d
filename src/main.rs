//! bhunter - Bitbucket workspace staleness auditor
//!
//! Lists the repositories of a Bitbucket Cloud workspace with their inferred
//! creators and branch activity, and flags repositories and branches that
//! have gone stale.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (missing credentials, config, API failure, etc.)

mod analysis;
mod api;
mod cli;
mod config;
mod enrich;
mod models;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputMode};
use config::{Config, Credentials};
use indicatif::{ProgressBar, ProgressStyle};
use models::Repository;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::analysis::RepoFilter;
use crate::api::{BitbucketClient, RepositoryApi};
use crate::enrich::ProgressFn;

const SAMPLE_CONFIG_PATH: &str = "bhunter.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("bhunter v{}", env!("CARGO_PKG_VERSION"));
    debug!("Output mode: {:?}", args.output_mode());

    let mode = args.output_mode();
    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            // The feed is consumed by other programs: fail without any output.
            if mode != OutputMode::StaleFeed {
                error!("Audit failed: {:#}", e);
                eprintln!("\n❌ Error: {:#}", e);
            }
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a sample bhunter.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(SAMPLE_CONFIG_PATH);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            SAMPLE_CONFIG_PATH
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", SAMPLE_CONFIG_PATH))?;

    println!("✅ Created {} with default settings.", SAMPLE_CONFIG_PATH);
    println!("   Add your username and app password under [auth].");
    Ok(())
}

/// Initialize logging on stderr based on verbosity and output mode.
///
/// `RUST_LOG` overrides the computed level, except in feed mode where
/// nothing is logged at all.
fn init_logging(args: &Args) {
    let level = args.log_level();
    if level == tracing::level_filters::LevelFilter::OFF {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete audit workflow.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.apply_env();
    let credentials = config.credentials()?;

    info!("Auditing workspace: {}", credentials.workspace);

    let client = BitbucketClient::new(
        &config.audit.base_url,
        &credentials.username,
        &credentials.app_password,
        Duration::from_secs(config.audit.timeout_seconds),
    )
    .context("Failed to create HTTP client")?;
    let api = Arc::new(client);

    let plan = AuditPlan {
        mode: args.output_mode(),
        repo_only: args.repo_only,
        concurrency: config.audit.concurrency,
    };

    let Fetched {
        repositories,
        filter_warning,
    } = fetch_repositories(api.as_ref(), &credentials, &config, args.repo.as_deref(), plan.mode)
        .await?;

    // Not a log line: shown even with --quiet.
    if let Some(warning) = filter_warning {
        if plan.mode != OutputMode::StaleFeed {
            eprintln!("⚠️  {}", warning);
        }
    }

    let spinner = (plan.mode == OutputMode::Listing && !args.quiet && plan.needs_enrichment())
        .then(|| creator_spinner(repositories.len()));
    let progress: Option<Box<ProgressFn>> = spinner.clone().map(|pb| {
        Box::new(move |done: usize, total: usize| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        }) as Box<ProgressFn>
    });

    let output = produce_report(api, repositories, &plan, progress.as_deref()).await?;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    print!("{}", output);
    Ok(())
}

/// Load configuration from an explicit path, or discover one.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::discover()? {
        Some((path, config)) => {
            info!("Loaded config from {}", path.display());
            Ok(config)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

/// Repositories to audit, plus the filter precedence warning if any.
#[derive(Debug)]
struct Fetched {
    repositories: Vec<Repository>,
    filter_warning: Option<String>,
}

/// List the workspace (then filter) or fetch the one named repository.
async fn fetch_repositories<A>(
    api: &A,
    credentials: &Credentials,
    config: &Config,
    single: Option<&str>,
    mode: OutputMode,
) -> Result<Fetched>
where
    A: RepositoryApi + ?Sized,
{
    if let Some(name) = single {
        let repo = match api.get_repository(&credentials.workspace, name).await {
            Ok(repo) => repo,
            Err(e) => {
                let hint = if mode == OutputMode::Listing && e.status() == Some(404) {
                    " (repository names are case-sensitive)"
                } else {
                    ""
                };
                return Err(anyhow::Error::new(e).context(format!(
                    "Failed to fetch repository '{}' in workspace '{}'{}",
                    name, credentials.workspace, hint
                )));
            }
        };
        return Ok(Fetched {
            repositories: vec![repo],
            filter_warning: None,
        });
    }

    let repositories = api
        .list_repositories(&credentials.workspace)
        .await
        .with_context(|| format!("Failed to list repositories in '{}'", credentials.workspace))?;
    info!(
        "Found {} repositories in workspace {}",
        repositories.len(),
        credentials.workspace
    );

    let filter = RepoFilter::new(&config.audit.include, &config.audit.exclude);
    let kept = filter.apply(repositories);
    if !filter.is_empty() {
        info!("{} repositories after filtering", kept.len());
    }

    Ok(Fetched {
        repositories: kept,
        filter_warning: filter.precedence_warning(),
    })
}

fn creator_spinner(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} Looking up creators {pos}/{len}")
    {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// What to render and how hard to work for it.
#[derive(Debug, Clone, Copy)]
struct AuditPlan {
    mode: OutputMode,
    repo_only: bool,
    concurrency: usize,
}

impl AuditPlan {
    /// Summary and feed never show creators.
    fn needs_enrichment(&self) -> bool {
        !matches!(self.mode, OutputMode::Summary | OutputMode::StaleFeed)
    }
}

/// Build the complete stdout payload for the selected mode.
async fn produce_report<A>(
    api: Arc<A>,
    repositories: Vec<Repository>,
    plan: &AuditPlan,
    progress: Option<&ProgressFn>,
) -> Result<String>
where
    A: RepositoryApi + ?Sized + 'static,
{
    match plan.mode {
        OutputMode::StaleFeed => {
            let lines = analysis::stale_branch_feed(api.as_ref(), &repositories).await;
            Ok(lines.into_iter().map(|l| l + "\n").collect())
        }
        OutputMode::Summary => {
            let stats = analysis::build_summary(api.as_ref(), &repositories).await;
            Ok(report::generate_summary_report(&stats))
        }
        OutputMode::Csv | OutputMode::Json | OutputMode::Listing => {
            let enriched = enrich::enrich(
                Arc::clone(&api),
                repositories.clone(),
                plan.concurrency,
                progress,
            )
            .await;
            let enriched = enrich::restore_input_order(&repositories, enriched);
            let now = Utc::now();

            match plan.mode {
                OutputMode::Csv => {
                    let rows = analysis::csv_rows(api.as_ref(), &enriched, plan.repo_only, now).await;
                    Ok(report::generate_csv(&rows))
                }
                OutputMode::Json => {
                    let mut json = report::generate_json_report(&enriched)
                        .context("Failed to serialize repositories")?;
                    json.push('\n');
                    Ok(json)
                }
                _ => {
                    let mut out = String::new();
                    for entry in &enriched {
                        if plan.repo_only {
                            out.push_str(&report::generate_repository_section(entry, None, now));
                            continue;
                        }
                        let branches = api.list_branches(&entry.repository.full_name).await;
                        let section = report::generate_repository_section(
                            entry,
                            Some(branches.as_deref()),
                            now,
                        );
                        out.push_str(&section);
                    }
                    Ok(out)
                }
            }
        }
    }
}
