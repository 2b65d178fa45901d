//! Repository filtering, summary statistics, CSV rows and the stale-branch
//! feed.
//!
//! Filtering runs once over the listed repositories before any per-repository
//! request is made. Everything after it tolerates per-repository branch
//! failures: a repository whose branches cannot be listed is skipped or
//! marked, never fatal.

use chrono::{DateTime, Utc};
use std::borrow::Cow;
use tracing::debug;

use super::classify::{
    is_older_than, is_older_than_at, months_between, BRANCH_STALE_MONTHS, REPO_STALE_MONTHS,
};
use crate::api::{ApiError, RepositoryApi};
use crate::models::{Branch, EnrichedRepository, Repository, SummaryStats};

/// Branches never reported by the stale-branch feed.
pub const PROTECTED_BRANCHES: [&str; 3] = ["main", "master", "develop"];

/// Column header for CSV output.
pub const CSV_HEADER: &str = "Repository Name,Owner,Creator,Date Created,Date Last Accessed,Main Branch,Repo Age (months),Last Access (months),Branch Name,Branch Date Created,Branch Last Pushed,Branch Last Pushed By,Branch Age (months)";

const CSV_DATE: &str = "%Y-%m-%d";

/// Case-insensitive include/exclude name filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl RepoFilter {
    pub fn new<I, E>(include: I, exclude: E) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self {
            include: normalize_terms(include),
            exclude: normalize_terms(exclude),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Warning for the operator when both term sets were given.
    pub fn precedence_warning(&self) -> Option<String> {
        if self.include.is_empty() || self.exclude.is_empty() {
            return None;
        }
        Some(format!(
            "Both include ({}) and exclude ({}) terms given; include terms take precedence and exclude terms are ignored",
            self.include.join(", "),
            self.exclude.join(", ")
        ))
    }

    /// Whether a repository name passes the filter.
    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_lowercase();

        if !self.include.is_empty() {
            return self.include.iter().any(|term| name.contains(term.as_str()));
        }

        !self.exclude.iter().any(|term| name.contains(term.as_str()))
    }

    /// Keep the repositories that pass, preserving order.
    ///
    /// Reporting [`precedence_warning`](Self::precedence_warning) is up to
    /// the caller.
    pub fn apply(&self, repositories: Vec<Repository>) -> Vec<Repository> {
        if self.is_empty() {
            return repositories;
        }

        let before = repositories.len();
        let kept: Vec<Repository> = repositories
            .into_iter()
            .filter(|r| self.matches(&r.name))
            .collect();
        debug!("Filter kept {} of {} repositories", kept.len(), before);

        kept
    }
}

fn normalize_terms<T>(terms: T) -> Vec<String>
where
    T: IntoIterator,
    T::Item: AsRef<str>,
{
    terms
        .into_iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Count old and recent repositories and branches.
pub async fn build_summary<A>(api: &A, repositories: &[Repository]) -> SummaryStats
where
    A: RepositoryApi + ?Sized,
{
    build_summary_at(api, repositories, Utc::now()).await
}

pub async fn build_summary_at<A>(
    api: &A,
    repositories: &[Repository],
    now: DateTime<Utc>,
) -> SummaryStats
where
    A: RepositoryApi + ?Sized,
{
    let mut stats = SummaryStats {
        total_repos: repositories.len(),
        ..SummaryStats::default()
    };

    for repo in repositories {
        if is_older_than_at(repo.updated_on, REPO_STALE_MONTHS, now) {
            stats.old_repos += 1;
        } else {
            stats.recent_repos += 1;
        }

        let branches = match api.list_branches(&repo.full_name).await {
            Ok(branches) => branches,
            Err(e) => {
                debug!("Skipping branches of {}: {}", repo.full_name, e.short_message());
                stats.branch_fetch_failures += 1;
                continue;
            }
        };

        stats.total_branches += branches.len();
        for branch in &branches {
            if is_older_than_at(branch.last_pushed(), BRANCH_STALE_MONTHS, now) {
                stats.old_branches += 1;
            } else {
                stats.recent_branches += 1;
            }
        }
    }

    stats
}

/// Quote a CSV field if it contains a comma, quote or newline.
pub fn escape_csv(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Branch details available for a repository's CSV rows.
pub enum BranchRows<'a> {
    /// Repository-only output: one row, branch columns empty.
    Skipped,
    Listed(&'a [Branch]),
    Failed(&'a ApiError),
}

/// CSV rows for one repository.
pub fn repository_rows(
    enriched: &EnrichedRepository,
    branches: BranchRows<'_>,
    now: DateTime<Utc>,
) -> Vec<String> {
    let repo = &enriched.repository;
    let prefix = [
        escape_csv(&repo.name).into_owned(),
        escape_csv(&repo.owner.display_name).into_owned(),
        escape_csv(&enriched.creator).into_owned(),
        repo.created_on.format(CSV_DATE).to_string(),
        repo.updated_on.format(CSV_DATE).to_string(),
        escape_csv(repo.main_branch_name()).into_owned(),
        months_between(repo.created_on, now).to_string(),
        months_between(repo.updated_on, now).to_string(),
    ]
    .join(",");

    match branches {
        BranchRows::Skipped => vec![format!("{},,,,,", prefix)],
        BranchRows::Failed(e) => {
            let cell = format!("ERROR: {}", e);
            vec![format!("{},{},,,,", prefix, escape_csv(&cell))]
        }
        BranchRows::Listed(branches) => branches
            .iter()
            .map(|branch| {
                let pushed = branch.last_pushed().format(CSV_DATE).to_string();
                format!(
                    "{},{},{},{},{},{}",
                    prefix,
                    escape_csv(&branch.name),
                    pushed,
                    pushed,
                    escape_csv(branch.pushed_by()),
                    months_between(branch.last_pushed(), now)
                )
            })
            .collect(),
    }
}

/// CSV rows for every enriched repository, fetching branches unless
/// `repo_only` is set.
pub async fn csv_rows<A>(
    api: &A,
    enriched: &[EnrichedRepository],
    repo_only: bool,
    now: DateTime<Utc>,
) -> Vec<String>
where
    A: RepositoryApi + ?Sized,
{
    let mut rows = Vec::new();

    for entry in enriched {
        if repo_only {
            rows.extend(repository_rows(entry, BranchRows::Skipped, now));
            continue;
        }

        match api.list_branches(&entry.repository.full_name).await {
            Ok(branches) => rows.extend(repository_rows(entry, BranchRows::Listed(&branches), now)),
            Err(e) => rows.extend(repository_rows(entry, BranchRows::Failed(&e), now)),
        }
    }

    rows
}

/// `full_name:branch` for each stale, unprotected branch of a repository.
pub fn stale_branches_for(repo: &Repository, branches: &[Branch]) -> Vec<String> {
    branches
        .iter()
        .filter(|b| !PROTECTED_BRANCHES.contains(&b.name.as_str()))
        .filter(|b| is_older_than(b.last_pushed(), BRANCH_STALE_MONTHS))
        .map(|b| format!("{}:{}", repo.full_name, b.name))
        .collect()
}

/// Stale-branch feed across repositories, for piping into a cleanup tool.
///
/// Repositories whose branches cannot be listed are skipped without a trace.
pub async fn stale_branch_feed<A>(api: &A, repositories: &[Repository]) -> Vec<String>
where
    A: RepositoryApi + ?Sized,
{
    let mut lines = Vec::new();

    for repo in repositories {
        if let Ok(branches) = api.list_branches(&repo.full_name).await {
            lines.extend(stale_branches_for(repo, &branches));
        }
    }

    lines
}
