//! Text, summary, CSV and JSON report generation.
//!
//! Everything here builds strings; printing is left to the caller.

use anyhow::Result;
use chrono::{DateTime, Utc};
use console::style;

use crate::analysis::{is_older_than_at, CSV_HEADER, BRANCH_STALE_MONTHS, REPO_STALE_MONTHS};
use crate::api::ApiError;
use crate::models::{Branch, EnrichedRepository, SummaryStats};

fn format_date(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Generate the listing block for one repository.
///
/// `branches` is `None` in repository-only mode.
pub fn generate_repository_section(
    enriched: &EnrichedRepository,
    branches: Option<Result<&[Branch], &ApiError>>,
    now: DateTime<Utc>,
) -> String {
    let repo = &enriched.repository;
    let mut section = String::new();

    section.push_str(&format!(
        "\n{}\n",
        style(format!("Repository: {}", repo.name)).green().bold()
    ));
    section.push_str(&format!("  Name: {}\n", repo.name));
    section.push_str(&format!(
        "  Owner: {} ({})\n",
        repo.owner.display_name, repo.owner.username
    ));
    section.push_str(&format!("  Creator: {}\n", enriched.creator));
    section.push_str(&format!("  Date Created: {}\n", format_date(repo.created_on)));

    let last_accessed = format_date(repo.updated_on);
    if is_older_than_at(repo.updated_on, REPO_STALE_MONTHS, now) {
        section.push_str(&format!(
            "  Date Last Accessed: {}\n",
            style(last_accessed).yellow()
        ));
    } else {
        section.push_str(&format!("  Date Last Accessed: {}\n", last_accessed));
    }
    section.push_str(&format!("  Main Branch: {}\n", repo.main_branch_name()));

    let branches = match branches {
        Some(b) => b,
        None => return section,
    };

    section.push_str("\n  Branches:\n");
    match branches {
        Err(e) => {
            section.push_str(&format!("    Error fetching branches: {}\n", e));
        }
        Ok(branches) => {
            for branch in branches {
                section.push_str(&generate_branch_block(branch, now));
            }
        }
    }

    section
}

fn generate_branch_block(branch: &Branch, now: DateTime<Utc>) -> String {
    let mut block = String::new();
    let pushed = format_date(branch.last_pushed());

    block.push_str(&format!(
        "    {}\n",
        style(format!("Branch: {}", branch.name)).cyan().bold()
    ));
    block.push_str(&format!("      Name: {}\n", branch.name));
    block.push_str(&format!("      Date Created: {}\n", pushed));
    if is_older_than_at(branch.last_pushed(), BRANCH_STALE_MONTHS, now) {
        block.push_str(&format!("      Date Last Pushed: {}\n", style(&pushed).red()));
    } else {
        block.push_str(&format!("      Date Last Pushed: {}\n", pushed));
    }
    block.push_str(&format!("      Last Pushed By: {}\n", branch.pushed_by()));
    block.push_str(&format!("      Created By: {}\n", branch.pushed_by()));

    block
}

/// Generate the workspace summary.
pub fn generate_summary_report(stats: &SummaryStats) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "\n{}\n",
        style("=== BITBUCKET WORKSPACE SUMMARY ===").green().bold()
    ));

    out.push_str(&format!("\n{}\n", style("Repository Statistics:").cyan().bold()));
    out.push_str(&format!("  Total Repositories: {}\n", stats.total_repos));
    out.push_str(&format!(
        "  Recent Repositories (accessed within 12 months): {}\n",
        stats.recent_repos
    ));
    let old_repos = if stats.old_repos > 0 {
        style(stats.old_repos.to_string()).yellow().to_string()
    } else {
        stats.old_repos.to_string()
    };
    out.push_str(&format!(
        "  Old Repositories (no access for >12 months): {}\n",
        old_repos
    ));
    if let Some(pct) = stats.old_repo_percent() {
        out.push_str(&format!("  Old Repository Percentage: {:.1}%\n", pct));
    }

    out.push_str(&format!("\n{}\n", style("Branch Statistics:").cyan().bold()));
    out.push_str(&format!("  Total Branches: {}\n", stats.total_branches));
    out.push_str(&format!(
        "  Recent Branches (updated within 6 months): {}\n",
        stats.recent_branches
    ));
    let old_branches = if stats.old_branches > 0 {
        style(stats.old_branches.to_string()).red().to_string()
    } else {
        stats.old_branches.to_string()
    };
    out.push_str(&format!(
        "  Old Branches (no updates for >6 months): {}\n",
        old_branches
    ));
    if let Some(pct) = stats.old_branch_percent() {
        out.push_str(&format!("  Old Branch Percentage: {:.1}%\n", pct));
        if let Some(avg) = stats.avg_branches_per_repo() {
            out.push_str(&format!("  Average Branches per Repository: {:.1}\n", avg));
        }
    }
    if stats.branch_fetch_failures > 0 {
        out.push_str(&format!(
            "  Repositories with unreadable branches (not counted): {}\n",
            stats.branch_fetch_failures
        ));
    }

    out.push_str(&format!("\n{}\n", style("Cleanup Recommendations:").cyan().bold()));
    if stats.old_branches > 0 {
        out.push_str(&format!(
            "  • Consider cleaning up {} old branches\n",
            style(stats.old_branches).red()
        ));
        out.push_str("  • Use: bhunter --output | bkiller --dry-run\n");
    }
    if stats.old_repos > 0 {
        out.push_str(&format!(
            "  • Review {} repositories with no recent activity\n",
            style(stats.old_repos).yellow()
        ));
    }
    if stats.is_clean() {
        out.push_str(&format!(
            "  • {} No cleanup needed - workspace is well maintained!\n",
            style("✓").green().bold()
        ));
    }
    out.push('\n');

    out
}

/// Generate a CSV document: header line plus the given rows.
pub fn generate_csv(rows: &[String]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + rows.len() * 128);
    out.push_str(CSV_HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(row);
        out.push('\n');
    }
    out
}

/// Generate a JSON array of enriched repositories.
pub fn generate_json_report(enriched: &[EnrichedRepository]) -> Result<String> {
    serde_json::to_string_pretty(enriched).map_err(Into::into)
}
