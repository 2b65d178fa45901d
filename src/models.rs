//! Data models for the workspace auditor.
//!
//! This module contains the repository, branch and commit shapes returned by
//! the Bitbucket API, plus the derived records built during an audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Creator shown when the earliest-commit lookup fails or yields no name.
pub const UNKNOWN_CREATOR: &str = "(unable to determine)";

/// Repository owner as reported by the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub username: String,
}

/// Reference to a repository's main branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainBranch {
    #[serde(default)]
    pub name: String,
}

/// A repository in the audited workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Short name (slug).
    pub name: String,
    /// `workspace/name`.
    pub full_name: String,
    /// Creation timestamp.
    pub created_on: DateTime<Utc>,
    /// Last update, used as a proxy for last access.
    pub updated_on: DateTime<Utc>,
    #[serde(default)]
    pub owner: Owner,
    /// Empty repositories have no main branch.
    #[serde(default)]
    pub mainbranch: Option<MainBranch>,
}

impl Repository {
    /// Name of the main branch, or an empty string if there is none.
    pub fn main_branch_name(&self) -> &str {
        self.mainbranch.as_ref().map(|b| b.name.as_str()).unwrap_or("")
    }
}

/// User attached to a commit author, absent for unmapped authors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub display_name: String,
}

/// Commit author.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub user: Option<User>,
}

impl Author {
    /// Display name of the mapped user, empty when unmapped.
    pub fn display_name(&self) -> &str {
        self.user
            .as_ref()
            .map(|u| u.display_name.as_str())
            .unwrap_or("")
    }
}

/// The commit a branch points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchTarget {
    /// Commit date, used as a proxy for the last push.
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub author: Author,
}

/// A branch of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub target: BranchTarget,
}

impl Branch {
    /// When the branch was last pushed to.
    pub fn last_pushed(&self) -> DateTime<Utc> {
        self.target.date
    }

    /// Who authored the branch head.
    pub fn pushed_by(&self) -> &str {
        self.target.author.display_name()
    }
}

/// A commit, used only to infer a repository's creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub message: String,
}

/// A repository together with its inferred creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedRepository {
    pub repository: Repository,
    pub creator: String,
    /// Why the creator lookup failed, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment_error: Option<String>,
}

impl EnrichedRepository {
    /// Build an entry from a successful lookup.
    ///
    /// An empty author name falls back to [`UNKNOWN_CREATOR`].
    pub fn from_commit(repository: Repository, commit: &Commit) -> Self {
        let name = commit.author.display_name();
        let creator = if name.is_empty() {
            UNKNOWN_CREATOR.to_string()
        } else {
            name.to_string()
        };

        Self {
            repository,
            creator,
            enrichment_error: None,
        }
    }

    /// Build an entry for a failed lookup.
    pub fn failed(repository: Repository, error: String) -> Self {
        Self {
            repository,
            creator: UNKNOWN_CREATOR.to_string(),
            enrichment_error: Some(error),
        }
    }
}

/// Aggregate counters over the audited repositories and branches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub total_repos: usize,
    pub total_branches: usize,
    pub old_repos: usize,
    pub recent_repos: usize,
    pub old_branches: usize,
    pub recent_branches: usize,
    /// Repositories whose branch listing failed and were left out of the
    /// branch counters.
    pub branch_fetch_failures: usize,
}

impl SummaryStats {
    /// Percentage of repositories not accessed within the threshold.
    pub fn old_repo_percent(&self) -> Option<f64> {
        percent(self.old_repos, self.total_repos)
    }

    /// Percentage of branches not pushed within the threshold.
    pub fn old_branch_percent(&self) -> Option<f64> {
        percent(self.old_branches, self.total_branches)
    }

    /// Average number of branches per repository.
    pub fn avg_branches_per_repo(&self) -> Option<f64> {
        if self.total_repos == 0 {
            return None;
        }
        Some(self.total_branches as f64 / self.total_repos as f64)
    }

    /// True when nothing is old enough to need cleanup.
    pub fn is_clean(&self) -> bool {
        self.old_repos == 0 && self.old_branches == 0
    }
}

fn percent(part: usize, total: usize) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(part as f64 / total as f64 * 100.0)
}

/// One page of a cursor-paginated list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::Duration;

    pub fn repo(name: &str, created_on: DateTime<Utc>, updated_on: DateTime<Utc>) -> Repository {
        Repository {
            name: name.to_string(),
            full_name: format!("workspace/{}", name),
            created_on,
            updated_on,
            owner: Owner {
                display_name: "Team Platform".to_string(),
                username: "team-platform".to_string(),
            },
            mainbranch: Some(MainBranch {
                name: "main".to_string(),
            }),
        }
    }

    pub fn recent_repo(name: &str) -> Repository {
        let now = Utc::now();
        repo(name, now - Duration::days(400), now - Duration::days(10))
    }

    pub fn branch(name: &str, date: DateTime<Utc>, author: &str) -> Branch {
        Branch {
            name: name.to_string(),
            target: BranchTarget {
                date,
                author: Author {
                    user: Some(User {
                        display_name: author.to_string(),
                    }),
                },
            },
        }
    }

    pub fn commit(hash: &str, author: &str) -> Commit {
        Commit {
            hash: hash.to_string(),
            date: Utc::now(),
            author: Author {
                user: Some(User {
                    display_name: author.to_string(),
                }),
            },
            message: "initial commit".to_string(),
        }
    }
}
