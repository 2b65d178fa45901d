//! Typed Bitbucket operations.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::debug;

use super::error::ApiError;
use super::pagination::PagedFetcher;
use super::transport::{HttpError, HttpTransport, ReqwestTransport};
use crate::models::{Branch, Commit, Page, Repository};

/// Bitbucket Cloud API root.
pub const DEFAULT_BASE_URL: &str = "https://api.bitbucket.org/2.0";

/// Page size requested from list endpoints.
const PAGE_LEN: u32 = 100;

/// Commit search window around a repository's creation date.
const WINDOW_DAYS_BEFORE: i64 = 1;
const WINDOW_DAYS_AFTER: i64 = 30;

const WINDOW_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Repository operations the auditor needs.
#[async_trait]
pub trait RepositoryApi: Send + Sync {
    /// Every repository in a workspace, in server order.
    async fn list_repositories(&self, workspace: &str) -> Result<Vec<Repository>, ApiError>;

    /// A single repository by name.
    async fn get_repository(&self, workspace: &str, name: &str) -> Result<Repository, ApiError>;

    /// Every branch of `workspace/name`.
    async fn list_branches(&self, full_name: &str) -> Result<Vec<Branch>, ApiError>;

    /// The oldest commit in the first page of commits dated within
    /// `[created - 1 day, created + 30 days]`.
    ///
    /// The API lists newest first, so the last entry of the page is taken as
    /// the earliest. This is a heuristic for "who created the repository":
    /// imported or mirrored repositories can report the wrong person.
    async fn find_earliest_commit_near_creation(&self, full_name: &str)
        -> Result<Commit, ApiError>;
}

/// Client for the Bitbucket Cloud 2.0 REST API.
#[derive(Clone)]
pub struct BitbucketClient {
    fetcher: PagedFetcher,
    base_url: String,
}

impl BitbucketClient {
    /// Create a client with the production reqwest transport.
    pub fn new(
        base_url: &str,
        username: &str,
        app_password: &str,
        timeout: std::time::Duration,
    ) -> Result<Self, HttpError> {
        let transport = ReqwestTransport::with_timeout(timeout)?;
        Ok(Self::new_with_transport(
            base_url,
            username,
            app_password,
            Arc::new(transport),
        ))
    }

    pub fn new_with_transport(
        base_url: &str,
        username: &str,
        app_password: &str,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            fetcher: PagedFetcher::new(transport, username, app_password),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn repositories_url(&self, workspace: &str) -> String {
        format!(
            "{}/repositories/{}?pagelen={}",
            self.base_url, workspace, PAGE_LEN
        )
    }

    fn repository_url(&self, workspace: &str, name: &str) -> String {
        format!("{}/repositories/{}/{}", self.base_url, workspace, name)
    }

    fn branches_url(&self, full_name: &str) -> String {
        format!(
            "{}/repositories/{}/refs/branches?pagelen={}",
            self.base_url, full_name, PAGE_LEN
        )
    }

    fn commits_url(&self, full_name: &str, since: &str, until: &str) -> String {
        format!(
            "{}/repositories/{}/commits?pagelen={}&since={}&until={}",
            self.base_url, full_name, PAGE_LEN, since, until
        )
    }
}

/// Format the commit search window for a creation timestamp.
pub fn commit_window(created_on: DateTime<Utc>) -> (String, String) {
    let since = created_on - Duration::days(WINDOW_DAYS_BEFORE);
    let until = created_on + Duration::days(WINDOW_DAYS_AFTER);
    (
        since.format(WINDOW_FORMAT).to_string(),
        until.format(WINDOW_FORMAT).to_string(),
    )
}

/// Split `workspace/name`.
pub fn split_full_name(full_name: &str) -> Result<(&str, &str), ApiError> {
    match full_name.split_once('/') {
        Some((workspace, name))
            if !workspace.is_empty() && !name.is_empty() && !name.contains('/') =>
        {
            Ok((workspace, name))
        }
        _ => Err(ApiError::InvalidRepoName(full_name.to_string())),
    }
}

#[async_trait]
impl RepositoryApi for BitbucketClient {
    async fn list_repositories(&self, workspace: &str) -> Result<Vec<Repository>, ApiError> {
        let repos: Vec<Repository> = self.fetcher.fetch_all(&self.repositories_url(workspace)).await?;
        debug!("Listed {} repositories in {}", repos.len(), workspace);
        Ok(repos)
    }

    async fn get_repository(&self, workspace: &str, name: &str) -> Result<Repository, ApiError> {
        self.fetcher
            .get_json(&self.repository_url(workspace, name))
            .await
    }

    async fn list_branches(&self, full_name: &str) -> Result<Vec<Branch>, ApiError> {
        self.fetcher.fetch_all(&self.branches_url(full_name)).await
    }

    async fn find_earliest_commit_near_creation(
        &self,
        full_name: &str,
    ) -> Result<Commit, ApiError> {
        let (workspace, name) = split_full_name(full_name)?;
        let repo = self.get_repository(workspace, name).await?;

        let (since, until) = commit_window(repo.created_on);
        let url = self.commits_url(full_name, &since, &until);

        // One page only; the window is expected to be small.
        let page: Page<Commit> = self.fetcher.get_json(&url).await?;

        page.values
            .into_iter()
            .last()
            .ok_or_else(|| ApiError::NoCommitsFound {
                repo: full_name.to_string(),
            })
    }
}
