//! In-memory [`RepositoryApi`] for orchestrator and aggregator tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::client::RepositoryApi;
use super::error::ApiError;
use crate::models::{Branch, Commit, Repository};

#[derive(Default)]
pub struct FakeApi {
    repositories: Vec<Repository>,
    branches: HashMap<String, Vec<Branch>>,
    commits: HashMap<String, Commit>,
    failing_branches: Vec<String>,
    lookup_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repositories(mut self, repos: Vec<Repository>) -> Self {
        self.repositories = repos;
        self
    }

    pub fn with_branches(mut self, full_name: &str, branches: Vec<Branch>) -> Self {
        self.branches.insert(full_name.to_string(), branches);
        self
    }

    pub fn with_failing_branches(mut self, full_name: &str) -> Self {
        self.failing_branches.push(full_name.to_string());
        self
    }

    pub fn with_commit(mut self, full_name: &str, commit: Commit) -> Self {
        self.commits.insert(full_name.to_string(), commit);
        self
    }

    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = Some(delay);
        self
    }

    /// Highest number of concurrent creator lookups observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("fake api lock poisoned").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("fake api lock poisoned").push(call);
    }
}

#[async_trait]
impl RepositoryApi for FakeApi {
    async fn list_repositories(&self, workspace: &str) -> Result<Vec<Repository>, ApiError> {
        self.record(format!("list_repositories:{}", workspace));
        Ok(self.repositories.clone())
    }

    async fn get_repository(&self, workspace: &str, name: &str) -> Result<Repository, ApiError> {
        self.record(format!("get_repository:{}/{}", workspace, name));
        self.repositories
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .ok_or_else(|| ApiError::Api {
                status: 404,
                url: format!("fake://{}/{}", workspace, name),
                message: "Repository not found".to_string(),
            })
    }

    async fn list_branches(&self, full_name: &str) -> Result<Vec<Branch>, ApiError> {
        self.record(format!("list_branches:{}", full_name));
        if self.failing_branches.iter().any(|f| f == full_name) {
            return Err(ApiError::Api {
                status: 500,
                url: format!("fake://{}/refs/branches", full_name),
                message: "internal error".to_string(),
            });
        }
        Ok(self.branches.get(full_name).cloned().unwrap_or_default())
    }

    async fn find_earliest_commit_near_creation(
        &self,
        full_name: &str,
    ) -> Result<Commit, ApiError> {
        self.record(format!("find_earliest_commit:{}", full_name));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.lookup_delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.commits
            .get(full_name)
            .cloned()
            .ok_or_else(|| ApiError::NoCommitsFound {
                repo: full_name.to_string(),
            })
    }
}
