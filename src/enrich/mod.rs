//! Creator enrichment with bounded concurrency.
//!
//! One task is spawned per repository. A semaphore admits at most
//! `concurrency_limit` of them into the earliest-commit lookup at a time; the
//! permit is dropped when the lookup finishes, successful or not. Each task
//! yields exactly one [`EnrichedRepository`], so the output always has as many
//! entries as the input, in completion order.

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::api::{ApiError, RepositoryApi};
use crate::models::{Commit, EnrichedRepository, Repository};

/// Default number of concurrent creator lookups.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Called after each completed lookup with `(completed, total)`.
pub type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

/// Enrich every repository with its inferred creator.
///
/// Never fails: a lookup error becomes the sentinel creator plus the error
/// message on that entry.
pub async fn enrich<A>(
    api: Arc<A>,
    repositories: Vec<Repository>,
    concurrency_limit: usize,
    on_progress: Option<&ProgressFn>,
) -> Vec<EnrichedRepository>
where
    A: RepositoryApi + ?Sized + 'static,
{
    let total = repositories.len();
    if total == 0 {
        return Vec::new();
    }

    let limit = concurrency_limit.clamp(1, total.min(Semaphore::MAX_PERMITS));
    let semaphore = Arc::new(Semaphore::new(limit));
    debug!("Enriching {} repositories, {} at a time", total, limit);

    let mut pending = FuturesUnordered::new();

    for repo in repositories {
        let api = Arc::clone(&api);
        let semaphore = Arc::clone(&semaphore);
        let task_repo = repo.clone();

        let handle = tokio::spawn(async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => {
                    return fold(
                        task_repo,
                        Err(ApiError::Transport("admission gate closed".to_string())),
                    );
                }
            };

            let lookup = api
                .find_earliest_commit_near_creation(&task_repo.full_name)
                .await;
            fold(task_repo, lookup)
        });

        // A panicked task still accounts for its repository.
        pending.push(async move {
            match handle.await {
                Ok(enriched) => enriched,
                Err(e) => EnrichedRepository::failed(repo, format!("enrichment task failed: {}", e)),
            }
        });
    }

    let mut results = Vec::with_capacity(total);
    while let Some(entry) = pending.next().await {
        results.push(entry);
        if let Some(callback) = on_progress {
            callback(results.len(), total);
        }
    }

    let failures = results
        .iter()
        .filter(|r| r.enrichment_error.is_some())
        .count();
    info!(
        "Creator lookup finished for {} repositories ({} undetermined)",
        results.len(),
        failures
    );

    results
}

fn fold(repo: Repository, lookup: Result<Commit, ApiError>) -> EnrichedRepository {
    match lookup {
        Ok(commit) => EnrichedRepository::from_commit(repo, &commit),
        Err(e) => {
            debug!("Creator lookup failed for {}: {}", repo.full_name, e);
            EnrichedRepository::failed(repo, e.to_string())
        }
    }
}

/// Reorder enrichment results to match the order repositories were listed in.
pub fn restore_input_order(
    inputs: &[Repository],
    mut enriched: Vec<EnrichedRepository>,
) -> Vec<EnrichedRepository> {
    let positions: HashMap<&str, usize> = inputs
        .iter()
        .enumerate()
        .map(|(i, r)| (r.full_name.as_str(), i))
        .collect();

    enriched.sort_by_key(|e| {
        positions
            .get(e.repository.full_name.as_str())
            .copied()
            .unwrap_or(usize::MAX)
    });
    enriched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeApi;
    use crate::models::fixtures::{commit, recent_repo};
    use crate::models::UNKNOWN_CREATOR;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn repos(count: usize) -> Vec<Repository> {
        (0..count).map(|i| recent_repo(&format!("repo-{i}"))).collect()
    }

    #[tokio::test]
    async fn test_returns_one_result_per_input_under_limit() {
        let inputs = repos(12);
        let mut api = FakeApi::new().with_lookup_delay(Duration::from_millis(15));
        for repo in &inputs {
            api = api.with_commit(&repo.full_name, commit("abc", "Dana"));
        }
        let api = Arc::new(api);

        let results = enrich(Arc::clone(&api), inputs.clone(), 3, None).await;

        assert_eq!(results.len(), 12);
        assert_eq!(api.max_in_flight(), 3);
        assert!(results.iter().all(|r| r.creator == "Dana"));
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_its_entry() {
        let inputs = repos(5);
        let api = FakeApi::new()
            .with_commit("workspace/repo-0", commit("a", "Dana"))
            .with_commit("workspace/repo-2", commit("b", "Eli"))
            .with_commit("workspace/repo-4", commit("c", "Fay"));

        let results = enrich(Arc::new(api), inputs.clone(), 2, None).await;
        let ordered = restore_input_order(&inputs, results);

        assert_eq!(ordered.len(), 5);
        assert_eq!(ordered[0].creator, "Dana");
        assert_eq!(ordered[1].creator, UNKNOWN_CREATOR);
        assert!(ordered[1]
            .enrichment_error
            .as_deref()
            .unwrap()
            .contains("no commits found"));
        assert_eq!(ordered[2].creator, "Eli");
        assert_eq!(ordered[3].creator, UNKNOWN_CREATOR);
        assert_eq!(ordered[4].creator, "Fay");
    }

    #[tokio::test]
    async fn test_every_lookup_failing_still_yields_all_entries() {
        let inputs = repos(7);
        let results = enrich(Arc::new(FakeApi::new()), inputs, 10, None).await;

        assert_eq!(results.len(), 7);
        assert!(results.iter().all(|r| r.creator == UNKNOWN_CREATOR));
        assert!(results.iter().all(|r| r.enrichment_error.is_some()));
    }

    #[tokio::test]
    async fn test_empty_input() {
        let results = enrich(Arc::new(FakeApi::new()), Vec::new(), 4, None).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_zero_limit_is_clamped() {
        let inputs = repos(3);
        let api = Arc::new(FakeApi::new().with_lookup_delay(Duration::from_millis(5)));

        let results = enrich(Arc::clone(&api), inputs, 0, None).await;

        assert_eq!(results.len(), 3);
        assert_eq!(api.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_huge_limit_is_capped_to_input_size() {
        let inputs = repos(2);
        let api = Arc::new(
            FakeApi::new()
                .with_lookup_delay(Duration::from_millis(5))
                .with_commit("workspace/repo-0", commit("a", "Dana")),
        );

        let results = enrich(Arc::clone(&api), inputs, usize::MAX, None).await;

        assert_eq!(results.len(), 2);
        assert!(api.max_in_flight() <= 2);
        assert!(results.iter().any(|r| r.creator == "Dana"));
    }

    #[tokio::test]
    async fn test_progress_reports_each_completion() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_cb = Arc::clone(&seen);
        let callback = move |done: usize, total: usize| {
            assert!(done <= total);
            seen_in_cb.fetch_add(1, Ordering::SeqCst);
        };

        enrich(Arc::new(FakeApi::new()), repos(4), 2, Some(&callback)).await;

        assert_eq!(seen.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_restore_input_order() {
        let inputs = repos(3);
        let shuffled = vec![
            EnrichedRepository::failed(inputs[2].clone(), "x".to_string()),
            EnrichedRepository::failed(inputs[0].clone(), "x".to_string()),
            EnrichedRepository::failed(inputs[1].clone(), "x".to_string()),
        ];

        let ordered = restore_input_order(&inputs, shuffled);
        let names: Vec<&str> = ordered.iter().map(|e| e.repository.name.as_str()).collect();
        assert_eq!(names, vec!["repo-0", "repo-1", "repo-2"]);
    }
}
