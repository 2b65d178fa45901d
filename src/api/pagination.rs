//! Cursor-paginated fetching.
//!
//! Bitbucket list endpoints return `{"values": [...], "next": "<url>"}`. The
//! fetcher follows `next` until it is absent or empty and concatenates the
//! pages in the order the server returned them.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use super::error::ApiError;
use super::transport::{HttpRequest, HttpTransport};
use crate::models::Page;

/// Upper bound on pages followed for one logical list.
pub const MAX_PAGES: usize = 10_000;

/// Authenticated GET requests plus cursor pagination.
#[derive(Clone)]
pub struct PagedFetcher {
    transport: Arc<dyn HttpTransport>,
    authorization: String,
}

impl PagedFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, username: &str, app_password: &str) -> Self {
        let token = STANDARD.encode(format!("{}:{}", username, app_password));
        Self {
            transport,
            authorization: format!("Basic {}", token),
        }
    }

    fn request(&self, url: &str) -> HttpRequest {
        HttpRequest {
            url: url.to_string(),
            headers: vec![
                ("Authorization".to_string(), self.authorization.clone()),
                ("Accept".to_string(), "application/json".to_string()),
            ],
        }
    }

    /// GET a single resource and decode it.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        debug!("GET {}", url);
        let response = self.transport.get(self.request(url)).await?;

        if !response.is_success() {
            return Err(ApiError::from_status(response.status, url, &response.body));
        }

        serde_json::from_slice(&response.body).map_err(|e| ApiError::MalformedResponse {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Follow the cursor from `initial_url` and return every value.
    ///
    /// The first failing page aborts the call; nothing collected so far is
    /// returned.
    pub async fn fetch_all<T: DeserializeOwned>(&self, initial_url: &str) -> Result<Vec<T>, ApiError> {
        let mut items: Vec<T> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut next = Some(initial_url.to_string());

        while let Some(url) = next.take() {
            if visited.len() >= MAX_PAGES {
                return Err(ApiError::Pagination {
                    url,
                    reason: format!("exceeded {} pages", MAX_PAGES),
                });
            }
            if !visited.insert(url.clone()) {
                return Err(ApiError::Pagination {
                    url,
                    reason: "next cursor points at an already fetched page".to_string(),
                });
            }

            let page: Page<T> = self.get_json(&url).await?;
            debug!("Page {} returned {} values", visited.len(), page.values.len());

            items.extend(page.values);
            next = page.next.filter(|n| !n.is_empty());
        }

        Ok(items)
    }
}
