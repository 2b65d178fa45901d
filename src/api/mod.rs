//! Bitbucket REST API access.
//!
//! Layered leaf-first: an HTTP transport seam, a cursor-paginated fetcher on
//! top of it, and the typed [`RepositoryApi`] operations the audit uses.

pub mod client;
pub mod error;
pub mod pagination;
pub mod transport;

pub use client::{BitbucketClient, RepositoryApi, DEFAULT_BASE_URL};
pub use error::ApiError;

#[cfg(test)]
pub mod fake;
