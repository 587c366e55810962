//! Upstream vacancy API access
//!
//! This module contains everything that talks to the vacancy-search API:
//! - Access token acquisition and invalidation
//! - Retry policy with capped exponential backoff and equal jitter
//! - A rate-limited, retrying request executor
//! - The typed vacancy client issuing the three request shapes

mod backoff;
mod client;
mod fetcher;
mod token;

pub use backoff::{equal_jitter, is_retryable_status, RetryPolicy};
pub use client::{build_http_client, page_count, SearchMeta, VacancyClient, VacancyRecord};
pub use fetcher::{FetchRequest, FetchResponse, RetryingFetcher};
pub use token::{AccessTokenManager, TokenConfig};

use crate::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Source of upstream bearer tokens
///
/// Implemented by [`AccessTokenManager`]; the fetcher only depends on this trait.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a usable bearer token, acquiring one if necessary
    async fn get_token(&self, cancel: &CancellationToken) -> Result<String>;

    /// Reports that the API refused `rejected`
    ///
    /// Forces the next `get_token` call to acquire a fresh token, unless
    /// `rejected` has already been replaced.
    fn mark_invalid(&self, rejected: &str);
}

/// The three request shapes a profession harvest needs
#[async_trait]
pub trait VacancyApi: Send + Sync {
    /// Number of results requested per listing page
    fn page_size(&self) -> u32;

    /// Result-count metadata for a query
    ///
    /// Fails with `HarvestError::NoResults` when the upstream reports zero matches.
    async fn fetch_meta(&self, cancel: &CancellationToken, query: &str) -> Result<SearchMeta>;

    /// Vacancy ids listed on one result page (zero-based)
    async fn fetch_page_ids(
        &self,
        cancel: &CancellationToken,
        query: &str,
        page: u64,
    ) -> Result<Vec<String>>;

    /// Description and normalized formal skill tags of one vacancy
    async fn fetch_vacancy(&self, cancel: &CancellationToken, id: &str) -> Result<VacancyRecord>;
}
