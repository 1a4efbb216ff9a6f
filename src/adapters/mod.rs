//! Adapter interfaces for upstream item feeds.
//!
//! Adapters provide a unified interface for pulling item data from the
//! public catalog and economy APIs. Everything downstream of [`ItemSource`]
//! works on normalized [`ItemRecord`](crate::domain::ItemRecord)s.

pub mod catalog;
pub mod item_details;
pub mod retry;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::RawFeed;

pub use catalog::CatalogSource;
pub use item_details::ItemDetailsSource;
pub use retry::RateLimitPolicy;

/// Browser-like agent; the item-details host rejects default client agents
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; LimitedsFeed/1.0)";

/// Errors from an upstream feed. Any of these aborts the run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// A source of item records
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Human-readable feed name
    fn name(&self) -> &str;

    /// Fetch the current item set
    async fn fetch_items(&self) -> Result<RawFeed, FetchError>;
}

/// Build the shared HTTP client
pub(crate) fn http_client(user_agent: &str) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
