//! Rate-limit handling shared by the HTTP feeds.
//!
//! A 429 response is never an error: the request is re-sent after the
//! upstream `Retry-After` interval, or a fixed default when the header is
//! missing or unparseable, until a non-429 response arrives.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::FetchError;

/// Wait policy for HTTP 429 responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Seconds to wait when `Retry-After` is absent
    #[serde(default = "default_wait_seconds")]
    pub default_wait_seconds: u64,
}

fn default_wait_seconds() -> u64 {
    5
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            default_wait_seconds: default_wait_seconds(),
        }
    }
}

impl RateLimitPolicy {
    /// How long to wait before retrying a rate-limited request
    pub fn wait_for(&self, headers: &HeaderMap) -> Duration {
        let seconds = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(self.default_wait_seconds);
        Duration::from_secs(seconds)
    }

    /// Send a request, waiting out 429s.
    ///
    /// `build` is called once per attempt since a `RequestBuilder` is
    /// consumed by `send`. Transport errors are returned immediately; the
    /// status of the final response is left to the caller.
    pub async fn send<F>(&self, url: &str, mut build: F) -> Result<Response, FetchError>
    where
        F: FnMut() -> RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let response = build().send().await.map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }

            let delay = self.wait_for(response.headers());
            warn!(
                url,
                attempt,
                delay_secs = delay.as_secs(),
                "Rate limited, waiting before retry"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
