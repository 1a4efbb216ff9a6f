//! Item-details feed: one request returning every tracked limited as an
//! id -> value tuple mapping.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{http_client, FetchError, ItemSource, RateLimitPolicy};
use crate::domain::RawFeed;

pub const ITEM_DETAILS_URL: &str = "https://www.rolimons.com/itemapi/itemdetails";

/// Response body of the item-details endpoint
#[derive(Debug, Deserialize)]
struct ItemDetailsResponse {
    #[serde(default)]
    items: BTreeMap<String, Vec<Value>>,
}

/// Item-details feed adapter
pub struct ItemDetailsSource {
    url: String,
    client: reqwest::Client,
    rate_limit: RateLimitPolicy,
}

impl ItemDetailsSource {
    pub fn new(user_agent: &str, rate_limit: RateLimitPolicy) -> Self {
        Self::with_url(ITEM_DETAILS_URL, user_agent, rate_limit)
    }

    /// Point the adapter at a different host
    pub fn with_url(url: impl Into<String>, user_agent: &str, rate_limit: RateLimitPolicy) -> Self {
        Self {
            url: url.into(),
            client: http_client(user_agent),
            rate_limit,
        }
    }
}

/// Decode an item-details payload
pub fn parse_item_details(url: &str, body: &str) -> Result<RawFeed, FetchError> {
    let parsed: ItemDetailsResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
    Ok(RawFeed::Tuples(parsed.items))
}

#[async_trait]
impl ItemSource for ItemDetailsSource {
    fn name(&self) -> &str {
        "item_details"
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch_items(&self) -> Result<RawFeed, FetchError> {
        let response = self
            .rate_limit
            .send(&self.url, || self.client.get(&self.url))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| FetchError::Http {
            url: self.url.clone(),
            source,
        })?;
        debug!(bytes = body.len(), "Received item details");

        parse_item_details(&self.url, &body)
    }
}
