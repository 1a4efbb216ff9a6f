//! Catalog feed: walks the marketplace search for items by one creator,
//! keeps the limited ones, then pulls per-asset details from the economy API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::{http_client, FetchError, ItemSource, RateLimitPolicy};
use crate::domain::{ItemRecord, RawFeed};

pub const CATALOG_SEARCH_URL: &str = "https://catalog.roblox.com/v1/search/items/details";
pub const ECONOMY_DETAILS_URL: &str = "https://economy.roblox.com/v2/assets";

/// Page size ceiling accepted by the search endpoint
const PAGE_LIMIT: u32 = 30;

/// Catalog feed options
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogOptions {
    /// Number of limited items to collect
    #[serde(default = "default_num_items")]
    pub num_items: usize,

    /// Creator whose items are searched (1 is the official account)
    #[serde(default = "default_creator_id")]
    pub creator_id: u64,
}

fn default_num_items() -> usize {
    50
}
fn default_creator_id() -> u64 {
    1
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            num_items: default_num_items(),
            creator_id: default_creator_id(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage {
    #[serde(default)]
    data: Vec<SearchEntry>,
    next_page_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchEntry {
    id: u64,
    #[serde(default)]
    item_restrictions: Option<Vec<String>>,
}

impl SearchEntry {
    fn is_limited(&self) -> bool {
        self.item_restrictions
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|r| r == "Limited" || r == "LimitedUnique")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssetDetails {
    asset_id: u64,
    name: String,
    price_in_robux: Option<i64>,
    created: Option<String>,
    #[serde(default)]
    is_limited: bool,
    #[serde(default)]
    is_limited_unique: bool,
    remaining: Option<i64>,
}

impl AssetDetails {
    /// Convert to a record; `None` when not limited or `Created` is malformed
    fn into_record(self) -> Option<ItemRecord> {
        if !(self.is_limited || self.is_limited_unique) {
            return None;
        }
        let created = self.created.as_deref()?;
        let created_at = DateTime::parse_from_rfc3339(created)
            .ok()?
            .with_timezone(&Utc);

        let mut record = ItemRecord::new(self.asset_id.to_string(), self.name)
            .with_created_at(created_at);
        record.price = self.price_in_robux;
        record.remaining = self.remaining;
        Some(record)
    }
}

/// Catalog search + economy details adapter
pub struct CatalogSource {
    options: CatalogOptions,
    client: reqwest::Client,
    rate_limit: RateLimitPolicy,
}

impl CatalogSource {
    pub fn new(options: CatalogOptions, user_agent: &str, rate_limit: RateLimitPolicy) -> Self {
        Self {
            options,
            client: http_client(user_agent),
            rate_limit,
        }
    }

    fn search_params(&self, cursor: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("Category", "11".to_string()),
            ("CreatorTargetId", self.options.creator_id.to_string()),
            ("CreatorType", "User".to_string()),
            ("Limit", PAGE_LIMIT.to_string()),
            ("SortType", "3".to_string()),
            ("SortAggregation", "5".to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        params
    }

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<SearchPage, FetchError> {
        let params = self.search_params(cursor);
        let response = self
            .rate_limit
            .send(CATALOG_SEARCH_URL, || {
                self.client.get(CATALOG_SEARCH_URL).query(&params)
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: CATALOG_SEARCH_URL.to_string(),
                status: status.as_u16(),
            });
        }

        response.json().await.map_err(|e| FetchError::Decode {
            url: CATALOG_SEARCH_URL.to_string(),
            reason: e.to_string(),
        })
    }

    /// Collect limited candidates until `num_items` or the last page
    async fn collect_candidates(&self) -> Result<Vec<u64>, FetchError> {
        let mut collected = Vec::new();
        let mut cursor: Option<String> = None;

        while collected.len() < self.options.num_items {
            let page = self.fetch_page(cursor.as_deref()).await?;
            for entry in page.data.iter().filter(|e| e.is_limited()) {
                collected.push(entry.id);
                if collected.len() >= self.options.num_items {
                    break;
                }
            }

            match page.next_page_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(collected)
    }

    /// Fetch details for one asset. Non-200 responses skip the asset.
    async fn fetch_details(&self, asset_id: u64) -> Result<Option<AssetDetails>, FetchError> {
        let url = format!("{}/{}/details", ECONOMY_DETAILS_URL, asset_id);
        let response = self.rate_limit.send(&url, || self.client.get(&url)).await?;

        if response.status() != reqwest::StatusCode::OK {
            debug!(asset_id, status = response.status().as_u16(), "Skipping asset details");
            return Ok(None);
        }

        match response.json::<AssetDetails>().await {
            Ok(details) => Ok(Some(details)),
            Err(e) => {
                warn!(asset_id, error = %e, "Unreadable asset details");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl ItemSource for CatalogSource {
    fn name(&self) -> &str {
        "catalog"
    }

    #[instrument(skip(self), fields(creator_id = self.options.creator_id))]
    async fn fetch_items(&self) -> Result<RawFeed, FetchError> {
        let candidates = self.collect_candidates().await?;
        info!(candidates = candidates.len(), "Collected limited candidates");

        let mut records = Vec::new();
        for asset_id in candidates {
            if let Some(record) = self
                .fetch_details(asset_id)
                .await?
                .and_then(AssetDetails::into_record)
            {
                records.push(record);
            }
        }

        Ok(RawFeed::Records(newest_first(records, self.options.num_items)))
    }
}

/// Sort by creation time descending and keep the first `limit`
fn newest_first(mut records: Vec<ItemRecord>, limit: usize) -> Vec<ItemRecord> {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records.truncate(limit);
    records
}
