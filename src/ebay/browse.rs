//! Live marketplace snapshot fetch: Browse API for the active-listing count,
//! Marketplace Insights for condition-bucketed sold comps.

use crate::ebay::auth::{EbayAuthError, get_app_access_token};
use crate::ebay::config::{BROWSE_SEARCH_URL, ITEM_SALES_SEARCH_URL};
use crate::http::build_client;
use crate::market::condition::ConditionBucket;
use crate::market::snapshot::{self, MarketSnapshot, SoldListing};
use chrono::{Duration, Utc};
use serde::Deserialize;
use thiserror::Error;
use urlencoding::encode;

const BUY_SCOPES: &[&str] = &["https://api.ebay.com/oauth/api_scope"];
const MAX_SOLD_COMPS: u32 = 200;

#[derive(Debug, Error)]
pub enum EbayMarketError {
    #[error("auth failed: {0}")]
    Auth(#[from] EbayAuthError),
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response: {0}")]
    Deserialize(String),
}

#[derive(Debug, Deserialize)]
struct BrowseSearchResponse {
    #[serde(default)]
    total: u32,
}

#[derive(Debug, Deserialize)]
struct ItemSalesResponse {
    #[serde(default, rename = "itemSales")]
    item_sales: Vec<ItemSale>,
}

#[derive(Debug, Deserialize)]
struct ItemSale {
    #[serde(rename = "lastSoldPrice")]
    last_sold_price: Option<SoldPrice>,
    #[serde(rename = "conditionId")]
    condition_id: Option<String>,
    condition: Option<String>,
}

// eBay serializes money values as strings; kept raw so the aggregation layer
// owns the exclusion of unparseable prices.
#[derive(Debug, Deserialize)]
struct SoldPrice {
    value: Option<String>,
}

/// Fetch and aggregate the market snapshot for one canonical query.
///
/// Errors here mean "upstream unavailable"; the pipeline stage degrades them
/// to a zero snapshot rather than failing the scan.
pub async fn fetch_market_snapshot(
    query: &str,
    lookback_days: u32,
    marketplace_code: &str,
) -> Result<MarketSnapshot, EbayMarketError> {
    let token = get_app_access_token(BUY_SCOPES).await?;
    let active = fetch_active_count(query, marketplace_code, &token).await?;
    let sold = fetch_sold_comps(query, lookback_days, marketplace_code, &token).await?;
    Ok(snapshot::aggregate(&sold, active))
}

async fn fetch_active_count(
    query: &str,
    marketplace_code: &str,
    token: &str,
) -> Result<u32, EbayMarketError> {
    let url = format!("{}?q={}&limit=1", *BROWSE_SEARCH_URL, encode(query));
    let client = build_client();
    let response = client
        .get(url)
        .bearer_auth(token)
        .header("X-EBAY-C-MARKETPLACE-ID", marketplace_code)
        .send()
        .await
        .map_err(|err| EbayMarketError::Request(err.to_string()))?;

    if !response.status().is_success() {
        return Err(EbayMarketError::Request(format!(
            "HTTP {}",
            response.status()
        )));
    }

    let payload: BrowseSearchResponse = response
        .json()
        .await
        .map_err(|err| EbayMarketError::Deserialize(err.to_string()))?;
    Ok(payload.total)
}

async fn fetch_sold_comps(
    query: &str,
    lookback_days: u32,
    marketplace_code: &str,
    token: &str,
) -> Result<Vec<SoldListing>, EbayMarketError> {
    let window_start = Utc::now() - Duration::days(i64::from(lookback_days));
    let filter = format!(
        "lastSoldDate:[{}..]",
        window_start.format("%Y-%m-%dT%H:%M:%SZ")
    );
    let url = format!(
        "{}?q={}&filter={}&limit={}",
        *ITEM_SALES_SEARCH_URL,
        encode(query),
        encode(&filter),
        MAX_SOLD_COMPS,
    );
    let client = build_client();
    let response = client
        .get(url)
        .bearer_auth(token)
        .header("X-EBAY-C-MARKETPLACE-ID", marketplace_code)
        .send()
        .await
        .map_err(|err| EbayMarketError::Request(err.to_string()))?;

    if !response.status().is_success() {
        return Err(EbayMarketError::Request(format!(
            "HTTP {}",
            response.status()
        )));
    }

    let payload: ItemSalesResponse = response
        .json()
        .await
        .map_err(|err| EbayMarketError::Deserialize(err.to_string()))?;

    Ok(payload.item_sales.into_iter().map(sold_listing).collect())
}

fn sold_listing(sale: ItemSale) -> SoldListing {
    let bucket = ConditionBucket::resolve(sale.condition_id.as_deref(), sale.condition.as_deref());
    SoldListing {
        raw_price: sale
            .last_sold_price
            .and_then(|price| price.value)
            .unwrap_or_default(),
        bucket,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sold_listing_resolves_bucket_and_keeps_raw_price() {
        let sale = ItemSale {
            last_sold_price: Some(SoldPrice {
                value: Some("45.00".into()),
            }),
            condition_id: Some("7000".into()),
            condition: Some("For parts or not working".into()),
        };
        let listing = sold_listing(sale);
        assert_eq!(listing.bucket, ConditionBucket::ForParts);
        assert_eq!(listing.raw_price, "45.00");
    }

    #[test]
    fn missing_price_becomes_empty_string_not_error() {
        let sale = ItemSale {
            last_sold_price: None,
            condition_id: None,
            condition: Some("Used".into()),
        };
        let listing = sold_listing(sale);
        assert_eq!(listing.raw_price, "");
        assert_eq!(listing.bucket, ConditionBucket::Used);
        // the aggregation layer excludes it from bucket stats
        assert_eq!(crate::market::snapshot::parse_price(&listing.raw_price), None);
    }
}
