use crate::market::MarketSnapshot;
use crate::market::score::ScoreBreakdown;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScanRequest {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub scan_method: ScanMethod,
    #[serde(default)]
    pub marketplace: MarketplaceId,
    #[serde(default)]
    pub lookback_days: Option<u32>,
    #[serde(default = "default_true")]
    pub include_parts: bool,
    #[serde(default)]
    pub overrides: Option<ScanOverrides>,
    #[serde(default)]
    pub dry_run: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMethod {
    #[default]
    Image,
    Barcode,
}

/// Client-supplied stage overrides, mainly for re-running a scan after the
/// user corrected the identification.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanOverrides {
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub snapshot: Option<MarketSnapshot>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResponse {
    pub scan_id: String,
    pub product_name: String,
    pub scan_method: ScanMethod,
    #[serde(default)]
    pub power_score: Option<u8>,
    #[serde(default)]
    pub sell_through_rate: Option<f64>,
    #[serde(default)]
    pub market: Option<MarketVerdict>,
    #[serde(default)]
    pub valuable_parts: Vec<PartQuote>,
    pub stages: Vec<StageReport>,
}

/// The scored market view returned to the client: the snapshot the score was
/// computed from plus the per-component breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketVerdict {
    pub snapshot: MarketSnapshot,
    pub breakdown: ScoreBreakdown,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartQuote {
    pub part_name: String,
    pub query: String,
    pub power_score: u8,
    pub sell_through_rate: f64,
    #[serde(default)]
    pub average_price: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StageReport {
    pub name: String,
    pub elapsed_ms: u128,
    pub timestamp: DateTime<Utc>,
    pub output: Value,
}

impl StageReport {
    pub fn new(name: &str, elapsed_ms: u128, output: Value) -> Self {
        Self {
            name: name.to_string(),
            elapsed_ms,
            timestamp: Utc::now(),
            output,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(clippy::enum_variant_names)]
pub enum MarketplaceId {
    #[default]
    EbayUs,
    EbayUk,
    EbayDe,
}

impl MarketplaceId {
    pub fn ebay_code(&self) -> &'static str {
        match self {
            MarketplaceId::EbayUs => "EBAY_US",
            MarketplaceId::EbayUk => "EBAY_GB",
            MarketplaceId::EbayDe => "EBAY_DE",
        }
    }
}
