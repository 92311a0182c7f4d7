//! Barcode lookup against the upcitemdb trial endpoint.

use crate::http::build_client;
use serde::Deserialize;
use thiserror::Error;

const UPC_LOOKUP_URL: &str = "https://api.upcitemdb.com/prod/trial/lookup";

#[derive(Debug, Error)]
pub enum UpcError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response: {0}")]
    Deserialize(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpcProduct {
    pub title: String,
    pub brand: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    items: Vec<UpcProduct>,
}

/// Look a barcode up; `Ok(None)` means the database has no record, which the
/// pipeline treats as "fall through to image identification".
pub async fn lookup_upc(barcode: &str) -> Result<Option<UpcProduct>, UpcError> {
    let client = build_client();
    let response = client
        .get(UPC_LOOKUP_URL)
        .query(&[("upc", barcode)])
        .send()
        .await
        .map_err(|err| UpcError::Request(err.to_string()))?;

    if !response.status().is_success() {
        return Err(UpcError::Request(format!("HTTP {}", response.status())));
    }

    let payload: LookupResponse = response
        .json()
        .await
        .map_err(|err| UpcError::Deserialize(err.to_string()))?;
    Ok(payload.items.into_iter().next())
}

/// Offline stand-in for barcode scans in demo builds.
pub fn demo_product() -> UpcProduct {
    UpcProduct {
        title: "Nintendo Game Boy DMG-01".into(),
        brand: Some("Nintendo".into()),
        category: Some("Video Games & Consoles".into()),
    }
}
