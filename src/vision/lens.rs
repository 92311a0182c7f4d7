//! Reverse-image product identification.
//!
//! The live path goes through a Google-Lens-style search gateway; without an
//! api key the pipeline falls back to the seeded demo pool so the service
//! stays usable (and deterministic) offline.

use crate::http::build_client;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl VisionConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: std::env::var("LENS_ENDPOINT")
                .unwrap_or_else(|_| "https://serpapi.com/search".into()),
            api_key: std::env::var("LENS_API_KEY").ok(),
        }
    }
}

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("missing lens api key")]
    MissingCredentials,
    #[error("http error: {0}")]
    Http(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

pub struct VisionClient {
    http: Client,
    config: VisionConfig,
}

impl VisionClient {
    pub fn new(config: VisionConfig) -> Self {
        Self {
            http: build_client(),
            config,
        }
    }

    /// Image URL in, raw product title out. The title is untrusted; callers
    /// must normalize it before using it as a query key.
    pub async fn identify(&self, image_url: &str) -> Result<String, VisionError> {
        let Some(key) = self.config.api_key.as_deref() else {
            return Err(VisionError::MissingCredentials);
        };

        let response = self
            .http
            .get(&self.config.endpoint)
            .query(&[
                ("engine", "google_lens"),
                ("url", image_url),
                ("api_key", key),
            ])
            .send()
            .await
            .map_err(|err| VisionError::Http(err.to_string()))?;

        if !response.status().is_success() {
            return Err(VisionError::Http(format!("HTTP {}", response.status())));
        }

        let payload: LensResponse = response
            .json()
            .await
            .map_err(|err| VisionError::InvalidResponse(err.to_string()))?;

        payload
            .visual_matches
            .into_iter()
            .map(|matched| matched.title)
            .find(|title| !title.trim().is_empty())
            .ok_or_else(|| VisionError::InvalidResponse("no visual matches".into()))
    }
}

#[derive(Debug, Deserialize)]
struct LensResponse {
    #[serde(default)]
    visual_matches: Vec<VisualMatch>,
}

#[derive(Debug, Deserialize)]
struct VisualMatch {
    #[serde(default)]
    title: String,
}

/// Offline identification pool; every entry survives the low-confidence
/// check so demo scans always reach the scoring stage.
pub const DEMO_PRODUCT_POOL: &[&str] = &[
    "Vintage Nintendo Game Boy",
    "Panasonic PV-V4022 VCR",
    "Canon AE-1 Camera",
    "Sony Walkman WM-10",
    "Apple iPod Classic 160GB",
    "Atari 2600 Console",
    "Polaroid SX-70 Camera",
    "Commodore 64 Computer",
];

/// Seeded demo identification: the same image reference always identifies
/// the same product.
pub fn demo_identify(seed: u64) -> String {
    DEMO_PRODUCT_POOL[(seed as usize) % DEMO_PRODUCT_POOL.len()].to_string()
}
