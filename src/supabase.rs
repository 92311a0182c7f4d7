use crate::http::build_client;
use crate::models::ScanResponse;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct SupabaseClient {
    base_url: String,
    service_key: String,
    http: Client,
}

#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("request failed: {0}")]
    Request(String),
}

/// Row shape for the `scan_history` table.
#[derive(Debug, Clone, Serialize)]
pub struct ScanRecord {
    pub scan_id: String,
    pub org_id: String,
    pub product_name: String,
    pub power_score: Option<u8>,
    pub sell_through_rate: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl ScanRecord {
    pub fn from_response(org_id: &str, response: &ScanResponse) -> Self {
        Self {
            scan_id: response.scan_id.clone(),
            org_id: org_id.to_string(),
            product_name: response.product_name.clone(),
            power_score: response.power_score,
            sell_through_rate: response.sell_through_rate,
            created_at: Utc::now(),
        }
    }
}

impl SupabaseClient {
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("SUPABASE_URL").ok()?;
        let service_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .or_else(|_| std::env::var("SUPABASE_SERVICE_KEY"))
            .or_else(|_| std::env::var("SUPABASE_KEY"))
            .ok()?;
        Some(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
            http: build_client(),
        })
    }

    pub async fn insert_scan(&self, record: &ScanRecord) -> Result<(), SupabaseError> {
        let url = format!("{}/rest/v1/scan_history", self.base_url);
        let response = self
            .http
            .post(url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await
            .map_err(|err| SupabaseError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(SupabaseError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_carries_score_fields() {
        let response = ScanResponse {
            scan_id: "SCN-test".into(),
            product_name: "Sony Walkman WM-10".into(),
            scan_method: crate::models::ScanMethod::Image,
            power_score: Some(71),
            sell_through_rate: Some(42.0),
            market: None,
            valuable_parts: Vec::new(),
            stages: Vec::new(),
        };
        let record = ScanRecord::from_response("demo-org", &response);
        assert_eq!(record.org_id, "demo-org");
        assert_eq!(record.power_score, Some(71));
        assert_eq!(record.scan_id, "SCN-test");
    }
}
