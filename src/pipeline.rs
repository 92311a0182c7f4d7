use crate::ebay;
use crate::market::score::{self, ScoreBreakdown};
use crate::market::snapshot::MarketSnapshot;
use crate::market::{normalizer, parts};
use crate::models::{
    MarketVerdict, MarketplaceId, PartQuote, ScanMethod, ScanRequest, ScanResponse, StageReport,
};
use crate::security::AuthContext;
use crate::supabase::{ScanRecord, SupabaseClient};
use crate::vision::{VisionClient, VisionConfig};
use serde::Serialize;
use serde_json::{Value, json};
use std::{
    collections::hash_map::DefaultHasher,
    env,
    future::Future,
    hash::{Hash, Hasher},
    sync::Arc,
    time::Instant,
};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

pub const MAX_LOOKBACK_DAYS: u32 = 365;

#[derive(Clone)]
pub struct Pipeline {
    pub config: Arc<PipelineConfig>,
    vision: Arc<VisionClient>,
    ebay_network_enabled: bool,
    supabase: Option<SupabaseClient>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let vision = VisionClient::new(VisionConfig::from_env());
        let ebay_network_enabled = parse_env_bool("EBAY_ENABLE_NETWORK");
        let supabase = SupabaseClient::from_env();
        Self {
            config: Arc::new(config),
            vision: Arc::new(vision),
            ebay_network_enabled,
            supabase,
        }
    }

    pub fn demo() -> Self {
        Self::new(PipelineConfig::default())
    }

    /// Snapshot fetch for the granular stage endpoint; same degrade policy as
    /// the full pipeline.
    pub async fn market_snapshot(
        &self,
        query: &str,
        lookback_days: Option<u32>,
        marketplace: MarketplaceId,
    ) -> MarketSnapshot {
        let lookback = self.effective_lookback(lookback_days);
        let (snapshot, _) = stages::fetch_snapshot(
            query,
            lookback,
            marketplace.ebay_code(),
            self.ebay_network_enabled,
        )
        .await;
        snapshot
    }

    fn effective_lookback(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.config.default_lookback_days)
            .clamp(1, MAX_LOOKBACK_DAYS)
    }

    pub async fn run(
        &self,
        request: ScanRequest,
        auth: Option<AuthContext>,
    ) -> Result<ScanResponse, PipelineError> {
        let request = Arc::new(request);
        let mut stages = Vec::new();
        let seed = compute_seed(&request);

        let target = self
            .capture_stage("resolve_target", &mut stages, {
                let req = request.clone();
                async move { stages::resolve_target(&req).await }
            })
            .await?;

        let identified = if let Some(name) = request
            .overrides
            .as_ref()
            .and_then(|ov| ov.product_name.clone())
        {
            self.capture_stage("identify_product", &mut stages, {
                let method = request.scan_method;
                async move {
                    Ok(StageOutcome::new(
                        IdentifiedProduct {
                            raw_title: name.clone(),
                            method,
                            brand: None,
                            category: None,
                        },
                        json!({
                            "raw_title": name,
                            "source": "override",
                        }),
                    ))
                }
            })
            .await?
        } else {
            self.capture_stage("identify_product", &mut stages, {
                let vision = self.vision.clone();
                let target = target.clone();
                async move { stages::identify_product(&target, seed, &vision).await }
            })
            .await?
        };

        let product_name = self
            .capture_stage("normalize_title", &mut stages, {
                let raw = identified.raw_title.clone();
                async move { stages::normalize_title(&raw).await }
            })
            .await?;

        if request.dry_run {
            return Ok(ScanResponse {
                scan_id: format!("PREVIEW-{}", Uuid::new_v4().simple()),
                product_name,
                scan_method: identified.method,
                power_score: None,
                sell_through_rate: None,
                market: None,
                valuable_parts: Vec::new(),
                stages,
            });
        }

        let lookback = self.effective_lookback(request.lookback_days);

        let snapshot = if let Some(snapshot) = request
            .overrides
            .as_ref()
            .and_then(|ov| ov.snapshot.clone())
        {
            self.capture_stage("fetch_market", &mut stages, {
                let snap = snapshot.clone();
                async move {
                    Ok(StageOutcome::new(
                        snap.clone(),
                        json!({
                            "total_sold": snap.total_sold_count,
                            "total_active": snap.total_active_count,
                            "source": "override",
                        }),
                    ))
                }
            })
            .await?
        } else {
            self.capture_stage("fetch_market", &mut stages, {
                let query = product_name.clone();
                let code = request.marketplace.ebay_code();
                let network = self.ebay_network_enabled;
                async move { stages::fetch_market(&query, lookback, code, network).await }
            })
            .await?
        };

        let valuable_parts = if request.include_parts {
            self.capture_stage("price_parts", &mut stages, {
                let product = product_name.clone();
                let code = request.marketplace.ebay_code();
                let network = self.ebay_network_enabled;
                async move { stages::price_parts(&product, lookback, code, network).await }
            })
            .await?
        } else {
            Vec::new()
        };

        let verdict = self
            .capture_stage("compute_score", &mut stages, {
                let snap = snapshot.clone();
                async move { stages::compute_score(&snap).await }
            })
            .await?;

        let response = ScanResponse {
            scan_id: format!("SCN-{}", Uuid::new_v4().simple()),
            product_name,
            scan_method: identified.method,
            power_score: Some(verdict.breakdown.total),
            sell_through_rate: Some(verdict.sell_through_rate),
            market: Some(MarketVerdict {
                snapshot,
                breakdown: verdict.breakdown,
            }),
            valuable_parts,
            stages,
        };

        if let (Some(context), Some(client)) = (auth.as_ref(), self.supabase.as_ref()) {
            let client = client.clone();
            let record = ScanRecord::from_response(&context.org_id, &response);
            tokio::spawn(async move {
                if let Err(err) = client.insert_scan(&record).await {
                    warn!(
                        target = "scan2flip.supabase",
                        error = %err,
                        "scan_history_insert_failed"
                    );
                }
            });
        }

        Ok(response)
    }

    async fn capture_stage<T, Fut>(
        &self,
        name: &'static str,
        stages: &mut Vec<StageReport>,
        fut: Fut,
    ) -> Result<T, PipelineError>
    where
        Fut: Future<Output = Result<StageOutcome<T>, PipelineError>>,
    {
        let started = Instant::now();
        let outcome = fut.await?;
        let elapsed_ms = started.elapsed().as_millis();
        crate::metrics::stage_elapsed(name, elapsed_ms);
        stages.push(StageReport::new(name, elapsed_ms, outcome.output));
        Ok(outcome.value)
    }
}

#[derive(Clone)]
pub struct PipelineConfig {
    pub default_lookback_days: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_lookback_days: default_lookback_from_env(),
        }
    }
}

fn default_lookback_from_env() -> u32 {
    env::var("LOOKBACK_DAYS_DEFAULT")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|value| (1..=MAX_LOOKBACK_DAYS).contains(value))
        .unwrap_or(90)
}

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct PipelineError {
    stage: &'static str,
    message: String,
    kind: PipelineErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    InvalidInput,
    /// Identification failed the confidence post-condition; a terminal
    /// outcome distinct from both bad requests and internal faults.
    LowConfidence,
    Internal,
}

impl PipelineError {
    pub fn invalid_input(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::InvalidInput,
        }
    }

    pub fn low_confidence(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::LowConfidence,
        }
    }

    pub fn internal(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::Internal,
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> PipelineErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}

#[derive(Debug)]
pub struct StageOutcome<T> {
    pub value: T,
    pub output: Value,
}

impl<T> StageOutcome<T> {
    fn new(value: T, output: Value) -> Self {
        Self { value, output }
    }
}

#[derive(Debug, Clone)]
pub struct ScanTarget {
    pub image_url: Option<String>,
    pub barcode: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IdentifiedProduct {
    pub raw_title: String,
    pub method: ScanMethod,
    pub brand: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScoreVerdict {
    pub breakdown: ScoreBreakdown,
    pub sell_through_rate: f64,
}

pub fn compute_seed(request: &ScanRequest) -> u64 {
    let mut hasher = DefaultHasher::new();
    request.image_url.hash(&mut hasher);
    request.barcode.hash(&mut hasher);
    request.marketplace.hash(&mut hasher);
    hasher.finish()
}

fn parse_env_bool(key: &str) -> bool {
    match env::var(key) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        Err(_) => false,
    }
}

pub mod stages {
    use super::*;
    use crate::ebay::mock;
    use crate::vision::{lens, upc};

    pub async fn resolve_target(
        request: &ScanRequest,
    ) -> Result<StageOutcome<ScanTarget>, PipelineError> {
        let image_url = request
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        let barcode = request
            .barcode
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        // a product-name override supplies the identification itself, so no
        // image or barcode is required and none is validated
        let overridden = request
            .overrides
            .as_ref()
            .and_then(|ov| ov.product_name.as_deref())
            .is_some_and(|name| !name.trim().is_empty());
        if overridden {
            let target = ScanTarget { image_url, barcode };
            return Ok(StageOutcome::new(
                target.clone(),
                json!({
                    "has_image": target.image_url.is_some(),
                    "has_barcode": target.barcode.is_some(),
                    "source": "override",
                }),
            ));
        }

        if image_url.is_none() && barcode.is_none() {
            return Err(PipelineError::invalid_input(
                "resolve_target",
                "no image or barcode provided",
            ));
        }
        if request.scan_method == ScanMethod::Barcode && barcode.is_none() {
            return Err(PipelineError::invalid_input(
                "resolve_target",
                "missing_barcode",
            ));
        }

        if let Some(url) = &image_url {
            match reqwest::Url::parse(url) {
                Ok(parsed) => {
                    if !matches!(parsed.scheme(), "http" | "https") {
                        return Err(PipelineError::invalid_input(
                            "resolve_target",
                            format!("unsupported_url_scheme: {url}"),
                        ));
                    }
                    if let Some(allowed) = image_domain_allowlist()
                        && let Some(host) = parsed.host_str()
                        && !host_allowed(host, &allowed)
                    {
                        return Err(PipelineError::invalid_input(
                            "resolve_target",
                            format!("domain_not_allowed: {host}"),
                        ));
                    }
                }
                Err(_) => {
                    return Err(PipelineError::invalid_input(
                        "resolve_target",
                        format!("invalid_image_url: {url}"),
                    ));
                }
            }
        }

        if let Some(code) = &barcode
            && !code.chars().all(|ch| ch.is_ascii_digit())
        {
            return Err(PipelineError::invalid_input(
                "resolve_target",
                "invalid_barcode",
            ));
        }

        let target = ScanTarget { image_url, barcode };
        Ok(StageOutcome::new(
            target.clone(),
            json!({
                "has_image": target.image_url.is_some(),
                "has_barcode": target.barcode.is_some(),
            }),
        ))
    }

    pub async fn identify_product(
        target: &ScanTarget,
        seed: u64,
        vision: &VisionClient,
    ) -> Result<StageOutcome<IdentifiedProduct>, PipelineError> {
        if let Some(barcode) = &target.barcode {
            match upc::lookup_upc(barcode).await {
                Ok(Some(product)) => {
                    let identified = IdentifiedProduct {
                        raw_title: product.title.clone(),
                        method: ScanMethod::Barcode,
                        brand: product.brand,
                        category: product.category,
                    };
                    return Ok(StageOutcome::new(
                        identified.clone(),
                        json!({
                            "raw_title": identified.raw_title,
                            "brand": identified.brand,
                            "category": identified.category,
                            "barcode": barcode,
                            "source": "upc",
                        }),
                    ));
                }
                Ok(None) => {
                    warn!(target = "scan2flip.vision", barcode = %barcode, "upc_not_found")
                }
                Err(err) => {
                    warn!(
                        target = "scan2flip.vision",
                        barcode = %barcode,
                        error = %err,
                        "upc_lookup_fallback"
                    )
                }
            }
            if target.image_url.is_none() {
                let product = upc::demo_product();
                let identified = IdentifiedProduct {
                    raw_title: product.title,
                    method: ScanMethod::Barcode,
                    brand: product.brand,
                    category: product.category,
                };
                return Ok(StageOutcome::new(
                    identified.clone(),
                    json!({
                        "raw_title": identified.raw_title,
                        "brand": identified.brand,
                        "category": identified.category,
                        "barcode": barcode,
                        "source": "demo",
                    }),
                ));
            }
        }

        let image_url = target.image_url.as_deref().unwrap_or_default();
        let (raw_title, source) = match vision.identify(image_url).await {
            Ok(title) => (title, "lens"),
            Err(err) => {
                warn!(
                    target = "scan2flip.vision",
                    error = %err,
                    "vision_identify_fallback"
                );
                (lens::demo_identify(seed), "demo")
            }
        };

        let identified = IdentifiedProduct {
            raw_title,
            method: ScanMethod::Image,
            brand: None,
            category: None,
        };
        Ok(StageOutcome::new(
            identified.clone(),
            json!({
                "raw_title": identified.raw_title,
                "image_url": image_url,
                "source": source,
            }),
        ))
    }

    pub async fn normalize_title(
        raw_title: &str,
    ) -> Result<StageOutcome<String>, PipelineError> {
        let name = normalizer::normalize(raw_title);
        if normalizer::is_low_confidence(&name) {
            return Err(PipelineError::low_confidence(
                "normalize_title",
                "identification below confidence threshold",
            ));
        }
        Ok(StageOutcome::new(
            name.clone(),
            json!({
                "raw_title": raw_title,
                "product_name": name,
            }),
        ))
    }

    pub async fn fetch_market(
        query: &str,
        lookback_days: u32,
        marketplace_code: &'static str,
        network_enabled: bool,
    ) -> Result<StageOutcome<MarketSnapshot>, PipelineError> {
        let (snapshot, source) =
            fetch_snapshot(query, lookback_days, marketplace_code, network_enabled).await;
        Ok(StageOutcome::new(
            snapshot.clone(),
            json!({
                "query": query,
                "lookback_days": lookback_days,
                "total_sold": snapshot.total_sold_count,
                "total_active": snapshot.total_active_count,
                "buckets": snapshot.sold_by_condition.len(),
                "source": source,
            }),
        ))
    }

    /// The collaborator contract from the pipeline's side: never errors,
    /// degrades to a zero snapshot when the marketplace is unreachable.
    pub(super) async fn fetch_snapshot(
        query: &str,
        lookback_days: u32,
        marketplace_code: &'static str,
        network_enabled: bool,
    ) -> (MarketSnapshot, &'static str) {
        if !network_enabled {
            return (mock::market_snapshot(query), "mock");
        }
        match ebay::fetch_market_snapshot(query, lookback_days, marketplace_code).await {
            Ok(snapshot) => (snapshot, "ebay"),
            Err(err) => {
                warn!(
                    target = "scan2flip.ebay",
                    query = %query,
                    error = %err,
                    "market_snapshot_degraded"
                );
                (MarketSnapshot::zero(), "degraded")
            }
        }
    }

    pub async fn price_parts(
        product_name: &str,
        lookback_days: u32,
        marketplace_code: &'static str,
        network_enabled: bool,
    ) -> Result<StageOutcome<Vec<PartQuote>>, PipelineError> {
        let queries = parts::part_queries(product_name);

        // sub-queries are independent; fan out and collect in input order
        let mut set = tokio::task::JoinSet::new();
        for (idx, part) in queries.into_iter().enumerate() {
            set.spawn(async move {
                let (snapshot, _) =
                    fetch_snapshot(&part.query, lookback_days, marketplace_code, network_enabled)
                        .await;
                let verdict = score::breakdown(&snapshot);
                let avg = score::primary_average_price(&snapshot);
                (
                    idx,
                    PartQuote {
                        part_name: part.part_name,
                        query: part.query,
                        power_score: verdict.total,
                        sell_through_rate: snapshot.sell_through_rate(),
                        average_price: (avg > 0.0).then_some(avg),
                    },
                )
            });
        }

        let mut indexed = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(pair) => indexed.push(pair),
                Err(err) => {
                    return Err(PipelineError::internal("price_parts", err.to_string()));
                }
            }
        }
        indexed.sort_by_key(|(idx, _)| *idx);
        let quotes: Vec<PartQuote> = indexed.into_iter().map(|(_, quote)| quote).collect();

        Ok(StageOutcome::new(
            quotes.clone(),
            json!({
                "count": quotes.len(),
                "parts": quotes.iter().map(|q| q.part_name.as_str()).collect::<Vec<_>>(),
            }),
        ))
    }

    pub async fn compute_score(
        snapshot: &MarketSnapshot,
    ) -> Result<StageOutcome<ScoreVerdict>, PipelineError> {
        let breakdown = score::breakdown(snapshot);
        let verdict = ScoreVerdict {
            breakdown,
            sell_through_rate: snapshot.sell_through_rate(),
        };
        Ok(StageOutcome::new(
            verdict,
            json!({
                "power_score": verdict.breakdown.total,
                "sell_through_rate": verdict.sell_through_rate,
                "breakdown": verdict.breakdown,
            }),
        ))
    }

    fn image_domain_allowlist() -> Option<Vec<String>> {
        std::env::var("IMAGE_DOMAIN_ALLOWLIST")
            .ok()
            .map(|value| {
                value
                    .split([',', ' ', '\n', '\t'])
                    .map(|entry| entry.trim().to_lowercase())
                    .filter(|entry| !entry.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|entries| !entries.is_empty())
    }

    fn host_allowed(host: &str, allowed: &[String]) -> bool {
        let host = host.to_lowercase();
        allowed
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScanMethod, ScanOverrides, ScanRequest};

    fn sample_request() -> ScanRequest {
        ScanRequest {
            image_url: Some("https://example.com/item.jpg".to_string()),
            barcode: None,
            scan_method: ScanMethod::Image,
            marketplace: MarketplaceId::EbayUs,
            lookback_days: None,
            include_parts: true,
            overrides: None,
            dry_run: false,
        }
    }

    fn with_product(name: &str) -> ScanRequest {
        ScanRequest {
            overrides: Some(ScanOverrides {
                product_name: Some(name.to_string()),
                snapshot: None,
            }),
            ..sample_request()
        }
    }

    #[tokio::test]
    async fn stage_resolve_target_requires_some_input() {
        let request = ScanRequest {
            image_url: None,
            ..sample_request()
        };
        let err = stages::resolve_target(&request)
            .await
            .expect_err("should reject");
        assert_eq!(err.kind(), PipelineErrorKind::InvalidInput);
        assert_eq!(err.stage(), "resolve_target");
    }

    #[tokio::test]
    async fn override_only_request_skips_target_validation() {
        // a corrected product name needs neither image nor barcode, and must
        // not be subject to the image domain allowlist
        let request = ScanRequest {
            image_url: None,
            ..with_product("Sony Walkman WM-10")
        };
        let out = stages::resolve_target(&request)
            .await
            .expect("override accepted");
        assert!(out.value.image_url.is_none());
        assert!(out.value.barcode.is_none());

        let resp = Pipeline::demo()
            .run(request, None)
            .await
            .expect("pipeline run");
        assert_eq!(resp.product_name, "Sony Walkman WM-10");
        assert!(resp.power_score.is_some());
    }

    #[tokio::test]
    async fn stage_resolve_target_rejects_non_http() {
        let request = ScanRequest {
            image_url: Some("ftp://example.com/item.jpg".to_string()),
            ..sample_request()
        };
        let err = stages::resolve_target(&request)
            .await
            .expect_err("should reject");
        assert_eq!(err.kind(), PipelineErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn stage_resolve_target_rejects_non_numeric_barcode() {
        let request = ScanRequest {
            image_url: None,
            barcode: Some("abc123".to_string()),
            ..sample_request()
        };
        let err = stages::resolve_target(&request)
            .await
            .expect_err("should reject");
        assert_eq!(err.kind(), PipelineErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn stage_normalize_title_applies_rules() {
        let out = stages::normalize_title("Buy Sony Walkman WM-10 | Fast Shipping")
            .await
            .expect("normalize");
        assert_eq!(out.value, "Sony Walkman WM-10");
    }

    #[tokio::test]
    async fn stage_normalize_title_low_confidence_is_distinct() {
        let err = stages::normalize_title("iPod™")
            .await
            .expect_err("too short");
        assert_eq!(err.kind(), PipelineErrorKind::LowConfidence);
        assert_eq!(err.stage(), "normalize_title");
    }

    #[tokio::test]
    async fn pipeline_run_stage_sequence() {
        let pipeline = Pipeline::demo();
        let resp = pipeline
            .run(with_product("Vintage Nintendo Game Boy"), None)
            .await
            .expect("pipeline run");
        let names: Vec<String> = resp.stages.iter().map(|s| s.name.clone()).collect();
        assert_eq!(
            names,
            vec![
                "resolve_target",
                "identify_product",
                "normalize_title",
                "fetch_market",
                "price_parts",
                "compute_score",
            ]
        );
        assert!(resp.scan_id.starts_with("SCN-"));
        assert_eq!(resp.product_name, "Vintage Nintendo Game Boy");
        assert!(resp.power_score.unwrap() <= 100);
        assert_eq!(resp.valuable_parts.len(), 3);
        assert_eq!(resp.valuable_parts[0].part_name, "Original Box");
    }

    #[tokio::test]
    async fn pipeline_dry_run_stops_after_normalize() {
        let pipeline = Pipeline::demo();
        let mut request = with_product("Canon AE-1™ Camera");
        request.dry_run = true;
        let resp = pipeline.run(request, None).await.expect("pipeline run");
        let names: Vec<String> = resp.stages.iter().map(|s| s.name.clone()).collect();
        assert_eq!(
            names,
            vec!["resolve_target", "identify_product", "normalize_title"]
        );
        assert!(resp.scan_id.starts_with("PREVIEW-"));
        assert_eq!(resp.product_name, "Canon AE-1 Camera");
        assert!(resp.power_score.is_none());
        assert!(resp.market.is_none());
    }

    #[tokio::test]
    async fn pipeline_skips_parts_when_disabled() {
        let pipeline = Pipeline::demo();
        let mut request = with_product("Sony Walkman WM-10");
        request.include_parts = false;
        let resp = pipeline.run(request, None).await.expect("pipeline run");
        let names: Vec<String> = resp.stages.iter().map(|s| s.name.clone()).collect();
        assert!(!names.contains(&"price_parts".to_string()));
        assert!(resp.valuable_parts.is_empty());
        assert!(resp.power_score.is_some());
    }

    #[tokio::test]
    async fn pipeline_is_deterministic_without_network() {
        let pipeline = Pipeline::demo();
        let first = pipeline
            .run(with_product("Canon AE-1 Camera"), None)
            .await
            .expect("first run");
        let second = pipeline
            .run(with_product("Canon AE-1 Camera"), None)
            .await
            .expect("second run");
        assert_eq!(first.power_score, second.power_score);
        assert_eq!(first.sell_through_rate, second.sell_through_rate);
    }

    #[tokio::test]
    async fn snapshot_override_scores_degenerate_data_as_twenty() {
        let pipeline = Pipeline::demo();
        let mut request = with_product("Sony Walkman WM-10");
        request.overrides = Some(ScanOverrides {
            product_name: Some("Sony Walkman WM-10".to_string()),
            snapshot: Some(MarketSnapshot::zero()),
        });
        request.include_parts = false;
        let resp = pipeline.run(request, None).await.expect("pipeline run");
        assert_eq!(resp.power_score, Some(20));
        assert_eq!(resp.sell_through_rate, Some(0.0));
    }

    #[tokio::test]
    async fn low_confidence_identification_aborts_before_market() {
        let pipeline = Pipeline::demo();
        let err = pipeline
            .run(with_product("Hi"), None)
            .await
            .expect_err("low confidence");
        assert_eq!(err.kind(), PipelineErrorKind::LowConfidence);
        assert_eq!(err.stage(), "normalize_title");
    }

    #[test]
    fn seed_depends_on_scan_inputs() {
        let a = compute_seed(&sample_request());
        let b = compute_seed(&ScanRequest {
            image_url: Some("https://example.com/other.jpg".to_string()),
            ..sample_request()
        });
        assert_ne!(a, b);
        assert_eq!(a, compute_seed(&sample_request()));
    }
}
