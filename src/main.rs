mod ebay;
mod http;
mod idempotency;
mod jobs;
mod market;
mod metrics;
mod models;
mod pipeline;
mod security;
mod supabase;
mod vision;

use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use market::snapshot::MarketSnapshot;
use models::{ApiError, MarketplaceId, ScanMethod, ScanRequest, ScanResponse};
use pipeline::{Pipeline, PipelineError, PipelineErrorKind, ScoreVerdict};
use security::{AuthContext, AuthState, require_api_auth};
use serde_json::json;
use std::{collections::HashMap, net::SocketAddr, sync::Arc};
use tokio::sync::Mutex;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    if let Err(err) = run().await {
        error!(target = "scan2flip.api", "server crashed: {err}");
    }
}

async fn run() -> eyre::Result<()> {
    init_tracing();

    let auth_state = AuthState::from_env();
    let pipeline = Pipeline::demo();
    let (queue, _worker) = jobs::JobQueue::spawn(pipeline.clone());
    let openapi: serde_json::Value =
        serde_yaml::from_str(include_str!("../docs/openapi.yaml"))
            .unwrap_or(serde_json::json!({"openapi":"3.0.3"}));
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|err| eyre::eyre!("prometheus recorder: {err}"))?;
    let redis = std::env::var("REDIS_URL")
        .ok()
        .and_then(|u| redis::Client::open(u).ok());
    let state = AppState {
        pipeline,
        queue,
        openapi: Arc::new(openapi),
        idempotency: Arc::new(Mutex::new(HashMap::new())),
        prometheus_handle,
        redis,
    };

    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    let protected = Router::new()
        .route("/scans", post(create_scan))
        .route("/scans/rescan", post(create_rescan))
        .nest(
            "/stages",
            Router::new()
                .route("/normalize_title", post(stage_normalize_title))
                .route("/market_snapshot", post(stage_market_snapshot))
                .route("/score", post(stage_score)),
        )
        .nest(
            "/jobs",
            Router::new()
                .route("/scans", post(enqueue_scan_job))
                .route("/{id}", get(get_job_status)),
        )
        .route_layer(middleware::from_fn_with_state(auth_state, require_api_auth));

    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::extract::DefaultBodyLimit::max(body_limit_from_env()));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8000);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(target = "scan2flip.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    pipeline: Pipeline,
    queue: jobs::JobQueue,
    openapi: Arc<serde_json::Value>,
    idempotency: Arc<Mutex<HashMap<String, ScanResponse>>>,
    prometheus_handle: PrometheusHandle,
    redis: Option<redis::Client>,
}

/// Health and readiness check.
///
/// - Method: `GET`
/// - Path: `/health`
/// - Auth: none
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "scan2flip-api-rs",
    }))
}

async fn openapi_json(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Ok(key) = std::env::var("OPENAPI_KEY") {
        let presented = headers
            .get("X-Docs-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != key {
            return Err(AppError::Pipeline(PipelineError::invalid_input(
                "docs",
                "unauthorized",
            )));
        }
    }
    Ok(Json((*state.openapi).clone()))
}

async fn swagger_ui() -> axum::http::Response<String> {
    let html = r#"<!doctype html>
<html>
<head>
  <meta charset='utf-8'/>
  <title>Scan2Flip API Docs</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => {
      window.ui = SwaggerUIBundle({ url: '/openapi.json', dom_id: '#swagger-ui' });
    };
  </script>
</body>
</html>"#;
    axum::http::Response::builder()
        .header("Content-Type", "text/html; charset=utf-8")
        .body(html.to_string())
        .unwrap_or_default()
}

fn body_limit_from_env() -> usize {
    std::env::var("REQUEST_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(256 * 1024)
}

async fn metrics_endpoint(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> axum::http::Response<String> {
    if let Ok(secret) = std::env::var("METRICS_KEY") {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return axum::http::Response::builder()
                .status(axum::http::StatusCode::UNAUTHORIZED)
                .body("unauthorized".into())
                .unwrap_or_default();
        }
    }
    let body = state.prometheus_handle.render();
    axum::http::Response::builder()
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .unwrap_or_default()
}

/// Run the image/barcode → power score pipeline.
///
/// - Method: `POST`
/// - Path: `/scans`
/// - Auth: `Authorization: Bearer <key>` or `X-Scan2Flip-Key: <key>`
/// - Body: `ScanRequest`
/// - Response: `ScanResponse` (synthetic `scan_id` + per‑stage transcript)
async fn create_scan(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    headers: axum::http::HeaderMap,
    Json(payload): Json<ScanRequest>,
) -> Result<Json<ScanResponse>, AppError> {
    crate::metrics::inc_requests("/scans");
    info!(
        target = "scan2flip.api",
        org_id = %context.org_id,
        api_key = %context.api_key_id,
        "scan pipeline invoked",
    );

    if let Some(key) = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    {
        let cache_key = idempotency::cache_key(&context.org_id, &key);
        if let Some(client) = &state.redis {
            if let Some(existing) = idempotency::redis_get(client, &cache_key).await {
                crate::metrics::inc_scans("replayed");
                return Ok(Json(existing));
            }
            let response = run_scan(&state, payload, context).await?;
            let ttl = std::env::var("IDEMPOTENCY_TTL_SECS")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(3600);
            idempotency::redis_set(client, &cache_key, &response, ttl).await;
            return Ok(Json(response));
        }
        if let Some(existing) = state.idempotency.lock().await.get(&cache_key).cloned() {
            crate::metrics::inc_scans("replayed");
            return Ok(Json(existing));
        }
        let response = run_scan(&state, payload, context).await?;
        state
            .idempotency
            .lock()
            .await
            .insert(cache_key, response.clone());
        return Ok(Json(response));
    }

    let response = run_scan(&state, payload, context).await?;
    Ok(Json(response))
}

/// The one place a scan actually executes from this handler; keeps the
/// completion counter in step with every branch above.
async fn run_scan(
    state: &AppState,
    payload: ScanRequest,
    context: AuthContext,
) -> Result<ScanResponse, AppError> {
    let response = state.pipeline.run(payload, Some(context)).await?;
    crate::metrics::inc_scans("completed");
    Ok(response)
}

#[derive(Debug, Deserialize)]
struct RescanRequest {
    product_name: String,
    #[serde(default)]
    snapshot: Option<MarketSnapshot>,
    #[serde(default)]
    marketplace: MarketplaceId,
    #[serde(default)]
    lookback_days: Option<u32>,
    #[serde(default = "default_true")]
    include_parts: bool,
}

fn default_true() -> bool {
    true
}

/// Re-run scoring after the user corrected the identification; skips image
/// and barcode resolution entirely.
///
/// - Method: `POST`
/// - Path: `/scans/rescan`
/// - Body: RescanRequest
/// - Response: ScanResponse
async fn create_rescan(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(payload): Json<RescanRequest>,
) -> Result<Json<ScanResponse>, AppError> {
    crate::metrics::inc_requests("/scans/rescan");
    let req = ScanRequest {
        image_url: None,
        barcode: None,
        scan_method: ScanMethod::Image,
        marketplace: payload.marketplace,
        lookback_days: payload.lookback_days,
        include_parts: payload.include_parts,
        overrides: Some(models::ScanOverrides {
            product_name: Some(payload.product_name),
            snapshot: payload.snapshot,
        }),
        dry_run: false,
    };
    let response = state.pipeline.run(req, Some(context)).await?;
    Ok(Json(response))
}

#[derive(Debug)]
enum AppError {
    Pipeline(PipelineError),
}

impl From<PipelineError> for AppError {
    fn from(value: PipelineError) -> Self {
        Self::Pipeline(value)
    }
}

#[derive(Debug, Serialize)]
struct EnqueueResponse {
    job_id: String,
}

async fn enqueue_scan_job(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(payload): Json<ScanRequest>,
) -> Result<Json<EnqueueResponse>, AppError> {
    crate::metrics::inc_requests("/jobs/scans");
    let id = state
        .queue
        .enqueue_scan(payload, context)
        .await
        .map_err(|err| AppError::Pipeline(PipelineError::internal("enqueue", err.error)))?;
    Ok(Json(EnqueueResponse {
        job_id: id.to_string(),
    }))
}

async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<jobs::JobInfo>, AppError> {
    let Ok(uuid) = uuid::Uuid::parse_str(&id) else {
        return Err(AppError::Pipeline(PipelineError::invalid_input(
            "jobs",
            "invalid_job_id",
        )));
    };
    if let Some(info) = state.queue.get(uuid).await {
        Ok(Json(info))
    } else {
        Err(AppError::Pipeline(PipelineError::invalid_input(
            "jobs",
            "not_found",
        )))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Pipeline(err) => {
                let status = match err.kind() {
                    PipelineErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                    PipelineErrorKind::LowConfidence => StatusCode::UNPROCESSABLE_ENTITY,
                    PipelineErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let payload = ApiError {
                    error: err.stage().to_string(),
                    detail: Some(err.detail().to_string()),
                };
                (status, Json(payload)).into_response()
            }
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}

// -------- Stage endpoints (manual granular control) --------
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct NormalizeTitleRequest {
    raw_title: String,
}

#[derive(Debug, Serialize)]
struct NormalizeTitleResponse {
    product_name: String,
    low_confidence: bool,
}

async fn stage_normalize_title(
    Json(req): Json<NormalizeTitleRequest>,
) -> Result<Json<NormalizeTitleResponse>, AppError> {
    crate::metrics::inc_requests("/stages/normalize_title");
    let product_name = market::normalizer::normalize(&req.raw_title);
    let low_confidence = market::normalizer::is_low_confidence(&product_name);
    Ok(Json(NormalizeTitleResponse {
        product_name,
        low_confidence,
    }))
}

#[derive(Debug, Deserialize)]
struct MarketSnapshotRequest {
    query: String,
    #[serde(default)]
    lookback_days: Option<u32>,
    #[serde(default)]
    marketplace: MarketplaceId,
}

async fn stage_market_snapshot(
    State(state): State<AppState>,
    Json(req): Json<MarketSnapshotRequest>,
) -> Result<Json<MarketSnapshot>, AppError> {
    crate::metrics::inc_requests("/stages/market_snapshot");
    if req.query.trim().is_empty() {
        return Err(AppError::Pipeline(PipelineError::invalid_input(
            "fetch_market",
            "empty_query",
        )));
    }
    let snapshot = state
        .pipeline
        .market_snapshot(req.query.trim(), req.lookback_days, req.marketplace)
        .await;
    Ok(Json(snapshot))
}

#[derive(Debug, Deserialize)]
struct ScoreRequest {
    snapshot: MarketSnapshot,
}

async fn stage_score(Json(req): Json<ScoreRequest>) -> Result<Json<ScoreVerdict>, AppError> {
    crate::metrics::inc_requests("/stages/score");
    let out = pipeline::stages::compute_score(&req.snapshot)
        .await
        .map_err(AppError::from)?;
    Ok(Json(out.value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};
    use crate::models::ScanOverrides;

    fn test_state() -> AppState {
        let pipeline = Pipeline::demo();
        let (queue, _worker) = jobs::JobQueue::spawn(pipeline.clone());
        AppState {
            pipeline,
            queue,
            openapi: Arc::new(json!({"openapi": "3.0.3"})),
            idempotency: Arc::new(Mutex::new(HashMap::new())),
            prometheus_handle: PrometheusBuilder::new().build_recorder().handle(),
            redis: None,
        }
    }

    fn test_context() -> AuthContext {
        AuthContext {
            org_id: "demo-org".to_string(),
            api_key_id: "key-01".to_string(),
        }
    }

    fn corrected_scan(name: &str) -> ScanRequest {
        ScanRequest {
            image_url: None,
            barcode: None,
            scan_method: ScanMethod::Image,
            marketplace: MarketplaceId::EbayUs,
            lookback_days: None,
            include_parts: false,
            overrides: Some(ScanOverrides {
                product_name: Some(name.to_string()),
                snapshot: None,
            }),
            dry_run: false,
        }
    }

    #[tokio::test]
    async fn rescan_needs_no_image_reference() {
        let resp = create_rescan(
            State(test_state()),
            Extension(test_context()),
            Json(RescanRequest {
                product_name: "Sony Walkman WM-10".to_string(),
                snapshot: None,
                marketplace: MarketplaceId::EbayUs,
                lookback_days: None,
                include_parts: false,
            }),
        )
        .await
        .expect("rescan");
        assert_eq!(resp.0.product_name, "Sony Walkman WM-10");
        assert!(resp.0.power_score.is_some());
    }

    #[tokio::test]
    async fn idempotency_key_replays_cached_scan() {
        let state = test_state();
        let mut headers = HeaderMap::new();
        headers.insert("Idempotency-Key", HeaderValue::from_static("replay-1"));

        let first = create_scan(
            State(state.clone()),
            Extension(test_context()),
            headers.clone(),
            Json(corrected_scan("Canon AE-1 Camera")),
        )
        .await
        .expect("first scan");
        let second = create_scan(
            State(state),
            Extension(test_context()),
            headers,
            Json(corrected_scan("Canon AE-1 Camera")),
        )
        .await
        .expect("second scan");
        assert_eq!(first.0.scan_id, second.0.scan_id);
    }
}
