// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. The dashboard is read-only apart from
// `POST refresh`, which invalidates the cache and wakes the refresh loop.
//
// Errors:
//   - 422 for an invalid indicator selection (strict mode).
//   - 503 while the cache has not been populated yet.
//
// CORS is permissive; the dashboard is served from a different origin
// during development.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::export;
use crate::app_state::AppState;
use crate::pipeline::IndicatorRequest;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/dashboard", get(dashboard))
        .route("/api/v1/indicators", get(indicators))
        .route("/api/v1/analysis", get(analysis))
        .route("/api/v1/export/indicators.csv", get(export_indicators))
        .route("/api/v1/export/metrics.csv", get(export_metrics))
        .route("/api/v1/refresh", post(refresh))
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Handler failures mapped onto HTTP status codes.
pub enum ApiError {
    Validation(String),
    NotReady,
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            Self::NotReady => (
                StatusCode::SERVICE_UNAVAILABLE,
                "market data not loaded yet".to_string(),
            ),
            Self::Internal(e) => {
                warn!(error = %e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
            }
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

// =============================================================================
// Query parameters
// =============================================================================

/// `?names=SMA_20,RSI&strict=true`
#[derive(Debug, Default, Deserialize)]
pub struct SelectionQuery {
    pub names: Option<String>,
    #[serde(default)]
    pub strict: bool,
}

impl SelectionQuery {
    fn request(&self, state: &AppState) -> Result<IndicatorRequest, ApiError> {
        state
            .indicator_request(self.names.as_deref(), self.strict)
            .map_err(|e| ApiError::Validation(e.to_string()))
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.health())
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SelectionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let request = query.request(&state)?;
    let payload = state.build_dashboard(&request).ok_or(ApiError::NotReady)?;
    Ok(Json(payload))
}

async fn indicators(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SelectionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let request = query.request(&state)?;
    let series = state.augmented_series(&request).ok_or(ApiError::NotReady)?;
    Ok(Json(series))
}

async fn analysis(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let payload = state.build_analysis().ok_or(ApiError::NotReady)?;
    Ok(Json(payload))
}

async fn export_indicators(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SelectionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let request = query.request(&state)?;
    let series = state.augmented_series(&request).ok_or(ApiError::NotReady)?;
    let body = export::indicators_csv(&series).map_err(ApiError::Internal)?;
    let coin = state.runtime_config.read().coin_id.clone();
    Ok(csv_response(body, &format!("{coin}_technical_indicators")))
}

async fn export_metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let rows = state.metric_rows().ok_or(ApiError::NotReady)?;
    let body = export::metrics_csv(&rows).map_err(ApiError::Internal)?;
    let coin = state.runtime_config.read().coin_id.clone();
    Ok(csv_response(body, &format!("{coin}_current_metrics")))
}

#[derive(Serialize)]
struct RefreshResponse {
    accepted: bool,
    state_version: u64,
}

async fn refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.request_refresh();
    info!("manual refresh requested");
    (
        StatusCode::ACCEPTED,
        Json(RefreshResponse {
            accepted: true,
            state_version: state.current_state_version(),
        }),
    )
}

fn csv_response(body: String, stem: &str) -> Response {
    let filename = format!("{stem}_{}.csv", chrono::Utc::now().format("%Y%m%d"));
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}
