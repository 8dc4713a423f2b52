//! HTTP route handlers.
//!
//! Handlers never block the async runtime: fetching and fitting run on the
//! blocking pool via `spawn_blocking`.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::app::pipeline::{PanelRequest, forecast_series};
use crate::domain::{ForecastResult, ForecastTarget, NewsItem, Region};
use crate::error::AppError;
use crate::web::dashboard::build_dashboard;
use crate::web::page::{render_dashboard, render_error_page};
use crate::web::state::{AppState, NewsSection};

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub region: Option<String>,
    pub horizon: Option<i64>,
    pub target: Option<ForecastTarget>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct NewsResponse {
    pub enabled: bool,
    pub items: Vec<NewsItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// HTTP status for an application error.
pub fn status_for(err: &AppError) -> StatusCode {
    match err.exit_code() {
        2 => StatusCode::BAD_REQUEST,
        3 => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::BAD_GATEWAY,
    }
}

async fn blocking<T, F>(work: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::new(4, format!("Background task failed: {e}")))?
}

/// `GET /`: the HTML dashboard.
pub async fn dashboard(State(state): State<AppState>) -> Response {
    match blocking(move || build_dashboard(&state)).await {
        Ok(view) => Html(render_dashboard(&view)).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "dashboard unavailable");
            (StatusCode::BAD_GATEWAY, Html(render_error_page(&err))).into_response()
        }
    }
}

/// `GET /api/forecast?region=&horizon=&target=`: one forecast as JSON.
pub async fn forecast(State(state): State<AppState>, Query(query): Query<ForecastQuery>) -> Response {
    match blocking(move || forecast_for(&state, query)).await {
        Ok(result) => Json(result).into_response(),
        Err(err) => (status_for(&err), Json(ErrorResponse { error: err.to_string() })).into_response(),
    }
}

fn forecast_for(state: &AppState, query: ForecastQuery) -> Result<ForecastResult, AppError> {
    let config = state.config();
    let region = match query.region.as_deref() {
        Some(raw) => raw.parse::<Region>().map_err(|e| AppError::new(2, e))?,
        None => config
            .panels
            .first()
            .cloned()
            .ok_or_else(|| AppError::new(2, "No region requested and no panels configured."))?,
    };
    let request = PanelRequest {
        region,
        target: query.target.unwrap_or(config.target),
        horizon_days: query.horizon.unwrap_or(config.horizon_days),
        smoothing: config.smoothing.clone(),
    };

    let snapshot = state.snapshot()?;
    let observed = snapshot.confirmed.series(&request.region)?;
    forecast_series(&observed, &request, Some(state.forecasts()))
}

/// `GET /api/news`: current headlines as JSON.
pub async fn news(State(state): State<AppState>) -> Response {
    let section = match blocking(move || Ok(state.headlines())).await {
        Ok(section) => section,
        Err(err) => NewsSection::Unavailable(err.message().to_string()),
    };
    let body = match section {
        NewsSection::Disabled => NewsResponse {
            enabled: false,
            items: Vec::new(),
            error: None,
        },
        NewsSection::Unavailable(message) => NewsResponse {
            enabled: true,
            items: Vec::new(),
            error: Some(message),
        },
        NewsSection::Headlines(items) => NewsResponse {
            enabled: true,
            items: items.as_ref().clone(),
            error: None,
        },
    };
    Json(body).into_response()
}

/// `GET /health`: liveness probe.
pub async fn liveness() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
