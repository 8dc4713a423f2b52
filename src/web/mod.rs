//! The dashboard web server.
//!
//! Routes:
//! - `GET /`              HTML dashboard (one column per panel + data/news side column)
//! - `GET /api/forecast`  forecast for one region as JSON
//! - `GET /api/news`      headlines as JSON
//! - `GET /health`        liveness probe

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::config::DashboardConfig;
use crate::error::AppError;

pub mod chart;
pub mod dashboard;
pub mod page;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Build the router with middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::dashboard))
        .route("/api/forecast", get(routes::forecast))
        .route("/api/news", get(routes::news))
        .route("/health", get(routes::liveness))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the dashboard until Ctrl-C.
pub async fn serve(config: DashboardConfig) -> Result<(), AppError> {
    let addr = config.bind;
    tracing::info!(
        panels = config.panels.len(),
        horizon = config.horizon_days,
        news = config.news.enabled(),
        "starting dashboard"
    );
    let app = router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::new(2, format!("Failed to bind {addr}: {e}")))?;
    tracing::info!("covid-dash v{} listening on http://{}", env!("CARGO_PKG_VERSION"), addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::new(4, format!("Server error: {e}")))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
