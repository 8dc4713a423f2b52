//! Assembling one dashboard render from the shared state.

use chrono::{DateTime, NaiveDate, Utc};

use crate::app::pipeline::{PanelRequest, run_panel};
use crate::domain::{ForecastResult, ForecastTarget, LatestTotals, TimeSeries};
use crate::error::AppError;
use crate::web::state::{AppState, NewsSection};

/// Everything the page template needs.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub generated_at: DateTime<Utc>,
    /// Most recent date in the dataset.
    pub data_date: Option<NaiveDate>,
    pub horizon_days: i64,
    pub target: ForecastTarget,
    pub panels: Vec<PanelView>,
    pub totals: Option<LatestTotals>,
    pub news: NewsSection,
}

/// One region column.
#[derive(Debug, Clone)]
pub struct PanelView {
    pub label: String,
    /// `None` when the region could not be aggregated.
    pub observed: Option<TimeSeries>,
    /// Forecast or a user-facing reason it is missing.
    pub forecast: Result<ForecastResult, String>,
}

/// Fetch (or reuse) data, fit every panel and collect the side panels.
///
/// Fails only if the dataset itself cannot be obtained.
pub fn build_dashboard(state: &AppState) -> Result<DashboardView, AppError> {
    let config = state.config();
    let snapshot = state.snapshot()?;

    let panels = config
        .panels
        .iter()
        .map(|region| {
            let request = PanelRequest {
                region: region.clone(),
                target: config.target,
                horizon_days: config.horizon_days,
                smoothing: config.smoothing.clone(),
            };
            match run_panel(&snapshot.confirmed, &request, Some(state.forecasts())) {
                Ok(panel) => PanelView {
                    label: region.label(),
                    observed: Some(panel.observed),
                    forecast: panel.forecast.map_err(|e| e.message().to_string()),
                },
                Err(err) => {
                    tracing::warn!(region = %region, error = %err, "panel unavailable");
                    PanelView {
                        label: region.label(),
                        observed: None,
                        forecast: Err(err.message().to_string()),
                    }
                }
            }
        })
        .collect();

    Ok(DashboardView {
        generated_at: Utc::now(),
        data_date: snapshot.confirmed.last_date(),
        horizon_days: config.horizon_days,
        target: config.target,
        panels,
        totals: snapshot.latest_totals(),
        news: state.headlines(),
    })
}
