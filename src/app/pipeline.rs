//! Shared forecast pipeline used by both the CLI and the web dashboard.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! JHU fetch -> region aggregation -> target series -> fit/forecast -> dated result
//!
//! The front-ends can then focus on presentation (printing vs HTML).

use chrono::Utc;

use crate::data::JhuClient;
use crate::domain::{ForecastResult, ForecastTarget, Metric, Observation, Region, SmoothingConfig, TimeSeries};
use crate::error::{AppError, ForecastError};
use crate::fit::{ForecastCache, fit_and_forecast, min_observations};
use crate::io::RegionTable;

/// What to forecast for one panel.
#[derive(Debug, Clone)]
pub struct PanelRequest {
    pub region: Region,
    pub target: ForecastTarget,
    pub horizon_days: i64,
    pub smoothing: SmoothingConfig,
}

/// Computed outputs for one panel.
///
/// The observed series is always present; the forecast may fail on its own
/// (e.g. too little history) without taking the panel down.
#[derive(Debug, Clone)]
pub struct PanelOutput {
    pub region: Region,
    pub observed: TimeSeries,
    pub forecast: Result<ForecastResult, AppError>,
}

/// Aggregate a region and forecast it.
///
/// Only an unknown region or a malformed table is an error here.
pub fn run_panel(
    table: &RegionTable,
    request: &PanelRequest,
    cache: Option<&ForecastCache>,
) -> Result<PanelOutput, AppError> {
    let observed = table.series(&request.region)?;
    let forecast = forecast_series(&observed, request, cache);
    if let Err(err) = &forecast {
        tracing::warn!(region = %request.region, error = %err, "forecast unavailable");
    }
    Ok(PanelOutput {
        region: request.region.clone(),
        observed,
        forecast,
    })
}

/// Forecast one cumulative series for the requested target.
pub fn forecast_series(
    observed: &TimeSeries,
    request: &PanelRequest,
    cache: Option<&ForecastCache>,
) -> Result<ForecastResult, AppError> {
    let (origin, observations) = match request.target {
        ForecastTarget::Cumulative => (observed.first_date(), observed.observations()),
        ForecastTarget::NewCases => {
            let daily = observed.derive_daily();
            let Some(origin) = daily.first_date() else {
                return Err(ForecastError::InsufficientData {
                    required: min_observations(&request.smoothing),
                    actual: 0,
                }
                .into());
            };
            (origin, daily.observations())
        }
    };

    let fit = match cache {
        Some(cache) => {
            let slot = format!("{}|{:?}", request.region, request.target);
            cache.get_or_compute(&slot, &observations, request.horizon_days, || {
                fit_and_forecast(&observations, request.horizon_days, &request.smoothing)
            })?
        }
        None => std::sync::Arc::new(fit_and_forecast(
            &observations,
            request.horizon_days,
            &request.smoothing,
        )?),
    };

    ForecastResult::assemble(
        request.region.label(),
        request.target,
        origin,
        &observations,
        &fit,
        Utc::now(),
    )
}

/// CLI path: fetch the confirmed table and forecast a single region.
///
/// Unlike the dashboard, a failed forecast is an error here.
pub fn run_forecast(base_url: &str, request: &PanelRequest) -> Result<(PanelOutput, ForecastResult), AppError> {
    let client = JhuClient::new(base_url)?;
    let table = client.fetch_table(Metric::Confirmed)?;
    let panel = run_panel(&table, request, None)?;
    let result = panel.forecast.clone()?;
    Ok((panel, result))
}

/// Observations the engine sees for a request (used in summaries).
pub fn target_observations(observed: &TimeSeries, target: ForecastTarget) -> Vec<Observation> {
    match target {
        ForecastTarget::Cumulative => observed.observations(),
        ForecastTarget::NewCases => observed.derive_daily().observations(),
    }
}
