//! Read/write forecast JSON files.
//!
//! Forecast JSON is the portable representation of one panel's forecast:
//! the region and smoothing settings it was produced with, plus the dated
//! history and projection so it can be re-plotted without refetching data.
//!
//! The schema is defined by `domain::ForecastFile`.

use std::fs::File;
use std::path::Path;

use crate::domain::{ForecastFile, ForecastResult, Metric, Region, SmoothingConfig};
use crate::error::AppError;

pub const TOOL_NAME: &str = "covid-dash";

/// Bundle a forecast with the settings that produced it.
pub fn bundle_forecast(
    region: &Region,
    horizon_days: i64,
    smoothing: &SmoothingConfig,
    result: &ForecastResult,
) -> ForecastFile {
    ForecastFile {
        tool: TOOL_NAME.to_string(),
        region: region.to_string(),
        metric: Metric::Confirmed,
        horizon_days,
        smoothing: smoothing.clone(),
        result: result.clone(),
    }
}

/// Write a forecast JSON file.
pub fn write_forecast_json(path: &Path, forecast: &ForecastFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create forecast JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, forecast)
        .map_err(|e| AppError::new(2, format!("Failed to write forecast JSON: {e}")))?;
    Ok(())
}

/// Read a forecast JSON file.
pub fn read_forecast_json(path: &Path) -> Result<ForecastFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open forecast JSON '{}': {e}", path.display())))?;
    let forecast: ForecastFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid forecast JSON: {e}")))?;
    if forecast.result.history.is_empty() && forecast.result.forecast.is_empty() {
        return Err(AppError::new(2, format!("Forecast JSON '{}' has no points.", path.display())));
    }
    Ok(forecast)
}
