//! The forecasting engine.
//!
//! `fit_and_forecast` turns a daily series into smoothed historical values and
//! a short-term projection with an uncertainty band:
//!
//! 1. validate horizon, configuration and series
//! 2. build the spline (+ optional weekly) design over the observed days
//! 3. fit the configured family for every λ on the grid, keep the lowest GCV
//! 4. fall back to the Gaussian family if the Poisson fit is impossible or
//!    the series has too few positive counts
//! 5. evaluate fitted values and forecasts with bands from the posterior
//!    covariance, propagated through the (extrapolated) design rows
//!
//! The function is pure: no I/O, no randomness, no state between calls.
//! Forecasts extrapolate the trend linearly on the link scale, so they are
//! only meaningful for a short horizon.

use nalgebra::DMatrix;

use crate::domain::{Family, FitAndForecast, FitDiagnostics, ForecastPoint, Observation, SmoothingConfig};
use crate::error::ForecastError;
use crate::fit::fitter::{CandidateFit, FitOptions, fit_over_grid, initial_weights};
use crate::fit::lambda_grid::{lambda_grid, penalty_scale};
use crate::math::{MIN_BASIS, normal_quantile};
use crate::models::{ModelDesign, inverse_link, link_se, linear_predictor};

/// Fewest observations for a stable smooth fit.
pub const MIN_OBSERVATIONS: usize = 14;

/// Longest forecast horizon accepted.
pub const MAX_HORIZON_DAYS: i64 = 365;

/// Largest basis accepted by the configuration check.
pub const MAX_BASIS: usize = 50;

/// Fewest positive observations for the Poisson family. With fewer, a run of
/// zeros pushes the log-link fit toward -∞ and the extrapolated slope explodes.
pub const MIN_POSITIVE_OBSERVATIONS: usize = 7;

/// Ridge strength on the weekly columns, relative to the penalty scale.
const WEEKLY_RIDGE: f64 = 1e-6;

/// IRLS convergence tolerance on the fitted mean (relative to max |y|).
const IRLS_TOLERANCE: f64 = 1e-8;

/// Minimum series length for a configuration.
pub fn min_observations(config: &SmoothingConfig) -> usize {
    MIN_OBSERVATIONS.max(config.n_basis + 2)
}

/// Fit the smoothing model to `series` and forecast `horizon_days` ahead.
pub fn fit_and_forecast(
    series: &[Observation],
    horizon_days: i64,
    config: &SmoothingConfig,
) -> Result<FitAndForecast, ForecastError> {
    if horizon_days <= 0 || horizon_days > MAX_HORIZON_DAYS {
        return Err(ForecastError::InvalidHorizon(horizon_days));
    }
    validate_config(config)?;

    let required = min_observations(config);
    if series.len() < required {
        return Err(ForecastError::InsufficientData {
            required,
            actual: series.len(),
        });
    }
    validate_series(series)?;

    let first_day = series[0].day;
    let last_day = series[series.len() - 1].day;
    let future_days = future_days(last_day, horizon_days)?;

    if series.iter().all(|o| o.value == 0.0) {
        tracing::debug!(n = series.len(), "all-zero series; returning a flat zero forecast");
        return Ok(zero_forecast(series, &future_days, config));
    }

    let design = ModelDesign::new(first_day, last_day, config.n_basis, config.weekly)
        .ok_or_else(|| ForecastError::InvalidConfig(format!("cannot build a basis of size {}", config.n_basis)))?;
    let days: Vec<u32> = series.iter().map(|o| o.day).collect();
    let y: Vec<f64> = series.iter().map(|o| o.value).collect();
    let x = design.design_matrix(&days);
    let roughness = design.roughness_penalty();
    let rhos = lambda_grid(config)?;
    let z = normal_quantile(config.confidence)
        .ok_or_else(|| ForecastError::InvalidConfig(format!("confidence {} outside (0, 1)", config.confidence)))?;

    let mut family = config.family;
    let positive = y.iter().filter(|v| **v > 0.0).count();
    if family == Family::Poisson && positive < MIN_POSITIVE_OBSERVATIONS {
        tracing::warn!(positive, "too few positive observations for a log link; using the Gaussian family");
        family = Family::Gaussian;
    }

    let best = match fit_family(family, &design, &x, &y, &roughness, &rhos, config) {
        Ok(fit) => fit,
        Err(err) if family == Family::Poisson => {
            tracing::warn!(error = %err, "Poisson fit failed; falling back to the Gaussian family");
            family = Family::Gaussian;
            fit_family(family, &design, &x, &y, &roughness, &rhos, config)?
        }
        Err(err) => return Err(err),
    };

    let scale = best.scale(series.len());
    let cov = &best.inverse * scale;
    tracing::debug!(
        family = family.display_name(),
        lambda = best.lambda,
        edf = best.edf,
        gcv = best.gcv,
        scale,
        iterations = best.iterations,
        "selected smoothing candidate"
    );

    let mut row = vec![0.0; design.n_coef()];
    let mut point = |day: u32| {
        design.fill_design_row(day, &mut row);
        let eta = linear_predictor(&row, &best.beta);
        let se = link_se(&row, &cov);
        ForecastPoint {
            day,
            value: inverse_link(family, eta),
            lower: inverse_link(family, eta - z * se),
            upper: inverse_link(family, eta + z * se),
        }
    };

    let fitted: Vec<ForecastPoint> = days.iter().map(|&d| point(d)).collect();
    let predicted: Vec<ForecastPoint> = future_days.iter().map(|&d| point(d)).collect();

    Ok(FitAndForecast {
        fitted,
        predicted,
        diagnostics: FitDiagnostics {
            family,
            lambda: best.lambda,
            edf: best.edf,
            gcv: best.gcv,
            scale,
            iterations: best.iterations,
            confidence: config.confidence,
            degenerate: false,
        },
    })
}

fn fit_family(
    family: Family,
    design: &ModelDesign,
    x: &DMatrix<f64>,
    y: &[f64],
    roughness: &DMatrix<f64>,
    rhos: &[f64],
    config: &SmoothingConfig,
) -> Result<CandidateFit, ForecastError> {
    let weights = initial_weights(family, y)
        .ok_or_else(|| ForecastError::FitFailed(format!("{} family needs a positive observation", family.display_name())))?;
    let scale = penalty_scale(x, &weights, roughness);
    let lambdas: Vec<f64> = rhos.iter().map(|rho| rho * scale).collect();
    let ridge = design.weekly_ridge(WEEKLY_RIDGE * scale);

    let opts = FitOptions {
        family,
        max_iter: config.max_iter,
        tolerance: IRLS_TOLERANCE,
    };
    fit_over_grid(x, y, roughness, &ridge, &lambdas, &opts)
}

fn validate_config(config: &SmoothingConfig) -> Result<(), ForecastError> {
    if !(MIN_BASIS..=MAX_BASIS).contains(&config.n_basis) {
        return Err(ForecastError::InvalidConfig(format!(
            "n_basis must be in {MIN_BASIS}..={MAX_BASIS}, got {}",
            config.n_basis
        )));
    }
    if !(config.confidence.is_finite() && config.confidence > 0.0 && config.confidence < 1.0) {
        return Err(ForecastError::InvalidConfig(format!(
            "confidence must be in (0, 1), got {}",
            config.confidence
        )));
    }
    if config.max_iter == 0 {
        return Err(ForecastError::InvalidConfig("max_iter must be at least 1".to_string()));
    }
    lambda_grid(config).map(|_| ())
}

fn validate_series(series: &[Observation]) -> Result<(), ForecastError> {
    if let Some(bad) = series.iter().find(|o| !o.value.is_finite()) {
        return Err(ForecastError::InvalidSeries(format!(
            "non-finite value at day {}",
            bad.day
        )));
    }
    for pair in series.windows(2) {
        if pair[1].day <= pair[0].day {
            return Err(ForecastError::InvalidSeries(format!(
                "day indices must be strictly increasing ({} followed by {})",
                pair[0].day, pair[1].day
            )));
        }
    }
    Ok(())
}

fn future_days(last_day: u32, horizon_days: i64) -> Result<Vec<u32>, ForecastError> {
    (1..=horizon_days)
        .map(|h| {
            u32::try_from(h)
                .ok()
                .and_then(|h| last_day.checked_add(h))
                .ok_or(ForecastError::InvalidHorizon(horizon_days))
        })
        .collect()
}

/// Flat zero fit with a zero-width band.
fn zero_forecast(series: &[Observation], future_days: &[u32], config: &SmoothingConfig) -> FitAndForecast {
    let zero = |day: u32| ForecastPoint {
        day,
        value: 0.0,
        lower: 0.0,
        upper: 0.0,
    };
    FitAndForecast {
        fitted: series.iter().map(|o| zero(o.day)).collect(),
        predicted: future_days.iter().map(|&d| zero(d)).collect(),
        diagnostics: FitDiagnostics {
            family: config.family,
            lambda: 0.0,
            edf: 0.0,
            gcv: 0.0,
            scale: 0.0,
            iterations: 0,
            confidence: config.confidence,
            degenerate: true,
        },
    }
}
