//! Smoothing-parameter grid.
//!
//! We pick the roughness penalty by a deterministic grid search over λ,
//! scoring each candidate with generalized cross-validation (GCV).
//!
//! Why grid search?
//! - GCV curves for short, noisy series are often flat or multi-modal, and a
//!   grid never gets stuck in a poor local minimum.
//! - It is deterministic given the same inputs.
//! - Each candidate is a handful of small dense solves, so a few dozen points
//!   are cheap, and they parallelize trivially.
//!
//! Grid values are *relative*: the absolute penalty is `ρ · tr(X'W₀X) / tr(S)`,
//! which balances data fit and roughness on the same scale regardless of
//! series length or count magnitude.

use nalgebra::DMatrix;

use crate::domain::SmoothingConfig;
use crate::error::ForecastError;
use crate::math::log_space;

/// Relative penalty grid from the smoothing configuration.
pub fn lambda_grid(config: &SmoothingConfig) -> Result<Vec<f64>, ForecastError> {
    log_space(config.lambda_min, config.lambda_max, config.lambda_steps).ok_or_else(|| {
        ForecastError::InvalidConfig(format!(
            "lambda range must satisfy 0 < min < max with at least 2 steps (min={}, max={}, steps={})",
            config.lambda_min, config.lambda_max, config.lambda_steps
        ))
    })
}

/// Scale factor turning a relative penalty into an absolute one.
///
/// `weights` are the initial working weights of the fit.
pub fn penalty_scale(x: &DMatrix<f64>, weights: &[f64], roughness: &DMatrix<f64>) -> f64 {
    let mut data_trace = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        let row_norm: f64 = x.row(i).iter().map(|v| v * v).sum();
        data_trace += w * row_norm;
    }
    let penalty_trace = roughness.trace();

    let scale = data_trace / penalty_trace;
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}
