//! Low-level fitting routines for a single response family.
//!
//! Given:
//! - a design matrix `X` (spline + optional weekly columns)
//! - observed values `y`
//! - a unit roughness penalty `S` and a fixed ridge `R`
//! - a list of candidate λ values
//!
//! we solve, for each λ:
//! - a penalized fit with penalty `λS + R` (one solve for Gaussian, penalized
//!   IRLS for Poisson)
//! - its GCV score `n · Pearson / (n - edf)²`
//!
//! and return the best (lowest GCV) candidate.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;

use crate::domain::Family;
use crate::error::ForecastError;
use crate::math::{PenalizedSolution, solve_penalized};

/// Linear predictor bounds during IRLS (keeps `exp` well inside f64 range).
const ETA_MIN: f64 = -30.0;
const ETA_MAX: f64 = 40.0;

/// Candidates whose residual degrees of freedom fall below this are rejected.
const MIN_RESIDUAL_DF: f64 = 0.5;

/// Options that affect how each candidate is fitted.
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub family: Family,
    /// Iteration cap for penalized IRLS (ignored for Gaussian).
    pub max_iter: usize,
    /// Relative convergence tolerance on the fitted mean.
    pub tolerance: f64,
}

/// Best fit for a single λ.
#[derive(Debug, Clone)]
pub struct CandidateFit {
    /// Position on the λ grid (deterministic tie-break).
    pub idx: usize,
    pub lambda: f64,
    pub beta: DVector<f64>,
    /// Unscaled posterior covariance `(X'WX + λS + R)^-1`.
    pub inverse: DMatrix<f64>,
    pub edf: f64,
    /// Pearson statistic `Σ (y - μ)² / V(μ)`.
    pub pearson: f64,
    pub gcv: f64,
    pub iterations: usize,
}

impl CandidateFit {
    /// Dispersion estimate `Pearson / (n - edf)`.
    pub fn scale(&self, n: usize) -> f64 {
        self.pearson / (n as f64 - self.edf)
    }
}

/// Initial working weights for a family.
///
/// Poisson starts from a mean halfway between each (non-negative) observation
/// and the overall positive mean; `None` when no observation is positive.
pub fn initial_weights(family: Family, y: &[f64]) -> Option<Vec<f64>> {
    match family {
        Family::Gaussian => Some(vec![1.0; y.len()]),
        Family::Poisson => {
            let n = y.len();
            if n == 0 {
                return None;
            }
            let pos_mean = y.iter().map(|v| v.max(0.0)).sum::<f64>() / n as f64;
            if !(pos_mean.is_finite() && pos_mean > 0.0) {
                return None;
            }
            Some(y.iter().map(|v| 0.5 * (v.max(0.0) + pos_mean)).collect())
        }
    }
}

/// Fit every λ on the grid (parallel) and pick the lowest GCV score.
pub fn fit_over_grid(
    x: &DMatrix<f64>,
    y: &[f64],
    roughness: &DMatrix<f64>,
    ridge: &DMatrix<f64>,
    lambdas: &[f64],
    opts: &FitOptions,
) -> Result<CandidateFit, ForecastError> {
    if y.is_empty() {
        return Err(ForecastError::InsufficientData { required: 1, actual: 0 });
    }
    if lambdas.is_empty() {
        return Err(ForecastError::InvalidConfig("lambda grid is empty".to_string()));
    }

    let candidates: Vec<CandidateFit> = lambdas
        .par_iter()
        .enumerate()
        .filter_map(|(idx, &lambda)| {
            let penalty = roughness * lambda + ridge;
            fit_candidate(x, y, &penalty, opts).map(|(solution, pearson, iterations)| {
                let n = y.len() as f64;
                let resid_df = n - solution.edf;
                let gcv = n * pearson / (resid_df * resid_df);
                CandidateFit {
                    idx,
                    lambda,
                    beta: solution.beta,
                    inverse: solution.inverse,
                    edf: solution.edf,
                    pearson,
                    gcv,
                    iterations,
                }
            })
        })
        .filter(|c| c.gcv.is_finite())
        .collect();

    if candidates.is_empty() {
        return Err(ForecastError::FitFailed(format!(
            "no smoothing candidate converged for the {} family",
            opts.family.display_name()
        )));
    }

    // Deterministic selection: pick the minimum GCV; break ties by grid index.
    let mut best = &candidates[0];
    for c in &candidates[1..] {
        if c.gcv < best.gcv || (c.gcv == best.gcv && c.idx < best.idx) {
            best = c;
        }
    }

    Ok(best.clone())
}

/// Fit one penalty; returns the final solve, Pearson statistic and iteration count.
pub fn fit_candidate(
    x: &DMatrix<f64>,
    y: &[f64],
    penalty: &DMatrix<f64>,
    opts: &FitOptions,
) -> Option<(PenalizedSolution, f64, usize)> {
    let (solution, pearson, iterations) = match opts.family {
        Family::Gaussian => fit_gaussian(x, y, penalty)?,
        Family::Poisson => fit_poisson(x, y, penalty, opts)?,
    };

    let resid_df = y.len() as f64 - solution.edf;
    if resid_df < MIN_RESIDUAL_DF || !pearson.is_finite() {
        return None;
    }
    Some((solution, pearson, iterations))
}

fn fit_gaussian(
    x: &DMatrix<f64>,
    y: &[f64],
    penalty: &DMatrix<f64>,
) -> Option<(PenalizedSolution, f64, usize)> {
    let w = vec![1.0; y.len()];
    let solution = solve_penalized(x, &w, y, penalty)?;
    let fitted = x * &solution.beta;
    let rss: f64 = y.iter().zip(fitted.iter()).map(|(yi, fi)| (yi - fi).powi(2)).sum();
    Some((solution, rss, 1))
}

/// Penalized IRLS for a Poisson response with log link.
///
/// Working response `z = η + (y⁺ - μ)/μ`, working weights `w = μ`, where
/// `y⁺ = max(y, 0)`. A negative observation (a data correction) enters the
/// likelihood as a zero count; a raw negative `y` would drive μ to zero.
fn fit_poisson(
    x: &DMatrix<f64>,
    y: &[f64],
    penalty: &DMatrix<f64>,
    opts: &FitOptions,
) -> Option<(PenalizedSolution, f64, usize)> {
    let n = y.len();
    let y: Vec<f64> = y.iter().map(|v| v.max(0.0)).collect();
    let mut mu = initial_weights(Family::Poisson, &y)?;
    let mut eta: Vec<f64> = mu.iter().map(|m| m.ln()).collect();

    let y_scale = 1.0 + y.iter().fold(0.0_f64, |acc, v| acc.max(*v));
    let max_iter = opts.max_iter.max(1);

    for iteration in 1..=max_iter {
        let z: Vec<f64> = (0..n).map(|i| eta[i] + (y[i] - mu[i]) / mu[i]).collect();
        let solution = solve_penalized(x, &mu, &z, penalty)?;

        let eta_new = x * &solution.beta;
        let mut delta = 0.0_f64;
        for i in 0..n {
            let e = eta_new[i].clamp(ETA_MIN, ETA_MAX);
            let m = e.exp();
            if !m.is_finite() {
                return None;
            }
            delta = delta.max((m - mu[i]).abs());
            eta[i] = e;
            mu[i] = m;
        }

        if delta <= opts.tolerance * y_scale {
            let pearson: f64 = (0..n).map(|i| (y[i] - mu[i]).powi(2) / mu[i]).sum();
            return Some((solution, pearson, iteration));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelDesign;

    fn setup(y: &[f64]) -> (DMatrix<f64>, DMatrix<f64>, DMatrix<f64>) {
        let days: Vec<u32> = (0..y.len() as u32).collect();
        let design = ModelDesign::new(0, y.len() as u32 - 1, 8, false).unwrap();
        let x = design.design_matrix(&days);
        let s = design.roughness_penalty();
        let r = design.weekly_ridge(0.0);
        (x, s, r)
    }

    fn opts(family: Family) -> FitOptions {
        FitOptions {
            family,
            max_iter: 100,
            tolerance: 1e-8,
        }
    }

    #[test]
    fn gaussian_fit_recovers_a_straight_line() {
        let y: Vec<f64> = (0..20).map(|i| 3.0 + 2.0 * i as f64).collect();
        let (x, s, r) = setup(&y);
        let lambdas = [1e-2, 1.0, 1e2];
        let fit = fit_over_grid(&x, &y, &s, &r, &lambdas, &opts(Family::Gaussian)).unwrap();

        let fitted = &x * &fit.beta;
        for (f, obs) in fitted.iter().zip(y.iter()) {
            assert!((f - obs).abs() < 1e-6, "fitted {f} vs {obs}");
        }
        // A straight line is unpenalized, so the smoothest candidate wins (ties by index).
        assert!(fit.pearson < 1e-10);
    }

    #[test]
    fn poisson_fit_tracks_exponential_growth() {
        let y: Vec<f64> = (0..20).map(|i| (1.0 + 0.15 * i as f64).exp().round()).collect();
        let (x, s, r) = setup(&y);
        let lambdas = [1e-3, 1e-1, 10.0];
        let fit = fit_over_grid(&x, &y, &s, &r, &lambdas, &opts(Family::Poisson)).unwrap();

        let eta = &x * &fit.beta;
        for (e, obs) in eta.iter().zip(y.iter()) {
            let rel = (e.exp() - obs).abs() / obs;
            assert!(rel < 0.2, "fitted {} vs {obs}", e.exp());
        }
        assert!(fit.iterations > 1);
    }

    #[test]
    fn poisson_tolerates_negative_corrections() {
        let mut y: Vec<f64> = (0..20).map(|i| 20.0 + i as f64).collect();
        y[7] = -5.0;
        let (x, s, r) = setup(&y);
        let fit = fit_over_grid(&x, &y, &s, &r, &[1.0, 10.0], &opts(Family::Poisson)).unwrap();
        assert!(fit.beta.iter().all(|b| b.is_finite()));
    }

    #[test]
    fn negative_spike_counts_as_zero_in_the_poisson_likelihood() {
        let mut y = vec![50.0; 30];
        y[20] = -1000.0;
        let days: Vec<u32> = (0..30).collect();
        let design = ModelDesign::new(0, 29, 8, false).unwrap();
        let x = design.design_matrix(&days);
        let penalty = design.roughness_penalty() * 10.0;

        let (solution, pearson, _) = fit_poisson(&x, &y, &penalty, &opts(Family::Poisson)).unwrap();
        let fitted: Vec<f64> = (&x * &solution.beta).iter().map(|e| e.exp()).collect();
        for day in [0, 10, 29] {
            assert!((fitted[day] - 50.0).abs() < 10.0, "day {day} fitted {}", fitted[day]);
        }
        // Same fit as an explicit zero count.
        y[20] = 0.0;
        let (zeroed, zeroed_pearson, _) = fit_poisson(&x, &y, &penalty, &opts(Family::Poisson)).unwrap();
        assert!((&solution.beta - &zeroed.beta).amax() < 1e-9);
        assert!((pearson - zeroed_pearson).abs() < 1e-9 * pearson.max(1.0));
    }

    #[test]
    fn poisson_needs_a_positive_observation() {
        assert!(initial_weights(Family::Poisson, &[0.0, -1.0, 0.0]).is_none());
        assert!(initial_weights(Family::Gaussian, &[0.0, -1.0]).is_some());
    }

    #[test]
    fn empty_grid_is_rejected() {
        let y: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let (x, s, r) = setup(&y);
        let err = fit_over_grid(&x, &y, &s, &r, &[], &opts(Family::Gaussian)).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidConfig(_)));
    }
}
