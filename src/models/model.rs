//! Design and evaluation of the additive trend model.
//!
//! The linear predictor for a day index `d` is
//!
//! ```text
//! η(d) = Σ_j β_j B_j(u(d)) + Σ_k γ_k W_k(d)
//! ```
//!
//! where `u` maps the observed day range onto `[0, 1]`, `B_j` is the cubic
//! B-spline basis (continued linearly outside the observed range) and `W_k` is
//! the optional effect-coded day-of-week term.
//!
//! The fitter relies on three primitive operations, implemented here:
//! - build a design row for a given day (for the penalized solves)
//! - evaluate the linear predictor and its standard error (for bands)
//! - map the linear predictor through the inverse link

use nalgebra::{DMatrix, DVector};

use crate::domain::Family;
use crate::math::BSplineBasis;

/// Effect-coded day-of-week columns (seven levels, sum-to-zero).
pub const WEEKLY_COLUMNS: usize = 6;

/// Exponent cap for the inverse log link (keeps `exp` finite).
const MAX_EXPONENT: f64 = 700.0;

#[derive(Debug, Clone)]
pub struct ModelDesign {
    basis: BSplineBasis,
    first_day: f64,
    span: f64,
    weekly: bool,
}

impl ModelDesign {
    /// Design for observations spanning `first_day..=last_day`.
    ///
    /// Returns `None` when the span is empty or the basis size is invalid.
    pub fn new(first_day: u32, last_day: u32, n_basis: usize, weekly: bool) -> Option<Self> {
        if last_day <= first_day {
            return None;
        }
        let basis = BSplineBasis::new(0.0, 1.0, n_basis)?;
        Some(Self {
            basis,
            first_day: f64::from(first_day),
            span: f64::from(last_day - first_day),
            weekly,
        })
    }

    /// Columns belonging to the smooth trend.
    pub fn smooth_len(&self) -> usize {
        self.basis.len()
    }

    /// Total number of coefficients.
    pub fn n_coef(&self) -> usize {
        self.basis.len() + if self.weekly { WEEKLY_COLUMNS } else { 0 }
    }

    pub fn weekly(&self) -> bool {
        self.weekly
    }

    fn unit(&self, day: u32) -> f64 {
        (f64::from(day) - self.first_day) / self.span
    }

    /// Fill a design row for `day` (inside or beyond the observed range).
    ///
    /// # Panics
    /// Panics if `out` does not have length `self.n_coef()`.
    pub fn fill_design_row(&self, day: u32, out: &mut [f64]) {
        let k = self.basis.len();
        self.basis.eval_extended(self.unit(day), &mut out[..k]);

        if self.weekly {
            let weekly = &mut out[k..];
            let dow = (day % 7) as usize;
            if dow < WEEKLY_COLUMNS {
                weekly.fill(0.0);
                weekly[dow] = 1.0;
            } else {
                weekly.fill(-1.0);
            }
        }
    }

    /// Stack design rows for a list of days.
    pub fn design_matrix(&self, days: &[u32]) -> DMatrix<f64> {
        let p = self.n_coef();
        let mut x = DMatrix::<f64>::zeros(days.len(), p);
        let mut row = vec![0.0; p];
        for (i, &day) in days.iter().enumerate() {
            self.fill_design_row(day, &mut row);
            for (j, &v) in row.iter().enumerate() {
                x[(i, j)] = v;
            }
        }
        x
    }

    /// Unit roughness penalty embedded in the full coefficient space.
    ///
    /// Weekly columns get zero rows/columns here; see `weekly_ridge`.
    pub fn roughness_penalty(&self) -> DMatrix<f64> {
        let p = self.n_coef();
        let k = self.basis.len();
        let s = self.basis.roughness_penalty();
        let mut out = DMatrix::<f64>::zeros(p, p);
        out.view_mut((0, 0), (k, k)).copy_from(&s);
        out
    }

    /// Diagonal ridge on the weekly columns (zero matrix without a weekly term).
    pub fn weekly_ridge(&self, strength: f64) -> DMatrix<f64> {
        let p = self.n_coef();
        let mut out = DMatrix::<f64>::zeros(p, p);
        if self.weekly {
            for j in self.basis.len()..p {
                out[(j, j)] = strength;
            }
        }
        out
    }
}

/// Linear predictor `x^T β` for one design row.
pub fn linear_predictor(row: &[f64], beta: &DVector<f64>) -> f64 {
    row.iter().zip(beta.iter()).map(|(x, b)| x * b).sum()
}

/// Standard error of `x^T β` given the coefficient covariance.
pub fn link_se(row: &[f64], cov: &DMatrix<f64>) -> f64 {
    let p = row.len();
    let mut var = 0.0;
    for a in 0..p {
        if row[a] == 0.0 {
            continue;
        }
        let mut acc = 0.0;
        for b in 0..p {
            acc += cov[(a, b)] * row[b];
        }
        var += row[a] * acc;
    }
    var.max(0.0).sqrt()
}

/// Map a linear predictor to the response scale.
///
/// Gaussian predictions are clipped at zero (counts cannot be negative).
pub fn inverse_link(family: Family, eta: f64) -> f64 {
    match family {
        Family::Poisson => eta.min(MAX_EXPONENT).exp(),
        Family::Gaussian => eta.max(0.0),
    }
}
