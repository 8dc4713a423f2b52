//! Cubic B-spline basis on equally spaced knots.
//!
//! A smooth function on `[lo, hi]` is represented as `f(x) = Σ β_j B_j(x)`.
//! With `k` basis functions there are `k - 3` equal intervals and the knot
//! vector is extended by three knots on each side.
//!
//! Numerical notes:
//! - Values use the Cox–de Boor recursion; with uniform knots every
//!   denominator is `d * h` for degree `d` and knot spacing `h`.
//! - Derivatives come from the lower-degree basis:
//!   `B'_{j,3} = (B_{j,2} - B_{j+1,2}) / h` and
//!   `B''_{j,3} = (B_{j,1} - 2 B_{j+1,1} + B_{j+2,1}) / h²`.
//! - Outside `[lo, hi]` the basis is continued linearly from the boundary
//!   value and slope, so any fitted curve extrapolates as a straight line.

use nalgebra::DMatrix;

const DEGREE: usize = 3;

/// Smallest basis with at least one interior interval.
pub const MIN_BASIS: usize = DEGREE + 1;

#[derive(Debug, Clone, PartialEq)]
pub struct BSplineBasis {
    lo: f64,
    hi: f64,
    step: f64,
    n_basis: usize,
}

impl BSplineBasis {
    /// Build a basis of `n_basis` cubic B-splines on `[lo, hi]`.
    ///
    /// Returns `None` for an empty/non-finite range or fewer than `MIN_BASIS` functions.
    pub fn new(lo: f64, hi: f64, n_basis: usize) -> Option<Self> {
        if !(lo.is_finite() && hi.is_finite() && hi > lo) || n_basis < MIN_BASIS {
            return None;
        }
        let step = (hi - lo) / (n_basis - DEGREE) as f64;
        Some(Self {
            lo,
            hi,
            step,
            n_basis,
        })
    }

    pub fn len(&self) -> usize {
        self.n_basis
    }

    pub fn is_empty(&self) -> bool {
        self.n_basis == 0
    }

    pub fn range(&self) -> (f64, f64) {
        (self.lo, self.hi)
    }

    fn knot(&self, j: usize) -> f64 {
        self.lo + (j as f64 - DEGREE as f64) * self.step
    }

    /// Basis values of every degree `0..=3` at `x` (clamped into range).
    fn levels(&self, x: f64) -> Vec<Vec<f64>> {
        let x = x.clamp(self.lo, self.hi);
        let k = self.n_basis;

        // Interior intervals are DEGREE..k; `hi` belongs to the last one.
        let raw = ((x - self.knot(0)) / self.step).floor().max(0.0) as usize;
        let interval = raw.clamp(DEGREE, k - 1);

        let mut b0 = vec![0.0; k + DEGREE];
        b0[interval] = 1.0;

        let mut levels = Vec::with_capacity(DEGREE + 1);
        levels.push(b0);
        for d in 1..=DEGREE {
            let prev = &levels[d - 1];
            let denom = d as f64 * self.step;
            let cur: Vec<f64> = (0..(k + DEGREE - d))
                .map(|j| {
                    let left = (x - self.knot(j)) * prev[j];
                    let right = (self.knot(j + d + 1) - x) * prev[j + 1];
                    (left + right) / denom
                })
                .collect();
            levels.push(cur);
        }
        levels
    }

    /// Basis values at `x`, clamped into `[lo, hi]`.
    pub fn eval(&self, x: f64, out: &mut [f64]) {
        let levels = self.levels(x);
        out.copy_from_slice(&levels[DEGREE]);
    }

    /// First derivatives at `x`, clamped into `[lo, hi]`.
    pub fn eval_deriv(&self, x: f64, out: &mut [f64]) {
        let levels = self.levels(x);
        let b2 = &levels[DEGREE - 1];
        for (j, o) in out.iter_mut().enumerate() {
            *o = (b2[j] - b2[j + 1]) / self.step;
        }
    }

    /// Second derivatives at `x`, clamped into `[lo, hi]`.
    pub fn eval_second_deriv(&self, x: f64, out: &mut [f64]) {
        let levels = self.levels(x);
        let b1 = &levels[DEGREE - 2];
        let h2 = self.step * self.step;
        for (j, o) in out.iter_mut().enumerate() {
            *o = (b1[j] - 2.0 * b1[j + 1] + b1[j + 2]) / h2;
        }
    }

    /// Basis values with linear continuation outside `[lo, hi]`.
    pub fn eval_extended(&self, x: f64, out: &mut [f64]) {
        if x >= self.lo && x <= self.hi {
            self.eval(x, out);
            return;
        }
        let edge = x.clamp(self.lo, self.hi);
        let mut slope = vec![0.0; self.n_basis];
        self.eval(edge, out);
        self.eval_deriv(edge, &mut slope);
        let dx = x - edge;
        for (o, s) in out.iter_mut().zip(slope.iter()) {
            *o += dx * s;
        }
    }

    /// Roughness penalty `S_ij = ∫ B_i''(x) B_j''(x) dx` over `[lo, hi]`.
    ///
    /// `B''` is linear on each interval, so Simpson's rule per interval is exact.
    pub fn roughness_penalty(&self) -> DMatrix<f64> {
        let k = self.n_basis;
        let mut s = DMatrix::<f64>::zeros(k, k);
        let mut g = vec![0.0; k];

        for interval in DEGREE..k {
            let a = self.knot(interval);
            let b = self.knot(interval + 1);
            let mid = 0.5 * (a + b);
            for (x, weight) in [(a, 1.0), (mid, 4.0), (b, 1.0)] {
                self.eval_second_deriv(x, &mut g);
                let scale = weight * self.step / 6.0;
                for i in 0..k {
                    if g[i] == 0.0 {
                        continue;
                    }
                    for j in 0..k {
                        s[(i, j)] += scale * g[i] * g[j];
                    }
                }
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greville(basis: &BSplineBasis) -> Vec<f64> {
        // For uniform cubic B-splines the Greville abscissa of B_j is knot j+2.
        (0..basis.len()).map(|j| basis.knot(j + 2)).collect()
    }

    #[test]
    fn partition_of_unity() {
        let basis = BSplineBasis::new(0.0, 1.0, 10).unwrap();
        let mut b = vec![0.0; 10];
        for &x in &[0.0, 0.013, 0.25, 0.5, 0.77, 0.999, 1.0] {
            basis.eval(x, &mut b);
            let sum: f64 = b.iter().sum();
            assert!((sum - 1.0).abs() < 1e-12, "sum at {x} was {sum}");
            assert!(b.iter().all(|v| *v >= -1e-15));
        }
    }

    #[test]
    fn reproduces_linear_functions_and_extrapolates_them() {
        let basis = BSplineBasis::new(0.0, 1.0, 8).unwrap();
        let coef = greville(&basis);
        let mut b = vec![0.0; 8];
        for &x in &[-0.5, 0.0, 0.3, 0.9, 1.0, 1.4] {
            basis.eval_extended(x, &mut b);
            let y: f64 = b.iter().zip(coef.iter()).map(|(a, c)| a * c).sum();
            assert!((y - x).abs() < 1e-10, "f({x}) = {y}");
        }
    }

    #[test]
    fn derivative_matches_finite_difference() {
        let basis = BSplineBasis::new(0.0, 2.0, 9).unwrap();
        let coef: Vec<f64> = (0..9).map(|j| ((j * 7) % 5) as f64).collect();
        let f = |x: f64| {
            let mut b = vec![0.0; 9];
            basis.eval(x, &mut b);
            b.iter().zip(coef.iter()).map(|(a, c)| a * c).sum::<f64>()
        };
        let mut d = vec![0.0; 9];
        let x = 0.73;
        basis.eval_deriv(x, &mut d);
        let analytic: f64 = d.iter().zip(coef.iter()).map(|(a, c)| a * c).sum();
        let h = 1e-6;
        let numeric = (f(x + h) - f(x - h)) / (2.0 * h);
        assert!((analytic - numeric).abs() < 1e-5);
    }

    #[test]
    fn penalty_vanishes_on_straight_lines() {
        let basis = BSplineBasis::new(0.0, 1.0, 12).unwrap();
        let s = basis.roughness_penalty();
        let line = nalgebra::DVector::from_vec(greville(&basis).iter().map(|g| 3.0 * g - 1.0).collect());
        let rough = (line.transpose() * &s * &line)[(0, 0)];
        assert!(rough.abs() < 1e-8, "penalty on a line was {rough}");

        // A parabola x^2 has ∫(f'')^2 = 4 over [0, 1].
        let mut b = vec![0.0; 12];
        let xs: Vec<f64> = (0..40).map(|i| i as f64 / 39.0).collect();
        let mut design = DMatrix::<f64>::zeros(xs.len(), 12);
        for (i, &x) in xs.iter().enumerate() {
            basis.eval(x, &mut b);
            for j in 0..12 {
                design[(i, j)] = b[j];
            }
        }
        let y = nalgebra::DVector::from_vec(xs.iter().map(|x| x * x).collect());
        let coef = design.svd(true, true).solve(&y, 1e-12).unwrap();
        let rough = (coef.transpose() * &s * &coef)[(0, 0)];
        assert!((rough - 4.0).abs() < 1e-6, "penalty on x^2 was {rough}");
    }

    #[test]
    fn rejects_degenerate_ranges() {
        assert!(BSplineBasis::new(1.0, 1.0, 10).is_none());
        assert!(BSplineBasis::new(0.0, 1.0, 3).is_none());
    }
}
