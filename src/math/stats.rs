//! Small statistical helpers shared by the fitter.

use statrs::distribution::{ContinuousCDF, Normal};

/// Two-sided standard-normal critical value for a confidence level.
///
/// `0.95 -> 1.959964`. Returns `None` outside `(0, 1)`.
pub fn normal_quantile(confidence: f64) -> Option<f64> {
    if !(confidence.is_finite() && confidence > 0.0 && confidence < 1.0) {
        return None;
    }
    let normal = Normal::new(0.0, 1.0).ok()?;
    let z = normal.inverse_cdf(0.5 + confidence / 2.0);
    z.is_finite().then_some(z)
}

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
///
/// Returns `None` unless `0 < min < max` (finite) and `steps >= 2`.
pub fn log_space(min: f64, max: f64, steps: usize) -> Option<Vec<f64>> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > min) || steps < 2 {
        return None;
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    Some((0..steps).map(|i| (ln_min + step * i as f64).exp()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantile_matches_tables() {
        assert!((normal_quantile(0.95).unwrap() - 1.959964).abs() < 1e-5);
        assert!((normal_quantile(0.80).unwrap() - 1.281552).abs() < 1e-5);
        assert!(normal_quantile(1.0).is_none());
        assert!(normal_quantile(0.0).is_none());
    }

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(0.1, 10.0, 5).unwrap();
        assert!((v[0] - 0.1).abs() < 1e-12);
        assert!((v[v.len() - 1] - 10.0).abs() < 1e-12);
        assert!((v[2] - 1.0).abs() < 1e-12);
        assert!(log_space(10.0, 1.0, 5).is_none());
        assert!(log_space(1.0, 10.0, 1).is_none());
    }
}
