//! Most-recent-forecast cache.
//!
//! Fitting dominates the latency of a dashboard render, and the underlying
//! dataset only changes about once a day. The cache keeps one slot per panel;
//! a slot is valid for exactly one `(series hash, horizon)` key and is
//! replaced wholesale when the data or horizon changes.
//!
//! Readers share an `RwLock`; writers only ever replace a slot. The smoothing
//! configuration is fixed for the lifetime of a cache and is not part of the key.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use crate::domain::{FitAndForecast, Observation};
use crate::error::ForecastError;

/// Identity of one forecast request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    series_hash: u64,
    horizon_days: i64,
}

impl CacheKey {
    pub fn new(series: &[Observation], horizon_days: i64) -> Self {
        let mut hasher = DefaultHasher::new();
        series.len().hash(&mut hasher);
        for o in series {
            o.day.hash(&mut hasher);
            o.value.to_bits().hash(&mut hasher);
        }
        Self {
            series_hash: hasher.finish(),
            horizon_days,
        }
    }
}

type Slot = (CacheKey, Arc<FitAndForecast>);

#[derive(Debug, Default)]
pub struct ForecastCache {
    slots: RwLock<HashMap<String, Slot>>,
}

impl ForecastCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached forecast for `slot` if it was computed for `key`.
    pub fn get(&self, slot: &str, key: &CacheKey) -> Option<Arc<FitAndForecast>> {
        // A poisoned lock only means a writer panicked mid-replace; the map
        // itself is still a valid set of complete entries.
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        slots
            .get(slot)
            .filter(|(cached_key, _)| cached_key == key)
            .map(|(_, value)| Arc::clone(value))
    }

    /// Replace the contents of `slot`.
    pub fn insert(&self, slot: &str, key: CacheKey, value: Arc<FitAndForecast>) {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        slots.insert(slot.to_string(), (key, value));
    }

    /// Return the cached forecast or compute, store and return a fresh one.
    ///
    /// Errors are not cached.
    pub fn get_or_compute<F>(
        &self,
        slot: &str,
        series: &[Observation],
        horizon_days: i64,
        compute: F,
    ) -> Result<Arc<FitAndForecast>, ForecastError>
    where
        F: FnOnce() -> Result<FitAndForecast, ForecastError>,
    {
        let key = CacheKey::new(series, horizon_days);
        if let Some(hit) = self.get(slot, &key) {
            tracing::debug!(slot, "forecast cache hit");
            return Ok(hit);
        }

        let fresh = Arc::new(compute()?);
        self.insert(slot, key, Arc::clone(&fresh));
        Ok(fresh)
    }

    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Family, FitDiagnostics};

    fn series(values: &[f64]) -> Vec<Observation> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| Observation { day: i as u32, value })
            .collect()
    }

    fn dummy(tag: f64) -> FitAndForecast {
        FitAndForecast {
            fitted: Vec::new(),
            predicted: Vec::new(),
            diagnostics: FitDiagnostics {
                family: Family::Poisson,
                lambda: tag,
                edf: 0.0,
                gcv: 0.0,
                scale: 0.0,
                iterations: 0,
                confidence: 0.95,
                degenerate: false,
            },
        }
    }

    #[test]
    fn key_depends_on_values_and_horizon() {
        let a = series(&[1.0, 2.0]);
        let b = series(&[1.0, 2.5]);
        assert_eq!(CacheKey::new(&a, 7), CacheKey::new(&a, 7));
        assert_ne!(CacheKey::new(&a, 7), CacheKey::new(&b, 7));
        assert_ne!(CacheKey::new(&a, 7), CacheKey::new(&a, 8));
    }

    #[test]
    fn computes_once_per_key() {
        let cache = ForecastCache::new();
        let s = series(&[1.0, 2.0, 3.0]);
        let mut calls = 0;

        let first = cache
            .get_or_compute("China", &s, 7, || {
                calls += 1;
                Ok(dummy(1.0))
            })
            .unwrap();
        let second = cache
            .get_or_compute("China", &s, 7, || {
                calls += 1;
                Ok(dummy(2.0))
            })
            .unwrap();

        assert_eq!(calls, 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn new_key_replaces_the_slot() {
        let cache = ForecastCache::new();
        let s = series(&[1.0, 2.0, 3.0]);
        cache.get_or_compute("China", &s, 7, || Ok(dummy(1.0))).unwrap();
        let refreshed = cache.get_or_compute("China", &s, 3, || Ok(dummy(2.0))).unwrap();

        assert_eq!(refreshed.diagnostics.lambda, 2.0);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("China", &CacheKey::new(&s, 7)).is_none());
    }

    #[test]
    fn errors_are_not_cached() {
        let cache = ForecastCache::new();
        let s = series(&[1.0]);
        let err = cache
            .get_or_compute("X", &s, 0, || Err(ForecastError::InvalidHorizon(0)))
            .unwrap_err();
        assert_eq!(err, ForecastError::InvalidHorizon(0));
        assert!(cache.is_empty());
    }
}
