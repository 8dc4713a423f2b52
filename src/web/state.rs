//! Shared server state.
//!
//! The dataset and the headline feed are refetched at most once per refresh
//! interval; fitted forecasts live in a `ForecastCache` keyed by series
//! content, so a refetch that brings no new data does not trigger a refit.
//!
//! All accessors here block (HTTP + fitting) and must run on the blocking pool.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::DashboardConfig;
use crate::data::{DataSnapshot, JhuClient, NewsClient};
use crate::domain::NewsItem;
use crate::error::AppError;
use crate::fit::ForecastCache;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Shared>,
}

struct Shared {
    config: DashboardConfig,
    dataset: Mutex<Option<Timed<Arc<DataSnapshot>>>>,
    headlines: Mutex<Option<Timed<Arc<Vec<NewsItem>>>>>,
    forecasts: ForecastCache,
}

struct Timed<T> {
    fetched: Instant,
    value: T,
}

impl<T: Clone> Timed<T> {
    fn fresh(&self, max_age: Duration) -> Option<T> {
        (self.fetched.elapsed() < max_age).then(|| self.value.clone())
    }
}

/// Outcome of a headline lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum NewsSection {
    /// No API key configured.
    Disabled,
    Unavailable(String),
    Headlines(Arc<Vec<NewsItem>>),
}

impl AppState {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            inner: Arc::new(Shared {
                config,
                dataset: Mutex::new(None),
                headlines: Mutex::new(None),
                forecasts: ForecastCache::new(),
            }),
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    pub fn forecasts(&self) -> &ForecastCache {
        &self.inner.forecasts
    }

    /// Current dataset, refetched when older than the refresh interval.
    pub fn snapshot(&self) -> Result<Arc<DataSnapshot>, AppError> {
        // Held across the fetch so concurrent requests wait for one download.
        let mut slot = self.inner.dataset.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(snapshot) = slot.as_ref().and_then(|t| t.fresh(self.inner.config.refresh)) {
            return Ok(snapshot);
        }

        tracing::info!(source = %self.inner.config.data_base_url, "refreshing dataset");
        let client = JhuClient::new(&self.inner.config.data_base_url)?;
        let snapshot = Arc::new(client.fetch_snapshot()?);
        *slot = Some(Timed {
            fetched: Instant::now(),
            value: Arc::clone(&snapshot),
        });
        Ok(snapshot)
    }

    /// Headlines for the side panel. Failures are reported, not cached.
    pub fn headlines(&self) -> NewsSection {
        let news = &self.inner.config.news;
        if !news.enabled() {
            return NewsSection::Disabled;
        }

        let mut slot = self.inner.headlines.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(items) = slot.as_ref().and_then(|t| t.fresh(self.inner.config.refresh)) {
            return NewsSection::Headlines(items);
        }

        let Some(client) = NewsClient::from_config(news) else {
            return NewsSection::Disabled;
        };
        match client.fetch_headlines(news.max_items) {
            Ok(items) => {
                let items = Arc::new(items);
                *slot = Some(Timed {
                    fetched: Instant::now(),
                    value: Arc::clone(&items),
                });
                NewsSection::Headlines(items)
            }
            Err(err) => {
                tracing::warn!(error = %err, "headline fetch failed");
                NewsSection::Unavailable(err.message().to_string())
            }
        }
    }
}
