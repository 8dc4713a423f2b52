//! Runtime configuration for the dashboard and the CLI.
//!
//! Everything is resolved once at startup from CLI flags and the environment
//! (`.env` is honored via `dotenvy`) and then passed down explicitly.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use crate::data::jhu::DEFAULT_BASE_URL;
use crate::domain::{ForecastTarget, Region, SmoothingConfig};
use crate::error::AppError;
use crate::fit::MAX_HORIZON_DAYS;

/// Environment variable holding the newsapi.org key.
pub const NEWS_API_KEY_VAR: &str = "NEWS_API_KEY";

/// Environment variable overriding the JHU data location.
pub const DATA_URL_VAR: &str = "JHU_BASE_URL";

pub const DEFAULT_NEWS_QUERY: &str = "coronavirus";
pub const DEFAULT_NEWS_LANGUAGE: &str = "en";
pub const DEFAULT_NEWS_ITEMS: usize = 10;

/// Panels shown when none are configured.
pub fn default_panels() -> Vec<Region> {
    vec![
        Region::Country("China".to_string()),
        Region::Excluding("China".to_string()),
    ]
}

/// Headline feed settings.
#[derive(Clone)]
pub struct NewsConfig {
    /// `None` disables the feed.
    pub api_key: Option<String>,
    pub query: String,
    pub language: String,
    pub max_items: usize,
}

impl NewsConfig {
    /// Read the API key from the environment (or `.env`).
    pub fn from_env(max_items: usize) -> Self {
        dotenvy::dotenv().ok();
        let api_key = std::env::var(NEWS_API_KEY_VAR)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        Self {
            api_key,
            query: DEFAULT_NEWS_QUERY.to_string(),
            language: DEFAULT_NEWS_LANGUAGE.to_string(),
            max_items,
        }
    }

    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }
}

impl fmt::Debug for NewsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("query", &self.query)
            .field("language", &self.language)
            .field("max_items", &self.max_items)
            .finish()
    }
}

/// Resolve the JHU data location: explicit flag, then environment, then default.
pub fn data_base_url(flag: Option<&str>) -> String {
    dotenvy::dotenv().ok();
    flag.map(str::to_string)
        .or_else(|| std::env::var(DATA_URL_VAR).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

/// Fully resolved dashboard server configuration.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub bind: SocketAddr,
    pub horizon_days: i64,
    pub target: ForecastTarget,
    pub panels: Vec<Region>,
    pub smoothing: SmoothingConfig,
    /// How long a fetched dataset is served before refetching.
    pub refresh: Duration,
    pub data_base_url: String,
    pub news: NewsConfig,
}

impl DashboardConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.horizon_days <= 0 || self.horizon_days > MAX_HORIZON_DAYS {
            return Err(AppError::new(
                2,
                format!("--horizon must be in 1..={MAX_HORIZON_DAYS}, got {}.", self.horizon_days),
            ));
        }
        if self.panels.is_empty() {
            return Err(AppError::new(2, "At least one --panel is required."));
        }
        if self.refresh.is_zero() {
            return Err(AppError::new(2, "--refresh-minutes must be at least 1."));
        }
        if self.news.max_items == 0 {
            return Err(AppError::new(2, "--news-items must be at least 1."));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DashboardConfig {
        DashboardConfig {
            bind: "127.0.0.1:3000".parse().unwrap(),
            horizon_days: 7,
            target: ForecastTarget::NewCases,
            panels: default_panels(),
            smoothing: SmoothingConfig::default(),
            refresh: Duration::from_secs(3600),
            data_base_url: DEFAULT_BASE_URL.to_string(),
            news: NewsConfig {
                api_key: Some("secret".to_string()),
                query: DEFAULT_NEWS_QUERY.to_string(),
                language: DEFAULT_NEWS_LANGUAGE.to_string(),
                max_items: DEFAULT_NEWS_ITEMS,
            },
        }
    }

    #[test]
    fn default_config_is_valid() {
        config().validate().unwrap();
        assert_eq!(default_panels()[1].label(), "Outside China");
    }

    #[test]
    fn invalid_values_are_usage_errors() {
        let mut c = config();
        c.horizon_days = 0;
        assert_eq!(c.validate().unwrap_err().exit_code(), 2);

        let mut c = config();
        c.panels.clear();
        assert_eq!(c.validate().unwrap_err().exit_code(), 2);

        let mut c = config();
        c.refresh = Duration::ZERO;
        assert!(c.validate().is_err());
    }

    #[test]
    fn api_key_is_not_printed() {
        let printed = format!("{:?}", config().news);
        assert!(!printed.contains("secret"));
        assert!(printed.contains("redacted"));
    }

    #[test]
    fn explicit_data_url_wins() {
        assert_eq!(data_base_url(Some(" /tmp/jhu ")), "/tmp/jhu");
    }
}
