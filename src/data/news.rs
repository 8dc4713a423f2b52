//! newsapi.org headline feed.
//!
//! The feed is optional: without an API key `NewsClient::from_config` returns
//! `None` and the dashboard shows a notice instead of headlines.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::config::NewsConfig;
use crate::domain::NewsItem;
use crate::error::AppError;

const EVERYTHING_URL: &str = "https://newsapi.org/v2/everything";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// newsapi.org caps `pageSize` at 100.
const MAX_PAGE_SIZE: usize = 100;

pub struct NewsClient {
    client: Client,
    api_key: String,
    query: String,
    language: String,
}

impl NewsClient {
    /// `None` when no API key is configured.
    pub fn from_config(config: &NewsConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        let client = match Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("covid-dash/", env!("CARGO_PKG_VERSION")))
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!(error = %err, "failed to build news HTTP client; feed disabled");
                return None;
            }
        };
        Some(Self {
            client,
            api_key,
            query: config.query.clone(),
            language: config.language.clone(),
        })
    }

    /// Most relevant headlines, at most `max`.
    pub fn fetch_headlines(&self, max: usize) -> Result<Vec<NewsItem>, AppError> {
        let page_size = max.clamp(1, MAX_PAGE_SIZE).to_string();
        let resp = self
            .client
            .get(EVERYTHING_URL)
            .header("X-Api-Key", &self.api_key)
            .query(&[
                ("q", self.query.as_str()),
                ("language", self.language.as_str()),
                ("sortBy", "relevancy"),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .map_err(|e| AppError::new(4, format!("News request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .map_err(|e| AppError::new(4, format!("Failed to read news response: {e}")))?;

        // Error responses still carry a JSON body with a message; prefer it.
        match parse_articles(&body, max) {
            Ok(items) => Ok(items),
            Err(err) if status.is_success() => Err(err),
            Err(_) => Err(AppError::new(4, format!("News request failed with status {status}."))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    #[serde(default)]
    source: Option<ArticleSource>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    #[serde(default)]
    name: Option<String>,
}

/// Parse a newsapi.org `/v2/everything` response body.
///
/// Articles without a title or URL are dropped.
pub fn parse_articles(body: &str, max: usize) -> Result<Vec<NewsItem>, AppError> {
    let resp: EverythingResponse = serde_json::from_str(body)
        .map_err(|e| AppError::new(4, format!("Failed to parse news response: {e}")))?;

    if resp.status != "ok" {
        return Err(AppError::new(
            4,
            format!(
                "News API returned an error: {}",
                resp.message.as_deref().unwrap_or(&resp.status)
            ),
        ));
    }

    let items = resp
        .articles
        .into_iter()
        .filter_map(|a| {
            let headline = non_empty(a.title)?;
            let url = non_empty(a.url)?;
            Some(NewsItem {
                headline,
                source: a.source.and_then(|s| s.name).unwrap_or_default(),
                url,
                published_at: a
                    .published_at
                    .as_deref()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|d| d.with_timezone(&Utc)),
            })
        })
        .take(max)
        .collect();
    Ok(items)
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
