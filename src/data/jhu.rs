//! Johns Hopkins CSSE time-series source.
//!
//! The base location is either an HTTP(S) URL (the raw GitHub directory by
//! default) or a local directory holding the same three CSV files, which is
//! handy offline and in tests.

use std::fs::File;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;

use crate::domain::{LatestTotals, Metric};
use crate::error::AppError;
use crate::io::{RegionTable, parse_jhu_csv};

pub const DEFAULT_BASE_URL: &str =
    "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

enum Source {
    Http { client: Client, base_url: String },
    Local(PathBuf),
}

pub struct JhuClient {
    source: Source,
}

/// All metrics fetched in one refresh.
#[derive(Debug, Clone)]
pub struct DataSnapshot {
    pub confirmed: RegionTable,
    pub deaths: Option<RegionTable>,
    pub recovered: Option<RegionTable>,
    pub fetched_at: DateTime<Utc>,
}

impl DataSnapshot {
    /// Latest worldwide totals, dated by the confirmed table.
    pub fn latest_totals(&self) -> Option<LatestTotals> {
        let (date, confirmed) = self.confirmed.latest_total()?;
        // Only use a companion table if it reaches the same date.
        let on_date = |table: &Option<RegionTable>| {
            table
                .as_ref()
                .and_then(RegionTable::latest_total)
                .filter(|(d, _)| *d == date)
                .map(|(_, total)| total)
        };
        Some(LatestTotals::new(
            date,
            confirmed,
            on_date(&self.recovered),
            on_date(&self.deaths),
        ))
    }
}

impl JhuClient {
    pub fn new(base: &str) -> Result<Self, AppError> {
        let base = base.trim();
        if base.is_empty() {
            return Err(AppError::new(2, "Data source location must not be empty."));
        }

        let source = if base.starts_with("http://") || base.starts_with("https://") {
            let client = Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .user_agent(concat!("covid-dash/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| AppError::new(4, format!("Failed to build HTTP client: {e}")))?;
            Source::Http {
                client,
                base_url: base.trim_end_matches('/').to_string(),
            }
        } else {
            Source::Local(PathBuf::from(base.strip_prefix("file://").unwrap_or(base)))
        };
        Ok(Self { source })
    }

    /// Download and parse one metric's table.
    pub fn fetch_table(&self, metric: Metric) -> Result<RegionTable, AppError> {
        let table = match &self.source {
            Source::Http { client, base_url } => {
                let url = format!("{base_url}/{}", metric.file_name());
                let resp = client
                    .get(&url)
                    .send()
                    .map_err(|e| AppError::new(4, format!("JHU request failed: {e}")))?;
                if !resp.status().is_success() {
                    return Err(AppError::new(
                        4,
                        format!("JHU request for {url} failed with status {}.", resp.status()),
                    ));
                }
                parse_jhu_csv(resp, metric)?
            }
            Source::Local(dir) => {
                let path = dir.join(metric.file_name());
                let file = File::open(&path)
                    .map_err(|e| AppError::new(4, format!("Failed to open '{}': {e}", path.display())))?;
                parse_jhu_csv(file, metric)?
            }
        };

        if !table.row_errors.is_empty() {
            tracing::warn!(
                metric = metric.display_name(),
                skipped = table.row_errors.len(),
                first_line = table.row_errors[0].line,
                first_error = %table.row_errors[0].message,
                "skipped malformed rows"
            );
        }
        tracing::info!(
            metric = metric.display_name(),
            rows = table.rows_used,
            days = table.dates().len(),
            "loaded time series"
        );
        Ok(table)
    }

    /// Fetch every metric. Only the confirmed table is required.
    pub fn fetch_snapshot(&self) -> Result<DataSnapshot, AppError> {
        let confirmed = self.fetch_table(Metric::Confirmed)?;
        let optional = |metric: Metric| match self.fetch_table(metric) {
            Ok(table) => Some(table),
            Err(err) => {
                tracing::warn!(metric = metric.display_name(), error = %err, "metric unavailable");
                None
            }
        };
        let deaths = optional(Metric::Deaths);
        let recovered = optional(Metric::Recovered);

        Ok(DataSnapshot {
            confirmed,
            deaths,
            recovered,
            fetched_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn write_fixture(dir: &std::path::Path, metric: Metric, body: &str) {
        std::fs::write(dir.join(metric.file_name()), body).unwrap();
    }

    #[test]
    fn local_snapshot_builds_totals() {
        let dir = std::env::temp_dir().join(format!("covid-dash-jhu-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let header = "Province/State,Country/Region,Lat,Long,2/1/20,2/2/20\n";
        write_fixture(&dir, Metric::Confirmed, &format!("{header},China,0,0,100,150\n,Italy,0,0,1,2\n"));
        write_fixture(&dir, Metric::Deaths, &format!("{header},China,0,0,1,1\n"));
        write_fixture(&dir, Metric::Recovered, &format!("{header},China,0,0,1,2\n"));

        let client = JhuClient::new(dir.to_str().unwrap()).unwrap();
        let snapshot = client.fetch_snapshot().unwrap();
        let totals = snapshot.latest_totals().unwrap();

        assert_eq!(totals.date, NaiveDate::from_ymd_opt(2020, 2, 2).unwrap());
        assert_eq!(totals.confirmed, 152);
        assert_eq!(totals.deceased, Some(1));
        assert_eq!(totals.recovered, Some(2));
        assert_eq!(totals.recovery_rate, Some(66.67));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_optional_metrics_are_tolerated() {
        let dir = std::env::temp_dir().join(format!("covid-dash-jhu-partial-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        write_fixture(&dir, Metric::Confirmed, "Country/Region,2/1/20\nChina,5\n");

        let snapshot = JhuClient::new(dir.to_str().unwrap()).unwrap().fetch_snapshot().unwrap();
        assert!(snapshot.deaths.is_none());
        let totals = snapshot.latest_totals().unwrap();
        assert_eq!(totals.confirmed, 5);
        assert_eq!(totals.recovery_rate, None);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_confirmed_table_is_fatal() {
        let dir = std::env::temp_dir().join("covid-dash-jhu-does-not-exist");
        let err = JhuClient::new(dir.to_str().unwrap()).unwrap().fetch_snapshot().unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
