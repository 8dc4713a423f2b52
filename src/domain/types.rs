//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - returned from the HTTP API as JSON
//! - exported to CSV/JSON and reloaded later for plotting

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Response distribution (and link) of the additive model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// Count data: log link, variance proportional to the mean.
    ///
    /// Fitted and predicted values stay positive by construction.
    Poisson,
    /// Identity link, constant variance. Predictions are clipped at zero.
    Gaussian,
}

impl Family {
    pub fn display_name(self) -> &'static str {
        match self {
            Family::Poisson => "Poisson (log link)",
            Family::Gaussian => "Gaussian (identity link)",
        }
    }
}

/// Which series the forecast runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ForecastTarget {
    /// Daily new cases (first difference of the cumulative series).
    NewCases,
    /// The cumulative series itself.
    Cumulative,
}

impl ForecastTarget {
    pub fn display_name(self) -> &'static str {
        match self {
            ForecastTarget::NewCases => "daily new cases",
            ForecastTarget::Cumulative => "cumulative cases",
        }
    }
}

/// Johns Hopkins CSSE time series available for ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Confirmed,
    Deaths,
    Recovered,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Confirmed, Metric::Deaths, Metric::Recovered];

    /// File name of the global CSV for this metric.
    pub fn file_name(self) -> &'static str {
        match self {
            Metric::Confirmed => "time_series_covid19_confirmed_global.csv",
            Metric::Deaths => "time_series_covid19_deaths_global.csv",
            Metric::Recovered => "time_series_covid19_recovered_global.csv",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Metric::Confirmed => "Confirmed",
            Metric::Deaths => "Deceased",
            Metric::Recovered => "Recovered",
        }
    }
}

/// Geographic selection over the country rows of the dataset.
///
/// Parsed from strings:
/// - `global` / `world` -> all rows
/// - `outside:<country>` or `!<country>` -> every row except that country
/// - anything else -> that country (case-insensitive match)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Region {
    Global,
    Country(String),
    Excluding(String),
}

impl Region {
    pub fn label(&self) -> String {
        match self {
            Region::Global => "Global".to_string(),
            Region::Country(name) => name.clone(),
            Region::Excluding(name) => format!("Outside {name}"),
        }
    }

    /// Whether a dataset row for `country` contributes to this region.
    pub fn includes(&self, country: &str) -> bool {
        match self {
            Region::Global => true,
            Region::Country(name) => name.eq_ignore_ascii_case(country),
            Region::Excluding(name) => !name.eq_ignore_ascii_case(country),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Global => write!(f, "global"),
            Region::Country(name) => write!(f, "{name}"),
            Region::Excluding(name) => write!(f, "outside:{name}"),
        }
    }
}

impl FromStr for Region {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("region must not be empty".to_string());
        }
        if s.eq_ignore_ascii_case("global") || s.eq_ignore_ascii_case("world") {
            return Ok(Region::Global);
        }
        let excluded = s
            .strip_prefix("outside:")
            .or_else(|| s.strip_prefix('!'))
            .map(str::trim);
        match excluded {
            Some("") => Err(format!("missing country in region '{s}'")),
            Some(name) => Ok(Region::Excluding(name.to_string())),
            None => Ok(Region::Country(s.to_string())),
        }
    }
}

/// Fixed smoothing configuration of the forecasting engine.
///
/// Defaults are documented in DESIGN.md: 12 cubic B-splines, GCV-selected
/// penalty over `1e-4..1e6` (31 log-spaced steps), Poisson family, 95% band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoothingConfig {
    /// Number of cubic B-spline basis functions for the time trend.
    pub n_basis: usize,
    /// Add an effect-coded day-of-week term.
    pub weekly: bool,
    pub family: Family,
    /// Two-sided confidence level of the uncertainty band, in `(0, 1)`.
    pub confidence: f64,
    /// Smallest relative penalty on the GCV grid.
    pub lambda_min: f64,
    /// Largest relative penalty on the GCV grid.
    pub lambda_max: f64,
    pub lambda_steps: usize,
    /// Iteration cap for penalized IRLS.
    pub max_iter: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            n_basis: 12,
            weekly: false,
            family: Family::Poisson,
            confidence: 0.95,
            lambda_min: 1e-4,
            lambda_max: 1e6,
            lambda_steps: 31,
            max_iter: 100,
        }
    }
}

/// One cumulative observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

/// Cumulative confirmed counts, one per calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    label: String,
    points: Vec<DailyCount>,
}

impl TimeSeries {
    /// Validate and wrap a cumulative series.
    ///
    /// Dates must be consecutive calendar days.
    pub fn new(label: impl Into<String>, points: Vec<DailyCount>) -> Result<Self, AppError> {
        let label = label.into();
        if points.is_empty() {
            return Err(AppError::new(4, format!("Series '{label}' has no observations.")));
        }
        for pair in points.windows(2) {
            let gap = (pair[1].date - pair[0].date).num_days();
            if gap != 1 {
                return Err(AppError::new(
                    4,
                    format!(
                        "Series '{label}' is not daily: {} is followed by {}.",
                        pair[0].date, pair[1].date
                    ),
                ));
            }
        }
        Ok(Self { label, points })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn points(&self) -> &[DailyCount] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> NaiveDate {
        self.points[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.points[self.points.len() - 1].date
    }

    /// Latest cumulative count.
    pub fn latest(&self) -> u64 {
        self.points[self.points.len() - 1].count
    }

    /// First difference: new cases per day.
    ///
    /// The result is one day shorter and starts on the second date. Negative
    /// values (upstream corrections) are kept as-is.
    pub fn derive_daily(&self) -> DerivedSeries {
        let points = self
            .points
            .windows(2)
            .map(|pair| DailyChange {
                date: pair[1].date,
                value: pair[1].count as i64 - pair[0].count as i64,
            })
            .collect();
        DerivedSeries {
            label: self.label.clone(),
            points,
        }
    }

    /// Engine input for the cumulative target (day 0 = first date).
    pub fn observations(&self) -> Vec<Observation> {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| Observation {
                day: i as u32,
                value: p.count as f64,
            })
            .collect()
    }
}

/// One first-differenced observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyChange {
    pub date: NaiveDate,
    pub value: i64,
}

/// Daily new cases derived from a `TimeSeries`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedSeries {
    label: String,
    points: Vec<DailyChange>,
}

impl DerivedSeries {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn points(&self) -> &[DailyChange] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    /// Engine input (day 0 = first derived date).
    pub fn observations(&self) -> Vec<Observation> {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| Observation {
                day: i as u32,
                value: p.value as f64,
            })
            .collect()
    }
}

/// Engine input point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub day: u32,
    pub value: f64,
}

/// A fitted or predicted value with its uncertainty band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub day: u32,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

/// How the engine arrived at its fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    /// Family actually used (may differ from the configured one after fallback).
    pub family: Family,
    /// Absolute penalty weight on the roughness term.
    pub lambda: f64,
    /// Effective degrees of freedom of the fit.
    pub edf: f64,
    pub gcv: f64,
    /// Estimated dispersion (Pearson / residual degrees of freedom).
    pub scale: f64,
    /// Penalized IRLS iterations (1 for Gaussian).
    pub iterations: usize,
    pub confidence: f64,
    /// True when the input was all zeros and no model was fitted.
    pub degenerate: bool,
}

/// Engine output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitAndForecast {
    /// One entry per input observation.
    pub fitted: Vec<ForecastPoint>,
    /// One entry per future day, `last_day + 1 ..= last_day + horizon`.
    pub predicted: Vec<ForecastPoint>,
    pub diagnostics: FitDiagnostics,
}

/// Dated fitted/predicted value for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatedPoint {
    pub date: NaiveDate,
    /// Observed value (history only).
    pub observed: Option<f64>,
    pub value: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Dated forecast for one panel, created fresh on every forecast invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub label: String,
    pub target: ForecastTarget,
    pub generated_at: DateTime<Utc>,
    pub history: Vec<DatedPoint>,
    pub forecast: Vec<DatedPoint>,
    pub diagnostics: FitDiagnostics,
}

impl ForecastResult {
    /// Attach calendar dates to an engine result.
    ///
    /// `origin` is the date of day 0 in `observations`.
    pub fn assemble(
        label: impl Into<String>,
        target: ForecastTarget,
        origin: NaiveDate,
        observations: &[Observation],
        fit: &FitAndForecast,
        generated_at: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let date_of = |day: u32| {
            origin
                .checked_add_days(Days::new(u64::from(day)))
                .ok_or_else(|| AppError::new(4, format!("Day index {day} overflows the calendar.")))
        };

        let mut history = Vec::with_capacity(fit.fitted.len());
        for (obs, p) in observations.iter().zip(fit.fitted.iter()) {
            history.push(DatedPoint {
                date: date_of(p.day)?,
                observed: Some(obs.value),
                value: p.value,
                lower: p.lower,
                upper: p.upper,
            });
        }

        let mut forecast = Vec::with_capacity(fit.predicted.len());
        for p in &fit.predicted {
            forecast.push(DatedPoint {
                date: date_of(p.day)?,
                observed: None,
                value: p.value,
                lower: p.lower,
                upper: p.upper,
            });
        }

        Ok(Self {
            label: label.into(),
            target,
            generated_at,
            history,
            forecast,
            diagnostics: fit.diagnostics.clone(),
        })
    }
}

/// Latest global totals (the dashboard's "Data" table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestTotals {
    pub date: NaiveDate,
    pub confirmed: u64,
    pub recovered: Option<u64>,
    pub deceased: Option<u64>,
    /// `100 * recovered / (recovered + deceased)`, two decimals.
    pub recovery_rate: Option<f64>,
}

impl LatestTotals {
    pub fn new(date: NaiveDate, confirmed: u64, recovered: Option<u64>, deceased: Option<u64>) -> Self {
        let recovery_rate = match (recovered, deceased) {
            (Some(rec), Some(dec)) if rec + dec > 0 => {
                let rate = 100.0 * rec as f64 / (rec + dec) as f64;
                Some((rate * 100.0).round() / 100.0)
            }
            _ => None,
        };
        Self {
            date,
            confirmed,
            recovered,
            deceased,
            recovery_rate,
        }
    }
}

/// A news headline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub headline: String,
    pub source: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Portable forecast JSON (written by `forecast --export-json`, read by `plot`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastFile {
    pub tool: String,
    /// Region in its parseable form (`global`, `China`, `outside:China`).
    pub region: String,
    pub metric: Metric,
    pub horizon_days: i64,
    pub smoothing: SmoothingConfig,
    pub result: ForecastResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, d).unwrap()
    }

    #[test]
    fn region_parsing() {
        assert_eq!("global".parse::<Region>().unwrap(), Region::Global);
        assert_eq!("China".parse::<Region>().unwrap(), Region::Country("China".to_string()));
        assert_eq!(
            "outside:China".parse::<Region>().unwrap(),
            Region::Excluding("China".to_string())
        );
        assert_eq!("!Italy".parse::<Region>().unwrap(), Region::Excluding("Italy".to_string()));
        assert!("outside:".parse::<Region>().is_err());
        assert!("  ".parse::<Region>().is_err());
    }

    #[test]
    fn region_membership_and_labels() {
        let outside = Region::Excluding("China".to_string());
        assert!(outside.includes("Italy"));
        assert!(!outside.includes("china"));
        assert_eq!(outside.label(), "Outside China");
        assert_eq!(outside.to_string().parse::<Region>().unwrap(), outside);
    }

    #[test]
    fn time_series_rejects_gaps() {
        let points = vec![
            DailyCount { date: day(1), count: 1 },
            DailyCount { date: day(3), count: 2 },
        ];
        let err = TimeSeries::new("X", points).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(TimeSeries::new("X", Vec::new()).is_err());
    }

    #[test]
    fn derive_daily_keeps_corrections() {
        let points = vec![
            DailyCount { date: day(1), count: 10 },
            DailyCount { date: day(2), count: 15 },
            DailyCount { date: day(3), count: 13 },
        ];
        let series = TimeSeries::new("X", points).unwrap();
        let daily = series.derive_daily();
        let values: Vec<i64> = daily.points().iter().map(|p| p.value).collect();
        assert_eq!(values, vec![5, -2]);
        assert_eq!(daily.first_date(), Some(day(2)));
        assert_eq!(daily.observations()[1].day, 1);
        assert_eq!(series.latest(), 13);
    }

    #[test]
    fn recovery_rate_rounds_to_two_decimals() {
        let totals = LatestTotals::new(day(1), 100, Some(2), Some(1));
        assert_eq!(totals.recovery_rate, Some(66.67));

        let totals = LatestTotals::new(day(1), 100, None, Some(1));
        assert_eq!(totals.recovery_rate, None);

        let totals = LatestTotals::new(day(1), 100, Some(0), Some(0));
        assert_eq!(totals.recovery_rate, None);
    }

    #[test]
    fn assemble_attaches_dates() {
        let obs = vec![Observation { day: 0, value: 1.0 }, Observation { day: 1, value: 2.0 }];
        let point = |day| ForecastPoint { day, value: 1.5, lower: 1.0, upper: 2.0 };
        let fit = FitAndForecast {
            fitted: vec![point(0), point(1)],
            predicted: vec![point(2)],
            diagnostics: FitDiagnostics {
                family: Family::Gaussian,
                lambda: 1.0,
                edf: 2.0,
                gcv: 0.0,
                scale: 0.0,
                iterations: 1,
                confidence: 0.95,
                degenerate: false,
            },
        };
        let result =
            ForecastResult::assemble("X", ForecastTarget::NewCases, day(10), &obs, &fit, Utc::now()).unwrap();
        assert_eq!(result.history[1].date, day(11));
        assert_eq!(result.history[1].observed, Some(2.0));
        assert_eq!(result.forecast[0].date, day(12));
        assert_eq!(result.forecast[0].observed, None);
    }
}
