//! Command-line parsing for the COVID-19 dashboard.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the data/forecasting code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::DEFAULT_NEWS_ITEMS;
use crate::domain::{Family, ForecastTarget, Region, SmoothingConfig};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "covid-dash", version, about = "COVID-19 dashboard with a short-term GAM forecast")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTML dashboard (the default when no subcommand is given).
    Serve(ServeArgs),
    /// Fetch data, forecast one region and print the result.
    Forecast(ForecastArgs),
    /// Plot a previously exported forecast JSON.
    Plot(PlotArgs),
    /// Print the latest headlines (requires NEWS_API_KEY).
    News(NewsArgs),
}

/// Smoothing options shared by `serve` and `forecast`.
#[derive(Debug, Args, Clone)]
pub struct SmoothingArgs {
    /// Number of cubic B-spline basis functions.
    #[arg(long, default_value_t = 12)]
    pub basis: usize,

    /// Add a day-of-week effect to the model.
    #[arg(long)]
    pub weekly: bool,

    /// Response family.
    #[arg(long, value_enum, default_value_t = Family::Poisson)]
    pub family: Family,

    /// Confidence level of the uncertainty band.
    #[arg(long, default_value_t = 0.95)]
    pub confidence: f64,

    /// Smallest relative penalty on the GCV grid.
    #[arg(long, default_value_t = 1e-4)]
    pub lambda_min: f64,

    /// Largest relative penalty on the GCV grid.
    #[arg(long, default_value_t = 1e6)]
    pub lambda_max: f64,

    /// Number of log-spaced penalties on the GCV grid.
    #[arg(long, default_value_t = 31)]
    pub lambda_steps: usize,

    /// Iteration cap for penalized IRLS.
    #[arg(long, default_value_t = 100)]
    pub max_iter: usize,
}

impl SmoothingArgs {
    pub fn to_config(&self) -> SmoothingConfig {
        SmoothingConfig {
            n_basis: self.basis,
            weekly: self.weekly,
            family: self.family,
            confidence: self.confidence,
            lambda_min: self.lambda_min,
            lambda_max: self.lambda_max,
            lambda_steps: self.lambda_steps,
            max_iter: self.max_iter,
        }
    }
}

/// Options for the dashboard server.
#[derive(Debug, Args, Clone)]
pub struct ServeArgs {
    /// Interface to bind.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on.
    #[arg(short = 'p', long, default_value_t = 3000)]
    pub port: u16,

    /// Forecast horizon in days.
    #[arg(long, default_value_t = 7, allow_negative_numbers = true)]
    pub horizon: i64,

    /// Series to forecast.
    #[arg(long, value_enum, default_value_t = ForecastTarget::NewCases)]
    pub target: ForecastTarget,

    /// Dashboard panel (repeatable): a country, `global`, or `outside:<country>`.
    ///
    /// Defaults to `China` and `outside:China`.
    #[arg(long = "panel", value_name = "REGION")]
    pub panels: Vec<Region>,

    /// Minutes before the dataset and headlines are refetched.
    #[arg(long, default_value_t = 60)]
    pub refresh_minutes: u64,

    /// JHU time-series location (URL or local directory); overrides JHU_BASE_URL.
    #[arg(long)]
    pub data_url: Option<String>,

    /// Maximum number of headlines.
    #[arg(long, default_value_t = DEFAULT_NEWS_ITEMS)]
    pub news_items: usize,

    #[command(flatten)]
    pub smoothing: SmoothingArgs,
}

/// Options for a one-off terminal forecast.
#[derive(Debug, Args, Clone)]
pub struct ForecastArgs {
    /// Region: a country, `global`, or `outside:<country>`.
    #[arg(short = 'r', long, default_value = "China")]
    pub region: Region,

    /// Forecast horizon in days.
    #[arg(long, default_value_t = 7, allow_negative_numbers = true)]
    pub horizon: i64,

    /// Series to forecast.
    #[arg(long, value_enum, default_value_t = ForecastTarget::NewCases)]
    pub target: ForecastTarget,

    /// JHU time-series location (URL or local directory); overrides JHU_BASE_URL.
    #[arg(long)]
    pub data_url: Option<String>,

    #[command(flatten)]
    pub smoothing: SmoothingArgs,

    /// Render an ASCII plot in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export history + forecast to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the forecast (with its settings) to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,
}

/// Options for plotting a saved forecast.
#[derive(Debug, Args)]
pub struct PlotArgs {
    /// Forecast JSON file produced by `covid-dash forecast --export-json`.
    #[arg(long, value_name = "JSON")]
    pub forecast: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

/// Options for the headline listing.
#[derive(Debug, Args)]
pub struct NewsArgs {
    /// Maximum number of headlines.
    #[arg(long, default_value_t = DEFAULT_NEWS_ITEMS)]
    pub max: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_defaults() {
        let cli = Cli::try_parse_from(["covid-dash", "serve"]).unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, 3000);
        assert_eq!(args.horizon, 7);
        assert!(args.panels.is_empty());
        assert_eq!(args.smoothing.to_config(), SmoothingConfig::default());
    }

    #[test]
    fn forecast_flags() {
        let cli = Cli::try_parse_from([
            "covid-dash",
            "forecast",
            "-r",
            "outside:China",
            "--horizon",
            "-3",
            "--weekly",
            "--family",
            "gaussian",
            "--target",
            "cumulative",
        ])
        .unwrap();
        let Command::Forecast(args) = cli.command else {
            panic!("expected forecast");
        };
        assert_eq!(args.region, Region::Excluding("China".to_string()));
        assert_eq!(args.horizon, -3);
        assert_eq!(args.target, ForecastTarget::Cumulative);
        let config = args.smoothing.to_config();
        assert!(config.weekly);
        assert_eq!(config.family, Family::Gaussian);
    }

    #[test]
    fn repeated_panels() {
        let cli = Cli::try_parse_from(["covid-dash", "serve", "--panel", "Italy", "--panel", "global"]).unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.panels, vec![Region::Country("Italy".to_string()), Region::Global]);
    }
}
