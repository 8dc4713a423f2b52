//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - initializes logging
//! - serves the dashboard or runs a one-off forecast
//! - prints reports/plots
//! - writes optional exports

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{Command, ForecastArgs, NewsArgs, PlotArgs, ServeArgs};
use crate::config::{DashboardConfig, NewsConfig, data_base_url, default_panels};
use crate::error::AppError;

pub mod pipeline;

/// Default log filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "covid_dash=info,tower_http=info";

/// Entry point for the `covid-dash` binary.
pub fn run() -> Result<(), AppError> {
    // `covid-dash` and `covid-dash --port 8080` behave like `covid-dash serve ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    dotenvy::dotenv().ok();
    init_tracing();

    match cli.command {
        Command::Serve(args) => handle_serve(args),
        Command::Forecast(args) => handle_forecast(args),
        Command::Plot(args) => handle_plot(args),
        Command::News(args) => handle_news(args),
    }
}

/// Structured logs to stderr; stdout stays clean for reports.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    // A second initialization (e.g. from tests) is harmless.
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn handle_serve(args: ServeArgs) -> Result<(), AppError> {
    let config = dashboard_config_from_args(&args)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| AppError::new(4, format!("Failed to start async runtime: {e}")))?;
    runtime.block_on(crate::web::serve(config))
}

fn handle_forecast(args: ForecastArgs) -> Result<(), AppError> {
    let request = pipeline::PanelRequest {
        region: args.region.clone(),
        target: args.target,
        horizon_days: args.horizon,
        smoothing: args.smoothing.to_config(),
    };
    let base_url = data_base_url(args.data_url.as_deref());
    let (panel, result) = pipeline::run_forecast(&base_url, &request)?;

    println!("{}", crate::report::format_forecast_summary(&panel.observed, &result));

    if args.plot && !args.no_plot {
        println!("{}", crate::plot::render_forecast_plot(&result, args.width, args.height));
    }

    // Optional exports.
    if let Some(path) = &args.export {
        crate::io::write_forecast_csv(path, &result)?;
        tracing::info!(path = %path.display(), "wrote forecast CSV");
    }
    if let Some(path) = &args.export_json {
        let file = crate::io::bundle_forecast(&request.region, request.horizon_days, &request.smoothing, &result);
        crate::io::write_forecast_json(path, &file)?;
        tracing::info!(path = %path.display(), "wrote forecast JSON");
    }

    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let file = crate::io::read_forecast_json(&args.forecast)?;
    println!("{} ({})", file.result.label, file.result.target.display_name());
    println!("{}", crate::plot::render_forecast_plot(&file.result, args.width, args.height));
    Ok(())
}

fn handle_news(args: NewsArgs) -> Result<(), AppError> {
    let config = NewsConfig::from_env(args.max);
    let client = crate::data::NewsClient::from_config(&config).ok_or_else(|| {
        AppError::new(
            2,
            format!("Missing {} in environment (.env).", crate::config::NEWS_API_KEY_VAR),
        )
    })?;
    let items = client.fetch_headlines(args.max)?;
    print!("{}", crate::report::format_headlines(&items));
    Ok(())
}

/// Resolve and validate the server configuration.
pub fn dashboard_config_from_args(args: &ServeArgs) -> Result<DashboardConfig, AppError> {
    let host: IpAddr = args
        .host
        .parse()
        .map_err(|e| AppError::new(2, format!("Invalid --host '{}': {e}", args.host)))?;
    let panels = if args.panels.is_empty() {
        default_panels()
    } else {
        args.panels.clone()
    };

    let config = DashboardConfig {
        bind: SocketAddr::new(host, args.port),
        horizon_days: args.horizon,
        target: args.target,
        panels,
        smoothing: args.smoothing.to_config(),
        refresh: Duration::from_secs(args.refresh_minutes.saturating_mul(60)),
        data_base_url: data_base_url(args.data_url.as_deref()),
        news: NewsConfig::from_env(args.news_items),
    };
    config.validate()?;
    Ok(config)
}

/// Rewrite argv so `covid-dash` defaults to `covid-dash serve`.
///
/// Rules:
/// - `covid-dash`                      -> `covid-dash serve`
/// - `covid-dash --port 8080 ...`      -> `covid-dash serve --port 8080 ...`
/// - `covid-dash --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("serve".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "serve" | "forecast" | "plot" | "news");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "serve flags".
    if arg1.starts_with('-') {
        argv.insert(1, "serve".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_serves() {
        assert_eq!(rewrite_args(args(&["covid-dash"])), args(&["covid-dash", "serve"]));
        assert_eq!(
            rewrite_args(args(&["covid-dash", "--port", "8080"])),
            args(&["covid-dash", "serve", "--port", "8080"])
        );
        assert_eq!(rewrite_args(args(&["covid-dash", "--help"])), args(&["covid-dash", "--help"]));
        assert_eq!(
            rewrite_args(args(&["covid-dash", "forecast", "-r", "Italy"])),
            args(&["covid-dash", "forecast", "-r", "Italy"])
        );
    }

    fn serve_args(extra: &[&str]) -> ServeArgs {
        let mut argv = vec!["covid-dash", "serve"];
        argv.extend_from_slice(extra);
        match crate::cli::Cli::try_parse_from(argv).unwrap().command {
            Command::Serve(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn serve_config_defaults_to_two_panels() {
        let config = dashboard_config_from_args(&serve_args(&["--data-url", "/tmp/jhu"])).unwrap();
        assert_eq!(config.bind.port(), 3000);
        assert_eq!(config.panels, default_panels());
        assert_eq!(config.refresh, Duration::from_secs(3600));
        assert_eq!(config.data_base_url, "/tmp/jhu");
    }

    #[test]
    fn serve_config_rejects_bad_values() {
        let err = dashboard_config_from_args(&serve_args(&["--horizon", "0"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        let err = dashboard_config_from_args(&serve_args(&["--host", "not-an-ip"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
