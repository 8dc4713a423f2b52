//! Formatted terminal output: forecast summary, totals, headlines.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{ForecastResult, LatestTotals, NewsItem, TimeSeries};

/// Format the run summary (data window + fit diagnostics + forecast table).
pub fn format_forecast_summary(observed: &TimeSeries, result: &ForecastResult) -> String {
    let mut out = String::new();
    let d = &result.diagnostics;

    out.push_str("=== covid-dash - COVID-19 forecast ===\n");
    out.push_str(&format!("Region: {}\n", result.label));
    out.push_str(&format!("Target: {}\n", result.target.display_name()));
    out.push_str(&format!(
        "Data: {} .. {} ({} days) | latest cumulative={}\n",
        observed.first_date(),
        observed.last_date(),
        observed.len(),
        group_thousands(observed.latest()),
    ));

    out.push_str("\nModel diagnostics:\n");
    if d.degenerate {
        out.push_str("- all observations are zero; forecast is flat zero\n");
    } else {
        out.push_str(&format!("- family: {}\n", d.family.display_name()));
        out.push_str(&format!(
            "- lambda={:.4e} edf={:.2} GCV={:.4} scale={:.4} iterations={}\n",
            d.lambda, d.edf, d.gcv, d.scale, d.iterations
        ));
    }

    out.push_str(&format!(
        "\nForecast ({:.0}% band):\n",
        100.0 * d.confidence
    ));
    out.push_str(&format_forecast_table(result));
    out
}

/// Date / value / band table of the projected days.
pub fn format_forecast_table(result: &ForecastResult) -> String {
    let mut out = String::new();
    out.push_str(format!("{:<10} {:>12} {:>12} {:>12}", "date", "forecast", "lower", "upper").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<10} {:-<12} {:-<12} {:-<12}", "", "", "", "").trim_end());
    out.push('\n');

    for p in &result.forecast {
        out.push_str(&format!(
            "{:<10} {:>12.1} {:>12.1} {:>12.1}\n",
            p.date, p.value, p.lower, p.upper
        ));
    }
    out
}

/// The dashboard's "Data" table as text.
pub fn format_latest_totals(totals: &LatestTotals) -> String {
    let mut out = String::new();
    out.push_str(&format!("Latest totals ({}):\n", totals.date));
    out.push_str(&format!("{:<14} {:>14}\n", "Confirmed", group_thousands(totals.confirmed)));
    out.push_str(&format!("{:<14} {:>14}\n", "Recovered", fmt_optional_count(totals.recovered)));
    out.push_str(&format!("{:<14} {:>14}\n", "Deceased", fmt_optional_count(totals.deceased)));
    out.push_str(&format!("{:<14} {:>14}\n", "Recovery Rate", fmt_rate(totals.recovery_rate)));
    out
}

/// Numbered headline list.
pub fn format_headlines(items: &[NewsItem]) -> String {
    if items.is_empty() {
        return "No headlines available.\n".to_string();
    }
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        let source = if item.source.is_empty() {
            String::new()
        } else {
            format!(" ({})", item.source)
        };
        out.push_str(&format!("{:>2}. {}{source}\n    {}\n", i + 1, truncate(&item.headline, 100), item.url));
    }
    out
}

/// `1234567` -> `1,234,567`.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn fmt_optional_count(n: Option<u64>) -> String {
    n.map(group_thousands).unwrap_or_else(|| "n/a".to_string())
}

pub fn fmt_rate(rate: Option<f64>) -> String {
    rate.map(|r| format!("{r:.2}%")).unwrap_or_else(|| "n/a".to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
