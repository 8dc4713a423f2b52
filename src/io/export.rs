//! Export a forecast to CSV.
//!
//! One row per date; history rows carry the observed value, forecast rows
//! leave it blank. Easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::{DatedPoint, ForecastResult};
use crate::error::AppError;

pub const EXPORT_HEADER: &str = "date,kind,observed,value,lower,upper";

/// Write a forecast (history + projection) to a CSV file.
pub fn write_forecast_csv(path: &Path, result: &ForecastResult) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    write_forecast_rows(&mut out, result)?;
    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV: {e}")))
}

/// Write the CSV body to any writer.
pub fn write_forecast_rows<W: Write>(out: &mut W, result: &ForecastResult) -> Result<(), AppError> {
    writeln!(out, "{EXPORT_HEADER}")
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    let rows = result
        .history
        .iter()
        .map(|p| ("fitted", p))
        .chain(result.forecast.iter().map(|p| ("forecast", p)));
    for (kind, p) in rows {
        write_row(out, kind, p)
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }
    Ok(())
}

fn write_row<W: Write>(out: &mut W, kind: &str, p: &DatedPoint) -> std::io::Result<()> {
    writeln!(
        out,
        "{},{},{},{:.4},{:.4},{:.4}",
        p.date,
        kind,
        p.observed.map(|v| format!("{v}")).unwrap_or_default(),
        p.value,
        p.lower,
        p.upper,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Family, FitDiagnostics, ForecastTarget};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn point(d: u32, observed: Option<f64>) -> DatedPoint {
        DatedPoint {
            date: NaiveDate::from_ymd_opt(2020, 3, d).unwrap(),
            observed,
            value: 10.5,
            lower: 9.0,
            upper: 12.25,
        }
    }

    #[test]
    fn rows_follow_the_header() {
        let result = ForecastResult {
            label: "China".to_string(),
            target: ForecastTarget::NewCases,
            generated_at: Utc.with_ymd_and_hms(2020, 3, 3, 0, 0, 0).unwrap(),
            history: vec![point(1, Some(11.0))],
            forecast: vec![point(2, None)],
            diagnostics: FitDiagnostics {
                family: Family::Poisson,
                lambda: 1.0,
                edf: 3.0,
                gcv: 1.0,
                scale: 1.0,
                iterations: 4,
                confidence: 0.95,
                degenerate: false,
            },
        };

        let mut buf = Vec::new();
        write_forecast_rows(&mut buf, &result).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], EXPORT_HEADER);
        assert_eq!(lines[1], "2020-03-01,fitted,11,10.5000,9.0000,12.2500");
        assert_eq!(lines[2], "2020-03-02,forecast,,10.5000,9.0000,12.2500");
    }
}
