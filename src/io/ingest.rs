//! JHU CSSE CSV ingest and normalization.
//!
//! The global time-series files are wide: one row per (province, country),
//! a few metadata columns and then one cumulative-count column per day
//! (`1/22/20`, `1/23/20`, ...). This module turns that into per-country
//! cumulative vectors that can be aggregated into any `Region`.
//!
//! Design goals:
//! - **Strict schema** for the country column and the date columns (exit code 4)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (countries kept in sorted order)
//! - **Separation of concerns**: no HTTP and no fitting logic here

use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use chrono::NaiveDate;
use csv::StringRecord;

use crate::domain::{DailyCount, Metric, Region, TimeSeries};
use crate::error::AppError;

/// Date format of the JHU column headers.
const DATE_HEADER_FORMAT: &str = "%m/%d/%y";

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub id: Option<String>,
    pub message: String,
}

/// One metric's table, aggregated per country.
#[derive(Debug, Clone)]
pub struct RegionTable {
    pub metric: Metric,
    dates: Vec<NaiveDate>,
    by_country: BTreeMap<String, Vec<u64>>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
}

/// Parse one JHU global time-series CSV.
pub fn parse_jhu_csv<R: Read>(reader: R, metric: Metric) -> Result<RegionTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(4, format!("Failed to read {} CSV headers: {e}", metric.display_name())))?
        .clone();

    let header_map = build_header_map(&headers);
    let country_idx = header_map
        .get("country/region")
        .or_else(|| header_map.get("country_region"))
        .copied()
        .ok_or_else(|| {
            AppError::new(
                4,
                format!("{} CSV is missing the `Country/Region` column.", metric.display_name()),
            )
        })?;
    let province_idx = header_map
        .get("province/state")
        .or_else(|| header_map.get("province_state"))
        .copied();

    let (date_columns, dates) = date_columns(&headers, metric)?;

    let mut by_country: BTreeMap<String, Vec<u64>> = BTreeMap::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;
    let mut rows_used = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // records() starts after the header line; CSV lines are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let country = record.get(country_idx).unwrap_or("").to_string();
        let id = row_id(&record, &country, province_idx);
        if country.is_empty() {
            row_errors.push(RowError {
                line,
                id,
                message: "empty `Country/Region`".to_string(),
            });
            continue;
        }

        let counts = match parse_counts(&record, &date_columns) {
            Ok(counts) => counts,
            Err(message) => {
                row_errors.push(RowError { line, id, message });
                continue;
            }
        };

        let totals = by_country
            .entry(country)
            .or_insert_with(|| vec![0; dates.len()]);
        for (total, count) in totals.iter_mut().zip(counts) {
            *total = total.saturating_add(count);
        }
        rows_used += 1;
    }

    if rows_used == 0 {
        return Err(AppError::new(
            4,
            format!("{} CSV contains no usable rows.", metric.display_name()),
        ));
    }

    Ok(RegionTable {
        metric,
        dates,
        by_country,
        row_errors,
        rows_read,
        rows_used,
    })
}

impl RegionTable {
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn countries(&self) -> impl Iterator<Item = &str> {
        self.by_country.keys().map(String::as_str)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Cumulative series for a region, summed over its country rows.
    pub fn series(&self, region: &Region) -> Result<TimeSeries, AppError> {
        if let Region::Country(name) | Region::Excluding(name) = region {
            if !self.by_country.keys().any(|c| c.eq_ignore_ascii_case(name)) {
                return Err(AppError::new(
                    2,
                    format!("Unknown country '{name}' in the {} data.", self.metric.display_name()),
                ));
            }
        }

        let mut totals = vec![0u64; self.dates.len()];
        for (_, counts) in self.by_country.iter().filter(|(c, _)| region.includes(c)) {
            for (total, &count) in totals.iter_mut().zip(counts) {
                *total = total.saturating_add(count);
            }
        }

        let points = self
            .dates
            .iter()
            .zip(totals)
            .map(|(&date, count)| DailyCount { date, count })
            .collect();
        TimeSeries::new(region.label(), points)
    }

    /// Worldwide total on the most recent date.
    pub fn latest_total(&self) -> Option<(NaiveDate, u64)> {
        let date = self.last_date()?;
        let last = self.dates.len() - 1;
        let total = self
            .by_country
            .values()
            .fold(0u64, |acc, counts| acc.saturating_add(counts[last]));
        Some((date, total))
    }
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Strip a UTF-8 BOM on the first header.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

/// Indices and dates of the per-day columns, which must be consecutive days.
fn date_columns(headers: &StringRecord, metric: Metric) -> Result<(Vec<usize>, Vec<NaiveDate>), AppError> {
    let (columns, dates): (Vec<usize>, Vec<NaiveDate>) = headers
        .iter()
        .enumerate()
        .filter_map(|(idx, name)| {
            NaiveDate::parse_from_str(name.trim(), DATE_HEADER_FORMAT)
                .ok()
                .map(|date| (idx, date))
        })
        .unzip();

    if dates.is_empty() {
        return Err(AppError::new(
            4,
            format!("{} CSV has no date columns.", metric.display_name()),
        ));
    }
    for pair in dates.windows(2) {
        if (pair[1] - pair[0]).num_days() != 1 {
            return Err(AppError::new(
                4,
                format!(
                    "{} CSV date columns are not consecutive days ({} followed by {}).",
                    metric.display_name(),
                    pair[0],
                    pair[1]
                ),
            ));
        }
    }
    Ok((columns, dates))
}

fn row_id(record: &StringRecord, country: &str, province_idx: Option<usize>) -> Option<String> {
    let province = province_idx.and_then(|i| record.get(i)).unwrap_or("");
    match (province.is_empty(), country.is_empty()) {
        (true, true) => None,
        (true, false) => Some(country.to_string()),
        (false, _) => Some(format!("{province}, {country}")),
    }
}

/// Parse the per-day cells of a row. Blank cells count as zero.
fn parse_counts(record: &StringRecord, date_columns: &[usize]) -> Result<Vec<u64>, String> {
    date_columns
        .iter()
        .map(|&idx| {
            let raw = record
                .get(idx)
                .ok_or_else(|| format!("row has no value for column {}", idx + 1))?;
            parse_count(raw).ok_or_else(|| format!("invalid count '{raw}' in column {}", idx + 1))
        })
        .collect()
}

fn parse_count(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(0);
    }
    let value: f64 = raw.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some(value.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20
Hubei,China,30.97,112.27,444,444,549
Beijing,China,40.18,116.41,14,22,36
,Italy,41.87,12.56,0,0,2
,Japan,36.2,138.25,2,,3
Bad,Spain,40.4,-3.7,1,x,3
";

    fn table() -> RegionTable {
        parse_jhu_csv(SAMPLE.as_bytes(), Metric::Confirmed).unwrap()
    }

    fn counts(series: &TimeSeries) -> Vec<u64> {
        series.points().iter().map(|p| p.count).collect()
    }

    #[test]
    fn aggregates_provinces_per_country() {
        let table = table();
        assert_eq!(table.dates().len(), 3);
        assert_eq!(table.dates()[0], NaiveDate::from_ymd_opt(2020, 1, 22).unwrap());

        let china = table.series(&Region::Country("china".to_string())).unwrap();
        assert_eq!(counts(&china), vec![458, 466, 585]);
        assert_eq!(china.label(), "china");
    }

    #[test]
    fn excluding_and_global_regions() {
        let table = table();
        let outside = table.series(&Region::Excluding("China".to_string())).unwrap();
        assert_eq!(counts(&outside), vec![2, 0, 5]);
        assert_eq!(outside.label(), "Outside China");

        let global = table.series(&Region::Global).unwrap();
        assert_eq!(counts(&global), vec![460, 466, 590]);
        assert_eq!(table.latest_total(), Some((NaiveDate::from_ymd_opt(2020, 1, 24).unwrap(), 590)));
    }

    #[test]
    fn bad_rows_are_reported_and_skipped() {
        let table = table();
        assert_eq!(table.rows_read, 5);
        assert_eq!(table.rows_used, 4);
        assert_eq!(table.row_errors.len(), 1);
        assert_eq!(table.row_errors[0].line, 6);
        assert_eq!(table.row_errors[0].id.as_deref(), Some("Bad, Spain"));
        assert!(table.countries().all(|c| c != "Spain"));
    }

    #[test]
    fn unknown_country_is_an_error() {
        let err = table().series(&Region::Country("Atlantis".to_string())).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn schema_errors_are_fatal() {
        let no_country = "Province/State,Lat,1/22/20\nX,1.0,3\n";
        assert_eq!(parse_jhu_csv(no_country.as_bytes(), Metric::Deaths).unwrap_err().exit_code(), 4);

        let no_dates = "Province/State,Country/Region,Lat\nX,China,1.0\n";
        assert_eq!(parse_jhu_csv(no_dates.as_bytes(), Metric::Deaths).unwrap_err().exit_code(), 4);

        let gap = "Country/Region,1/22/20,1/24/20\nChina,1,2\n";
        assert_eq!(parse_jhu_csv(gap.as_bytes(), Metric::Deaths).unwrap_err().exit_code(), 4);
    }

    #[test]
    fn negative_counts_are_rejected() {
        assert_eq!(parse_count(""), Some(0));
        assert_eq!(parse_count("12"), Some(12));
        assert_eq!(parse_count("12.0"), Some(12));
        assert_eq!(parse_count("-1"), None);
        assert_eq!(parse_count("nan"), None);
    }
}
