//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - input selection enums (`Region`, `Metric`, `ForecastTarget`, `Family`)
//! - validated series (`TimeSeries`, `DerivedSeries`)
//! - engine inputs/outputs (`Observation`, `FitAndForecast`, `ForecastResult`)
//! - dashboard side data (`LatestTotals`, `NewsItem`)

pub mod types;

pub use types::*;
