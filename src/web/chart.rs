//! Plotters-powered SVG charts for the dashboard.
//!
//! Charts are data-driven: `ChartData` is computed from domain types outside
//! the render call, and `render_svg` only draws. The SVG string is inlined
//! into the page, so the dashboard needs no static assets or client script.

use chrono::{Days, NaiveDate};
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;

use crate::domain::{ForecastResult, TimeSeries};
use crate::error::AppError;

/// History shown in front of a forecast.
pub const FORECAST_CONTEXT_DAYS: usize = 60;

const BACKGROUND: RGBColor = RGBColor(4, 28, 124);
const TEXT: RGBColor = RGBColor(127, 219, 255);
const OBSERVED: RGBColor = RGBColor(247, 55, 14);
const FITTED: RGBColor = RGBColor(255, 255, 255);
const FORECAST: RGBColor = RGBColor(255, 215, 0);

type DrawResult = Result<(), DrawingAreaErrorKind<std::io::Error>>;

/// A render-only chart description. X values are days since `origin`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub title: String,
    pub origin: NaiveDate,
    pub observed: Vec<(f64, f64)>,
    /// Draw observations as a line instead of dots.
    pub observed_as_line: bool,
    pub fitted: Vec<(f64, f64)>,
    pub forecast: Vec<(f64, f64)>,
    /// `(x, lower, upper)` of the uncertainty band.
    pub band: Vec<(f64, f64, f64)>,
}

impl ChartData {
    /// Cumulative confirmed cases.
    pub fn cumulative(series: &TimeSeries) -> Self {
        let observed = series
            .points()
            .iter()
            .enumerate()
            .map(|(i, p)| (i as f64, p.count as f64))
            .collect();
        Self {
            title: "Confirmed cases".to_string(),
            origin: series.first_date(),
            observed,
            observed_as_line: true,
            fitted: Vec::new(),
            forecast: Vec::new(),
            band: Vec::new(),
        }
    }

    /// Recent history, fitted smooth and the projection with its band.
    pub fn forecast(result: &ForecastResult, context_days: usize) -> Self {
        let skip = result.history.len().saturating_sub(context_days);
        let history = &result.history[skip..];
        let origin = history
            .first()
            .or(result.forecast.first())
            .map(|p| p.date)
            .unwrap_or_else(|| result.generated_at.date_naive());
        let x_of = |date: NaiveDate| (date - origin).num_days() as f64;

        let observed = history
            .iter()
            .filter_map(|p| p.observed.map(|v| (x_of(p.date), v)))
            .collect();
        let fitted: Vec<(f64, f64)> = history.iter().map(|p| (x_of(p.date), p.value)).collect();
        // Start the projection at the last fitted value so the lines join.
        let forecast = fitted
            .last()
            .copied()
            .into_iter()
            .chain(result.forecast.iter().map(|p| (x_of(p.date), p.value)))
            .collect();
        let band = result
            .forecast
            .iter()
            .map(|p| (x_of(p.date), p.lower, p.upper))
            .collect();

        Self {
            title: format!("Forecast: next {} days", result.forecast.len()),
            origin,
            observed,
            observed_as_line: false,
            fitted,
            forecast,
            band,
        }
    }

    /// Axis bounds; y always starts at zero.
    pub fn bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        let xs = self
            .observed
            .iter()
            .chain(&self.fitted)
            .chain(&self.forecast)
            .map(|p| p.0)
            .chain(self.band.iter().map(|b| b.0));
        let x_max = xs.fold(f64::NEG_INFINITY, f64::max);
        if !x_max.is_finite() {
            return None;
        }

        let ys = self
            .observed
            .iter()
            .chain(&self.fitted)
            .chain(&self.forecast)
            .map(|p| p.1)
            .chain(self.band.iter().map(|b| b.2));
        let y_max = ys.filter(|y| y.is_finite()).fold(0.0_f64, f64::max);

        let x1 = if x_max > 0.0 { x_max } else { 1.0 };
        let y1 = if y_max > 0.0 { y_max * 1.05 } else { 1.0 };
        Some(([0.0, x1], [0.0, y1]))
    }

    pub fn render_svg(&self, width: u32, height: u32) -> Result<String, AppError> {
        let (x, y) = self
            .bounds()
            .ok_or_else(|| AppError::new(4, format!("Chart '{}' has no data.", self.title)))?;
        let fail = |e: DrawingAreaErrorKind<std::io::Error>| {
            AppError::new(4, format!("Failed to render chart '{}': {e}", self.title))
        };

        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
            self.draw(&root, x, y).map_err(fail)?;
            root.present().map_err(fail)?;
        }
        Ok(svg)
    }

    fn draw(&self, root: &DrawingArea<SVGBackend<'_>, Shift>, x: [f64; 2], y: [f64; 2]) -> DrawResult {
        root.fill(&BACKGROUND)?;

        let origin = self.origin;
        let mut chart = ChartBuilder::on(root)
            .caption(&self.title, ("sans-serif", 16).into_font().color(&TEXT))
            .margin(8)
            .x_label_area_size(28)
            .y_label_area_size(56)
            .build_cartesian_2d(x[0]..x[1], y[0]..y[1])?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .disable_y_mesh()
            .x_labels(5)
            .y_labels(5)
            .x_label_formatter(&|v| date_label(origin, *v))
            .y_label_formatter(&|v| compact_count(*v))
            .label_style(("sans-serif", 11).into_font().color(&TEXT))
            .axis_style(&TEXT)
            .draw()?;

        if !self.band.is_empty() {
            let mut outline: Vec<(f64, f64)> = self.band.iter().map(|&(x, _, hi)| (x, hi)).collect();
            outline.extend(self.band.iter().rev().map(|&(x, lo, _)| (x, lo)));
            chart.draw_series(std::iter::once(Polygon::new(outline, FORECAST.mix(0.3).filled())))?;
        }

        if self.observed_as_line {
            chart.draw_series(LineSeries::new(self.observed.iter().copied(), OBSERVED.stroke_width(2)))?;
        } else {
            chart.draw_series(
                self.observed
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 2, OBSERVED.filled())),
            )?;
        }

        if !self.fitted.is_empty() {
            chart.draw_series(LineSeries::new(self.fitted.iter().copied(), FITTED.stroke_width(2)))?;
        }
        if !self.forecast.is_empty() {
            chart.draw_series(LineSeries::new(self.forecast.iter().copied(), FORECAST.stroke_width(2)))?;
        }

        Ok(())
    }
}

fn date_label(origin: NaiveDate, x: f64) -> String {
    let offset = x.round().max(0.0) as u64;
    origin
        .checked_add_days(Days::new(offset))
        .map(|d| d.format("%b %d").to_string())
        .unwrap_or_default()
}

/// `1234` -> `1.2k`, `2500000` -> `2.5M`.
pub fn compact_count(v: f64) -> String {
    let a = v.abs();
    if a >= 1e6 {
        format!("{:.1}M", v / 1e6)
    } else if a >= 1e3 {
        format!("{:.1}k", v / 1e3)
    } else {
        format!("{v:.0}")
    }
}
