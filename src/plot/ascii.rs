//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - observed values: `o`
//! - fitted history: `-` line
//! - forecast: `*` line
//! - uncertainty band: `:` fill (forecast days only)

use crate::domain::ForecastResult;

/// Render history + forecast of one panel.
pub fn render_forecast_plot(result: &ForecastResult, width: usize, height: usize) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let n_hist = result.history.len();
    let n_total = n_hist + result.forecast.len();
    if n_total == 0 {
        return "Plot: (no points)\n".to_string();
    }
    let x_max = (n_total.max(2) - 1) as f64;

    let (y_min, y_max) = y_range(result).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];
    let cell = |i: usize, y: f64| (map_x(i as f64, 0.0, x_max, width), map_y(y, y_min, y_max, height));

    // Lines first, then the band fills what is left, then observations on top.
    let fitted: Vec<(usize, usize)> = result
        .history
        .iter()
        .enumerate()
        .map(|(i, p)| cell(i, p.value))
        .collect();
    draw_polyline(&mut grid, &fitted, '-');

    let mut projected: Vec<(usize, usize)> = fitted.last().copied().into_iter().collect();
    projected.extend(
        result
            .forecast
            .iter()
            .enumerate()
            .map(|(i, p)| cell(n_hist + i, p.value)),
    );
    draw_polyline(&mut grid, &projected, '*');

    for (i, p) in result.forecast.iter().enumerate() {
        let (x, top) = cell(n_hist + i, p.upper);
        let (_, bottom) = cell(n_hist + i, p.lower);
        for row in grid.iter_mut().take(bottom + 1).skip(top) {
            if row[x] == ' ' {
                row[x] = ':';
            }
        }
    }

    for (i, p) in result.history.iter().enumerate() {
        if let Some(obs) = p.observed {
            let (x, y) = cell(i, obs);
            grid[y][x] = 'o';
        }
    }

    let first = result.history.first().or(result.forecast.first()).map(|p| p.date);
    let last = result.forecast.last().or(result.history.last()).map(|p| p.date);
    let mut out = String::new();
    if let (Some(first), Some(last)) = (first, last) {
        out.push_str(&format!(
            "Plot: {first} .. {last} | y=[{y_min:.2}, {y_max:.2}]\n"
        ));
    }

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn y_range(result: &ForecastResult) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for p in result.history.iter().chain(result.forecast.iter()) {
        for y in [Some(p.value), Some(p.lower), Some(p.upper), p.observed].into_iter().flatten() {
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }

    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_polyline(grid: &mut [Vec<char>], cells: &[(usize, usize)], ch: char) {
    match cells {
        [] => {}
        [(x, y)] => {
            if grid[*y][*x] == ' ' {
                grid[*y][*x] = ch;
            }
        }
        _ => {
            for pair in cells.windows(2) {
                let ((x0, y0), (x1, y1)) = (pair[0], pair[1]);
                draw_line(grid, x0, y0, x1, y1, ch);
            }
        }
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DatedPoint, Family, FitDiagnostics, ForecastTarget};
    use chrono::{NaiveDate, Utc};

    fn point(d: u32, observed: Option<f64>, value: f64) -> DatedPoint {
        DatedPoint {
            date: NaiveDate::from_ymd_opt(2020, 3, d).unwrap(),
            observed,
            value,
            lower: value,
            upper: value,
        }
    }

    fn result(history: Vec<DatedPoint>, forecast: Vec<DatedPoint>) -> ForecastResult {
        ForecastResult {
            label: "X".to_string(),
            target: ForecastTarget::NewCases,
            generated_at: Utc::now(),
            history,
            forecast,
            diagnostics: FitDiagnostics {
                family: Family::Poisson,
                lambda: 1.0,
                edf: 2.0,
                gcv: 0.0,
                scale: 0.0,
                iterations: 1,
                confidence: 0.95,
                degenerate: false,
            },
        }
    }

    #[test]
    fn plot_golden_snapshot_small() {
        let r = result(
            vec![
                point(1, Some(0.0), 0.0),
                point(2, Some(5.0), 5.0),
                point(3, Some(10.0), 10.0),
            ],
            vec![point(4, None, 15.0)],
        );

        let txt = render_forecast_plot(&r, 10, 5);
        let expected = concat!(
            "Plot: 2020-03-01 .. 2020-03-04 | y=[-0.75, 15.75]\n",
            "        **\n",
            "      o*  \n",
            "    --    \n",
            "  -o      \n",
            "o-        \n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn band_is_drawn_around_the_forecast() {
        let mut forecast = point(3, None, 10.0);
        forecast.lower = 0.0;
        forecast.upper = 20.0;
        let r = result(vec![point(1, Some(10.0), 10.0), point(2, Some(10.0), 10.0)], vec![forecast]);

        let txt = render_forecast_plot(&r, 10, 5);
        let last_col: String = txt.lines().skip(1).map(|l| l.chars().last().unwrap()).collect();
        assert_eq!(last_col, "::*::");
    }

    #[test]
    fn empty_result_does_not_panic() {
        assert_eq!(render_forecast_plot(&result(Vec::new(), Vec::new()), 10, 5), "Plot: (no points)\n");
    }
}
