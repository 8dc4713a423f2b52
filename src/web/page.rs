//! HTML rendering.
//!
//! The page is a single self-contained document: inline CSS, inline SVG
//! charts, no client-side script. Every piece of dynamic text goes through
//! `escape_html`.

use std::fmt::Write;

use crate::domain::{LatestTotals, NewsItem};
use crate::error::AppError;
use crate::report::{fmt_optional_count, fmt_rate, group_thousands};
use crate::web::chart::{ChartData, FORECAST_CONTEXT_DAYS};
use crate::web::dashboard::{DashboardView, PanelView};
use crate::web::state::NewsSection;

pub const PAGE_TITLE: &str = "COVID-19 Update";

const CHART_WIDTH: u32 = 520;
const CHART_HEIGHT: u32 = 300;

const STYLE: &str = "\
body{background:#041C7C;color:#7FDBFF;font-family:sans-serif;margin:0;padding:16px}\
h1{color:#f7370E;text-align:center;margin:4px 0}\
.updated{text-align:center;margin:0 0 16px}\
.grid{display:flex;flex-wrap:wrap;gap:16px}\
.column{flex:1 1 520px;min-width:320px}\
.side{flex:0 1 360px}\
h2{color:#f7370E;border-bottom:1px solid #7FDBFF;padding-bottom:4px}\
.chart svg{max-width:100%;height:auto;display:block;margin-bottom:8px}\
.notice{border:1px solid #f7370E;padding:8px;margin:8px 0}\
table{border-collapse:collapse;width:100%}\
td,th{border-bottom:1px solid #7FDBFF;padding:6px;text-align:left}\
td.num{text-align:right}\
a{color:#FFFFFF}\
li{margin-bottom:8px}\
small{color:#9fb7d9}";

/// Escape text for use in HTML content and quoted attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Full dashboard page.
pub fn render_dashboard(view: &DashboardView) -> String {
    let mut body = String::new();

    let updated = view
        .data_date
        .map(|d| d.format("%B %d, %Y").to_string())
        .unwrap_or_else(|| "n/a".to_string());
    let _ = write!(
        body,
        "<h1>{PAGE_TITLE}</h1><p class=\"updated\">Last Updated on {} <small>(rendered {})</small></p>",
        escape_html(&updated),
        view.generated_at.format("%Y-%m-%d %H:%M UTC"),
    );

    body.push_str("<div class=\"grid\">");
    for panel in &view.panels {
        body.push_str(&render_panel(panel, view));
    }

    body.push_str("<div class=\"column side\">");
    body.push_str("<h2>Data <small>(source: Johns Hopkins)</small></h2>");
    body.push_str(&render_totals(view.totals.as_ref()));
    body.push_str("<h2>News <small>(source: newsapi.org)</small></h2>");
    body.push_str(&render_news(&view.news));
    body.push_str("</div></div>");

    document(PAGE_TITLE, &body)
}

/// Page shown when the dataset cannot be loaded at all.
pub fn render_error_page(err: &AppError) -> String {
    let body = format!(
        "<h1>{PAGE_TITLE}</h1><div class=\"notice\"><p>The case data could not be loaded right now.</p><p><small>{}</small></p></div>",
        escape_html(err.message())
    );
    document(PAGE_TITLE, &body)
}

fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
<title>{}</title><style>{STYLE}</style></head><body>{body}</body></html>",
        escape_html(title)
    )
}

fn render_panel(panel: &PanelView, view: &DashboardView) -> String {
    let mut out = String::new();
    let _ = write!(out, "<div class=\"column\"><h2>{}</h2>", escape_html(&panel.label));

    if let Some(observed) = &panel.observed {
        out.push_str(&chart_or_notice(&ChartData::cumulative(observed)));
    }

    match &panel.forecast {
        Ok(result) => {
            out.push_str(&chart_or_notice(&ChartData::forecast(result, FORECAST_CONTEXT_DAYS)));
            let d = &result.diagnostics;
            let _ = write!(
                out,
                "<p><small>{} forecast, {:.0}% band, {}</small></p>",
                escape_html(view.target.display_name()),
                100.0 * d.confidence,
                if d.degenerate {
                    "no cases in range".to_string()
                } else {
                    format!("{} fit, edf {:.1}", escape_html(d.family.display_name()), d.edf)
                },
            );
        }
        Err(message) => {
            let _ = write!(
                out,
                "<div class=\"notice\"><p>Forecast unavailable for the next {} days.</p><p><small>{}</small></p></div>",
                view.horizon_days,
                escape_html(message)
            );
        }
    }

    out.push_str("</div>");
    out
}

fn chart_or_notice(chart: &ChartData) -> String {
    match chart.render_svg(CHART_WIDTH, CHART_HEIGHT) {
        Ok(svg) => format!("<div class=\"chart\">{svg}</div>"),
        Err(err) => {
            tracing::warn!(error = %err, "chart rendering failed");
            format!("<div class=\"notice\">{}</div>", escape_html(err.message()))
        }
    }
}

fn render_totals(totals: Option<&LatestTotals>) -> String {
    let Some(t) = totals else {
        return "<div class=\"notice\">Totals are not available.</div>".to_string();
    };
    let rows = [
        ("Confirmed", group_thousands(t.confirmed)),
        ("Recovered", fmt_optional_count(t.recovered)),
        ("Deceased", fmt_optional_count(t.deceased)),
        ("Recovery Rate", fmt_rate(t.recovery_rate)),
    ];

    let mut out = String::from("<table><tbody>");
    for (name, value) in rows {
        let _ = write!(out, "<tr><th>{name}</th><td class=\"num\">{}</td></tr>", escape_html(&value));
    }
    let _ = write!(out, "</tbody></table><p><small>as of {}</small></p>", t.date);
    out
}

fn render_news(news: &NewsSection) -> String {
    match news {
        NewsSection::Disabled => {
            "<div class=\"notice\">News is disabled: no NEWS_API_KEY configured.</div>".to_string()
        }
        NewsSection::Unavailable(message) => format!(
            "<div class=\"notice\">News is unavailable right now. <small>{}</small></div>",
            escape_html(message)
        ),
        NewsSection::Headlines(items) if items.is_empty() => {
            "<div class=\"notice\">No headlines found.</div>".to_string()
        }
        NewsSection::Headlines(items) => {
            let mut out = String::from("<ol>");
            for item in items.iter() {
                out.push_str(&render_headline(item));
            }
            out.push_str("</ol>");
            out
        }
    }
}

fn render_headline(item: &NewsItem) -> String {
    let source = if item.source.is_empty() {
        String::new()
    } else {
        format!(" <small>{}</small>", escape_html(&item.source))
    };
    format!(
        "<li><a href=\"{}\" target=\"_blank\" rel=\"noopener noreferrer\">{}</a>{source}</li>",
        escape_html(&item.url),
        escape_html(&item.headline)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DailyCount, ForecastTarget, TimeSeries};
    use chrono::{NaiveDate, Utc};
    use std::sync::Arc;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, d).unwrap()
    }

    fn view(panels: Vec<PanelView>, news: NewsSection) -> DashboardView {
        DashboardView {
            generated_at: Utc::now(),
            data_date: Some(date(20)),
            horizon_days: 7,
            target: ForecastTarget::NewCases,
            panels,
            totals: Some(LatestTotals::new(date(20), 1_234_567, Some(200), Some(100))),
            news,
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn dashboard_has_header_totals_and_news_notice() {
        let html = render_dashboard(&view(Vec::new(), NewsSection::Disabled));
        assert!(html.contains("<title>COVID-19 Update</title>"));
        assert!(html.contains("Last Updated on March 20, 2020"));
        assert!(html.contains("1,234,567"));
        assert!(html.contains("66.67%"));
        assert!(html.contains("(source: Johns Hopkins)"));
        assert!(html.contains("no NEWS_API_KEY configured"));
    }

    #[test]
    fn failed_forecast_shows_a_message_next_to_the_chart() {
        let observed = TimeSeries::new(
            "Outside <China>",
            (1..=5).map(|d| DailyCount { date: date(d), count: u64::from(d) }).collect(),
        )
        .unwrap();
        let panel = PanelView {
            label: "Outside <China>".to_string(),
            observed: Some(observed),
            forecast: Err("Insufficient data: need at least 14 daily observations, got 4.".to_string()),
        };
        let html = render_dashboard(&view(vec![panel], NewsSection::Disabled));
        assert!(html.contains("Outside &lt;China&gt;"));
        assert!(html.contains("<svg"));
        assert!(html.contains("Forecast unavailable for the next 7 days."));
        assert!(html.contains("need at least 14"));
    }

    #[test]
    fn headlines_are_links() {
        let items = vec![NewsItem {
            headline: "Cases & deaths".to_string(),
            source: "Reuters".to_string(),
            url: "https://example.com/?a=1&b=2".to_string(),
            published_at: None,
        }];
        let html = render_news(&NewsSection::Headlines(Arc::new(items)));
        assert!(html.contains("href=\"https://example.com/?a=1&amp;b=2\""));
        assert!(html.contains(">Cases &amp; deaths</a>"));

        let html = render_news(&NewsSection::Unavailable("rate limited".to_string()));
        assert!(html.contains("unavailable"));
    }

    #[test]
    fn error_page_carries_the_reason() {
        let html = render_error_page(&AppError::new(4, "JHU request failed: timeout"));
        assert!(html.contains("could not be loaded"));
        assert!(html.contains("JHU request failed: timeout"));
    }
}
