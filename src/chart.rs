//! SVG charts
//!
//! Traced run: close with the trailing range and the stop / go / bad levels,
//! buy markers in green and sell markers in red, balance underneath.
//! Segments: candlesticks with the bull / bear / bull spans drawn as bands
//! just above the lowest low.

use anyhow::{bail, Context, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::segments::MarketSegments;
use crate::{Point, PriceSeries, RunResult, StrategyParams, Trace};

const WIDTH: f64 = 1200.0;
const PRICE_HEIGHT: f64 = 420.0;
const BALANCE_HEIGHT: f64 = 180.0;
const PADDING: f64 = 50.0;
const SEGMENTS_HEIGHT: f64 = 560.0;

/// `results-bw{buy}-sw{sell}-s{stop}-g{go}-b{bad}.svg`
pub fn chart_filename(params: &StrategyParams) -> String {
    format!(
        "results-bw{}-sw{}-s{}-g{}-b{}.svg",
        params.buy_window,
        params.sell_window,
        params.stop_percentage,
        params.go_percentage,
        params.bad_percentage
    )
}

/// Maps `(bar, value)` samples into one plot panel
struct Panel {
    top: f64,
    height: f64,
    first_bar: usize,
    scale_x: f64,
    min: f64,
    scale_y: f64,
}

impl Panel {
    fn new(top: f64, height: f64, bars: (usize, usize), series: &[&[Point]]) -> Self {
        let (min, max) = series
            .iter()
            .flat_map(|s| s.iter())
            .map(|&(_, v)| v)
            .filter(|v| v.is_finite() && *v > 0.0)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        let (min, max) = if min.is_finite() { (min, max) } else { (0.0, 1.0) };

        let plot_width = WIDTH - 2.0 * PADDING;
        let range = max - min;
        let span = bars.1.saturating_sub(bars.0);
        Panel {
            top,
            height,
            first_bar: bars.0,
            scale_x: if span > 0 {
                plot_width / span as f64
            } else {
                0.0
            },
            min,
            scale_y: if range > 0.0 { height / range } else { 1.0 },
        }
    }

    fn x(&self, bar: usize) -> f64 {
        PADDING + bar.saturating_sub(self.first_bar) as f64 * self.scale_x
    }

    fn y(&self, value: f64) -> f64 {
        self.top + self.height - (value - self.min) * self.scale_y
    }

    /// Polyline of the positive samples; unset levels (0) are skipped
    fn polyline(&self, out: &mut String, points: &[Point], color: &str, width: f64) {
        let coords: Vec<String> = points
            .iter()
            .filter(|&&(_, v)| v.is_finite() && v > 0.0)
            .map(|&(bar, v)| format!("{:.1},{:.1}", self.x(bar), self.y(v)))
            .collect();
        if coords.is_empty() {
            return;
        }
        let _ = writeln!(
            out,
            r#"<polyline fill="none" stroke="{}" stroke-width="{}" points="{}"/>"#,
            color,
            width,
            coords.join(" ")
        );
    }

    fn markers(&self, out: &mut String, points: &[Point], color: &str) {
        for &(bar, v) in points {
            let _ = writeln!(
                out,
                r#"<circle cx="{:.1}" cy="{:.1}" r="4" fill="{}"/>"#,
                self.x(bar),
                self.y(v),
                color
            );
        }
    }
}

/// Render the trace of `result` as an SVG document
pub fn render_svg(result: &RunResult) -> Result<String> {
    let Some(trace) = result.trace.as_ref() else {
        bail!("run has no trace to chart");
    };
    if trace.close.is_empty() {
        bail!("trace is empty");
    }

    let bars = bar_span(trace);
    let price = Panel::new(
        PADDING,
        PRICE_HEIGHT,
        bars,
        &[
            trace.close.as_slice(),
            trace.min_range.as_slice(),
            trace.max_range.as_slice(),
            trace.stop_price.as_slice(),
            trace.go_price.as_slice(),
            trace.bad_price.as_slice(),
        ],
    );
    let balance_top = PADDING * 2.0 + PRICE_HEIGHT;
    let balance = Panel::new(balance_top, BALANCE_HEIGHT, bars, &[trace.balance.as_slice()]);
    let total_height = balance_top + BALANCE_HEIGHT + PADDING;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{0}" height="{1}" viewBox="0 0 {0} {1}">"#,
        WIDTH, total_height
    );
    svg.push_str("<rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" font-family="sans-serif" font-size="14">{} | final cash {:.2} | trades {}</text>"#,
        PADDING,
        PADDING / 2.0,
        chart_title(&result.params),
        result.final_cash,
        result.trades
    );

    price.polyline(&mut svg, &trace.min_range, "#9e9e9e", 1.0);
    price.polyline(&mut svg, &trace.max_range, "#616161", 1.0);
    price.polyline(&mut svg, &trace.stop_price, "#ff9800", 1.0);
    price.polyline(&mut svg, &trace.go_price, "#9c27b0", 1.0);
    price.polyline(&mut svg, &trace.bad_price, "#795548", 1.0);
    price.polyline(&mut svg, &trace.close, "#1565c0", 1.5);
    price.markers(&mut svg, &trace.buy_signals, "green");
    price.markers(&mut svg, &trace.sell_signals, "red");

    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" font-family="sans-serif" font-size="12">balance</text>"#,
        PADDING,
        balance_top - 8.0
    );
    balance.polyline(&mut svg, &trace.balance, "#2e7d32", 1.5);

    svg.push_str("</svg>\n");
    Ok(svg)
}

/// Write the chart into `dir` and return its path
pub fn write_chart(dir: impl AsRef<Path>, result: &RunResult) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let svg = render_svg(result)?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    let path = dir.join(chart_filename(&result.params));
    std::fs::write(&path, svg)
        .with_context(|| format!("Failed to write chart {}", path.display()))?;
    Ok(path)
}

/// Render the series as candlesticks with its three market segments
pub fn render_segments_svg(series: &PriceSeries, segments: &MarketSegments) -> Result<String> {
    if series.is_empty() {
        bail!("series is empty");
    }
    let bars = series.bars();
    let highs: Vec<Point> = bars.iter().map(|b| (b.index, b.high)).collect();
    let lows: Vec<Point> = bars.iter().map(|b| (b.index, b.low)).collect();
    let panel = Panel::new(
        PADDING,
        SEGMENTS_HEIGHT,
        (0, segments.last),
        &[highs.as_slice(), lows.as_slice()],
    );
    let total_height = SEGMENTS_HEIGHT + 2.0 * PADDING;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{0}" height="{1}" viewBox="0 0 {0} {1}">"#,
        WIDTH, total_height
    );
    svg.push_str("<rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");
    let _ = writeln!(
        svg,
        r#"<text x="{}" y="{}" font-family="sans-serif" font-size="14">OHLC with bull / bear / bull segments</text>"#,
        PADDING,
        PADDING / 2.0
    );

    let body_width = (panel.scale_x * 0.6).max(1.0);
    for bar in bars {
        let color = if bar.close >= bar.open { "#26a69a" } else { "#ef5350" };
        let x = panel.x(bar.index);
        let _ = writeln!(
            svg,
            r#"<line x1="{0:.1}" y1="{1:.1}" x2="{0:.1}" y2="{2:.1}" stroke="{3}"/>"#,
            x,
            panel.y(bar.high),
            panel.y(bar.low),
            color
        );
        let (top, bottom) = (
            panel.y(bar.open.max(bar.close)),
            panel.y(bar.open.min(bar.close)),
        );
        let _ = writeln!(
            svg,
            r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}"/>"#,
            x - body_width / 2.0,
            top,
            body_width,
            (bottom - top).max(1.0),
            color
        );
    }

    let band_y = panel.y(panel.min) - 0.02 * panel.height;
    let spans = [
        ("Bull Market #1", 0, segments.bull_end, "skyblue"),
        ("Bear Market", segments.bull_end, segments.bear_end, "orange"),
        ("Bull Market #2", segments.bear_end, segments.last, "skyblue"),
    ];
    for (label, start, end, color) in spans {
        let (x0, x1) = (panel.x(start), panel.x(end));
        let _ = writeln!(
            svg,
            r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{}" stroke-width="6"/>"#,
            x0, band_y, x1, band_y, color
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.1}" y="{:.1}" font-family="sans-serif" font-size="12">{}</text>"#,
            x0 + 4.0,
            band_y - 8.0,
            label
        );
    }

    svg.push_str("</svg>\n");
    Ok(svg)
}

/// Write the segments chart to `path`, creating its directory if needed
pub fn write_segments_chart(
    path: impl AsRef<Path>,
    series: &PriceSeries,
    segments: &MarketSegments,
) -> Result<()> {
    let path = path.as_ref();
    let svg = render_segments_svg(series, segments)?;
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }
    std::fs::write(path, svg)
        .with_context(|| format!("Failed to write chart {}", path.display()))?;
    Ok(())
}

fn chart_title(params: &StrategyParams) -> String {
    format!(
        "buy window {} / sell window {} / stop {} / go {} / bad {}",
        params.buy_window,
        params.sell_window,
        params.stop_percentage,
        params.go_percentage,
        params.bad_percentage
    )
}

fn bar_span(trace: &Trace) -> (usize, usize) {
    let first = trace.close.first().map(|p| p.0).unwrap_or(0);
    let last = trace.close.last().map(|p| p.0).unwrap_or(first);
    (first, last)
}
