//! Grouped bar charts and their SVG rendering.
//!
//! A [`BarChart`] is a plain description of what to draw: positioned bars per series,
//! shaded value bands, an optional horizontal reference line and a y-axis tick
//! increment. Building the model is where all report logic lives; [`BarChart::to_svg`]
//! only maps it onto pixels.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::error::ReportError;

/// Upper bound on drawn y ticks; finer increments are coarsened by whole multiples.
const MAX_Y_TICKS: usize = 60;

const MARGIN_LEFT: f64 = 110.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_TOP: f64 = 70.0;
const MARGIN_BOTTOM: f64 = 90.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    /// Index of the case group this bar belongs to.
    pub group: usize,
    /// Center of the bar in axis units.
    pub x: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub id: String,
    pub label: String,
    pub color: String,
    pub bars: Vec<Bar>,
}

impl Series {
    pub fn value_for_group(&self, group: usize) -> Option<f64> {
        self.bars.iter().find(|b| b.group == group).map(|b| b.value)
    }
}

/// Horizontal band between two y values.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub from: f64,
    pub to: f64,
    pub color: String,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    pub title: String,
    pub y_label: String,
    pub group_labels: Vec<String>,
    /// X position of each group label.
    pub group_ticks: Vec<f64>,
    pub bar_width: f64,
    pub series: Vec<Series>,
    pub tick_increment: f64,
    pub spans: Vec<Span>,
    pub reference_line: Option<f64>,
    pub width: u32,
    pub height: u32,
}

impl BarChart {
    pub fn bar_count(&self) -> usize {
        self.series.iter().map(|s| s.bars.len()).sum()
    }

    pub fn series(&self, id: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.id == id)
    }

    /// Smallest and largest y that must be visible, always including zero.
    pub fn value_range(&self) -> (f64, f64) {
        let mut lo: f64 = 0.0;
        let mut hi: f64 = 0.0;
        let values = self
            .series
            .iter()
            .flat_map(|s| s.bars.iter().map(|b| b.value))
            .chain(self.spans.iter().flat_map(|s| [s.from, s.to]))
            .chain(self.reference_line);
        for v in values.filter(|v| v.is_finite()) {
            lo = lo.min(v);
            hi = hi.max(v);
        }
        (lo, hi)
    }

    /// Y tick values: multiples of the tick increment covering the value range.
    pub fn y_ticks(&self) -> Vec<f64> {
        let (lo, hi) = self.value_range();
        let base = if self.tick_increment > 0.0 && self.tick_increment.is_finite() {
            self.tick_increment
        } else {
            1.0
        };

        let mut step = base;
        let mut first = (lo / step).floor() as i64;
        let mut last = (hi / step).ceil() as i64;
        let mut factor = 1.0;
        while (last - first) as usize + 1 > MAX_Y_TICKS {
            factor += 1.0;
            step = base * factor;
            first = (lo / step).floor() as i64;
            last = (hi / step).ceil() as i64;
        }
        (first..=last).map(|k| k as f64 * step).collect()
    }

    fn x_range(&self) -> (f64, f64) {
        let xs: Vec<f64> = self
            .series
            .iter()
            .flat_map(|s| s.bars.iter().map(|b| b.x))
            .chain(self.group_ticks.iter().copied())
            .collect();
        let lo = xs.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if lo.is_finite() && hi.is_finite() {
            (lo - self.bar_width * 2.0, hi + self.bar_width * 2.0)
        } else {
            (0.0, 1.0)
        }
    }

    pub fn to_svg(&self) -> Result<String, std::fmt::Error> {
        let w = self.width as f64;
        let h = self.height as f64;
        let plot_w = w - MARGIN_LEFT - MARGIN_RIGHT;
        let plot_h = h - MARGIN_TOP - MARGIN_BOTTOM;

        let ticks = self.y_ticks();
        let y_lo = ticks.first().copied().unwrap_or(0.0);
        let mut y_hi = ticks.last().copied().unwrap_or(1.0);
        if y_hi <= y_lo {
            y_hi = y_lo + 1.0;
        }
        let (x_lo, x_hi) = self.x_range();

        let px = |x: f64| MARGIN_LEFT + (x - x_lo) / (x_hi - x_lo) * plot_w;
        let py = |y: f64| MARGIN_TOP + (y_hi - y) / (y_hi - y_lo) * plot_h;
        let bar_px = self.bar_width / (x_hi - x_lo) * plot_w;

        let mut s = String::new();
        writeln!(
            s,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}" font-family="sans-serif">"#,
            self.width, self.height, self.width, self.height
        )?;
        writeln!(s, r#"<rect width="100%" height="100%" fill="white"/>"#)?;
        writeln!(
            s,
            r#"<text x="{:.1}" y="{:.1}" font-size="28" text-anchor="middle">{}</text>"#,
            w / 2.0,
            MARGIN_TOP / 2.0 + 10.0,
            escape(&self.title)
        )?;

        for span in &self.spans {
            let (top, bottom) = (py(span.from.max(span.to)), py(span.from.min(span.to)));
            writeln!(
                s,
                r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="{}" fill-opacity="{}"/>"#,
                MARGIN_LEFT,
                top,
                plot_w,
                (bottom - top).max(0.0),
                escape(&span.color),
                span.opacity
            )?;
        }

        for t in &ticks {
            let y = py(*t);
            writeln!(
                s,
                r##"<line x1="{:.1}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="#dddddd" stroke-width="1"/>"##,
                MARGIN_LEFT,
                MARGIN_LEFT + plot_w
            )?;
            writeln!(
                s,
                r#"<text x="{:.1}" y="{:.1}" font-size="16" text-anchor="end">{}</text>"#,
                MARGIN_LEFT - 8.0,
                y + 5.0,
                format_tick(*t, self.tick_increment)
            )?;
        }

        for series in &self.series {
            for bar in &series.bars {
                let (top, bottom) = (py(bar.value.max(0.0)), py(bar.value.min(0.0)));
                writeln!(
                    s,
                    r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}"><title>{}: {}</title></rect>"#,
                    px(bar.x) - bar_px / 2.0,
                    top,
                    bar_px,
                    (bottom - top).max(0.0),
                    escape(&series.color),
                    escape(&series.label),
                    bar.value
                )?;
            }
        }

        if let Some(y) = self.reference_line {
            writeln!(
                s,
                r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="red" stroke-width="2" stroke-dasharray="10,6"/>"#,
                MARGIN_LEFT,
                py(y),
                MARGIN_LEFT + plot_w,
                py(y)
            )?;
        }

        writeln!(
            s,
            r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="black"/>"#,
            MARGIN_LEFT,
            MARGIN_TOP,
            MARGIN_LEFT,
            MARGIN_TOP + plot_h
        )?;
        for (label, x) in self.group_labels.iter().zip(&self.group_ticks) {
            writeln!(
                s,
                r#"<text x="{:.1}" y="{:.1}" font-size="18" text-anchor="middle">{}</text>"#,
                px(*x),
                MARGIN_TOP + plot_h + 30.0,
                escape(label)
            )?;
        }
        writeln!(
            s,
            r#"<text x="30" y="{:.1}" font-size="18" text-anchor="middle" transform="rotate(-90 30 {:.1})">{}</text>"#,
            MARGIN_TOP + plot_h / 2.0,
            MARGIN_TOP + plot_h / 2.0,
            escape(&self.y_label)
        )?;

        for (i, series) in self.series.iter().enumerate() {
            let y = MARGIN_TOP + 20.0 + i as f64 * 26.0;
            let x = MARGIN_LEFT + plot_w - 260.0;
            writeln!(
                s,
                r#"<rect x="{:.1}" y="{:.1}" width="18" height="18" fill="{}"/>"#,
                x,
                y - 14.0,
                escape(&series.color)
            )?;
            writeln!(
                s,
                r#"<text x="{:.1}" y="{:.1}" font-size="18">{}</text>"#,
                x + 26.0,
                y,
                escape(&series.label)
            )?;
        }

        writeln!(s, "</svg>")?;
        Ok(s)
    }

    pub fn save(&self, path: &Path) -> Result<(), ReportError> {
        let svg = self.to_svg()?;
        fs::write(path, svg)?;
        Ok(())
    }
}

fn format_tick(value: f64, increment: f64) -> String {
    let decimals = if increment >= 1.0 || increment <= 0.0 {
        0
    } else {
        (-increment.log10()).ceil() as usize + 1
    };
    format!("{:.*}", decimals, value)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
