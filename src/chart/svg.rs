use super::{Chart, ChartKind, ChartRenderer, Series};
use crate::core::error::Result;
use std::fmt::Write as _;
use std::path::Path;

const PALETTE: &[&str] = &[
    "#440154", "#3b528b", "#21918c", "#5ec962", "#fde725", "#e45756", "#f58518", "#b279a2",
    "#9d755d", "#54a24b",
];

const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 220.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 70.0;
const Y_TICKS: usize = 5;
const MAX_X_LABELS: usize = 24;

/// Renders charts as standalone SVG documents.
#[derive(Debug, Clone, Copy)]
pub struct SvgRenderer {
    pub width: u32,
    pub height: u32,
}

impl Default for SvgRenderer {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
        }
    }
}

impl ChartRenderer for SvgRenderer {
    fn render(&self, chart: &Chart, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            crate::util::fs::ensure_dir_exists(parent)?;
        }
        std::fs::write(path, self.to_svg(chart))?;
        tracing::debug!(path = %path.display(), "rendered chart");
        Ok(())
    }

    fn extension(&self) -> &str {
        "svg"
    }
}

/// Maps data coordinates into the plot area.
struct Frame {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    slots: usize,
    y_max: f64,
    x_range: Option<(f64, f64)>,
}

impl Frame {
    fn slot_width(&self) -> f64 {
        self.width / self.slots.max(1) as f64
    }

    fn x_center(&self, i: usize) -> f64 {
        self.left + self.slot_width() * (i as f64 + 0.5)
    }

    /// Position of an explicit x value; a single distinct x sits mid-axis.
    fn x_at(&self, x: f64) -> f64 {
        match self.x_range {
            Some((lo, hi)) if hi > lo => {
                let inset = self.width * 0.05;
                self.left + inset + (x - lo) / (hi - lo) * (self.width - 2.0 * inset)
            }
            _ => self.left + self.width / 2.0,
        }
    }

    fn point_x(&self, series: &Series, i: usize) -> f64 {
        match series.x.get(i) {
            Some(&x) if self.x_range.is_some() => self.x_at(x),
            _ => self.x_center(i),
        }
    }

    fn y(&self, value: f64) -> f64 {
        self.top + self.height - (value / self.y_max) * self.height
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

impl SvgRenderer {
    /// Produce the SVG document for `chart`.
    pub fn to_svg(&self, chart: &Chart) -> String {
        let (w, h) = (f64::from(self.width), f64::from(self.height));
        let y_max = chart.y_max();
        let frame = Frame {
            left: MARGIN_LEFT,
            top: MARGIN_TOP,
            width: (w - MARGIN_LEFT - MARGIN_RIGHT).max(1.0),
            height: (h - MARGIN_TOP - MARGIN_BOTTOM).max(1.0),
            slots: chart.len(),
            y_max: if y_max > 0.0 { y_max * 1.05 } else { 1.0 },
            x_range: chart.x_range(),
        };
        let markers = chart.marker_labels();

        let mut out = String::new();
        let _ = writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}" font-family="sans-serif">"#,
            self.width, self.height, self.width, self.height
        );
        let _ = writeln!(out, r#"<rect width="100%" height="100%" fill="white"/>"#);
        let _ = writeln!(
            out,
            r#"<text x="{}" y="28" text-anchor="middle" font-size="18" font-weight="bold">{}</text>"#,
            w / 2.0,
            escape(&chart.title)
        );

        self.axes(&mut out, chart, &frame);
        match chart.kind {
            ChartKind::StackedBar => stacked_bars(&mut out, &chart.series, &frame),
            ChartKind::Line => {
                for (i, series) in chart.series.iter().enumerate() {
                    polyline(&mut out, series, &frame, color(i), false);
                    points(&mut out, series, &frame, color(i), &markers);
                }
            }
        }
        if let Some(reference) = &chart.reference {
            polyline(&mut out, reference, &frame, "black", true);
        }
        legend(&mut out, chart, &markers, w);

        out.push_str("</svg>\n");
        out
    }

    fn axes(&self, out: &mut String, chart: &Chart, frame: &Frame) {
        let right = frame.left + frame.width;
        let _ = writeln!(
            out,
            r#"<line x1="{l}" y1="{b}" x2="{r}" y2="{b}" stroke="black"/><line x1="{l}" y1="{t}" x2="{l}" y2="{b}" stroke="black"/>"#,
            l = frame.left,
            r = right,
            t = frame.top,
            b = frame.bottom()
        );

        for tick in 0..=Y_TICKS {
            let value = frame.y_max * tick as f64 / Y_TICKS as f64;
            let y = frame.y(value);
            let _ = writeln!(
                out,
                r##"<line x1="{}" y1="{y:.2}" x2="{right}" y2="{y:.2}" stroke="#dddddd"/><text x="{}" y="{:.2}" text-anchor="end" font-size="11">{}</text>"##,
                frame.left,
                frame.left - 6.0,
                y + 4.0,
                format_value(value)
            );
        }

        for (x, label) in chart.x_ticks.iter().filter(|_| frame.x_range.is_some()) {
            let px = frame.x_at(*x);
            let _ = writeln!(
                out,
                r#"<line x1="{px:.2}" y1="{b}" x2="{px:.2}" y2="{}" stroke="black"/><text x="{px:.2}" y="{}" text-anchor="middle" font-size="10">{}</text>"#,
                frame.bottom() + 4.0,
                frame.bottom() + 16.0,
                escape(label),
                b = frame.bottom()
            );
        }

        let step = chart.x_labels.len().div_ceil(MAX_X_LABELS).max(1);
        for (i, label) in chart.x_labels.iter().enumerate().step_by(step) {
            let _ = writeln!(
                out,
                r#"<text x="{:.2}" y="{}" text-anchor="middle" font-size="10">{}</text>"#,
                frame.x_center(i),
                frame.bottom() + 16.0,
                escape(label)
            );
        }

        let _ = writeln!(
            out,
            r#"<text x="{:.2}" y="{}" text-anchor="middle" font-size="13">{}</text>"#,
            frame.left + frame.width / 2.0,
            frame.bottom() + 45.0,
            escape(&chart.x_label)
        );
        let mid = frame.top + frame.height / 2.0;
        let _ = writeln!(
            out,
            r#"<text x="20" y="{mid:.2}" text-anchor="middle" font-size="13" transform="rotate(-90 20 {mid:.2})">{}</text>"#,
            escape(&chart.y_label)
        );
    }
}

fn stacked_bars(out: &mut String, series: &[Series], frame: &Frame) {
    let bar_width = frame.slot_width() * 0.8;
    for i in 0..frame.slots {
        let mut base = 0.0;
        for (s, series) in series.iter().enumerate() {
            let Some(&value) = series.values.get(i) else {
                continue;
            };
            if value <= 0.0 {
                continue;
            }
            let top = frame.y(base + value);
            let _ = writeln!(
                out,
                r#"<rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}" stroke="black" stroke-width="0.5"/>"#,
                frame.x_center(i) - bar_width / 2.0,
                top,
                bar_width,
                frame.y(base) - top,
                color(s)
            );
            base += value;
        }
    }
}

fn polyline(out: &mut String, series: &Series, frame: &Frame, stroke: &str, dashed: bool) {
    if series.values.is_empty() {
        return;
    }
    let points: Vec<String> = series
        .values
        .iter()
        .enumerate()
        .map(|(i, v)| format!("{:.2},{:.2}", frame.point_x(series, i), frame.y(*v)))
        .collect();
    let dash = if dashed { r#" stroke-dasharray="6 4""# } else { "" };
    let _ = writeln!(
        out,
        r#"<polyline points="{}" fill="none" stroke="{stroke}" stroke-width="2"{dash}/>"#,
        points.join(" ")
    );
}

/// Draw each point of `series`, shaped by its marker label.
fn points(out: &mut String, series: &Series, frame: &Frame, fill: &str, labels: &[&str]) {
    for (i, value) in series.values.iter().enumerate() {
        let shape = series
            .marker(i)
            .and_then(|m| labels.iter().position(|l| *l == m));
        marker(out, shape, frame.point_x(series, i), frame.y(*value), fill);
    }
}

/// Unlabelled points are circles; labels cycle through the other shapes.
fn marker(out: &mut String, shape: Option<usize>, x: f64, y: f64, fill: &str) {
    let r = 4.0;
    let _ = match shape.map(|s| s % 4) {
        None => writeln!(out, r#"<circle cx="{x:.2}" cy="{y:.2}" r="3" fill="{fill}"/>"#),
        Some(0) => writeln!(
            out,
            r#"<rect x="{:.2}" y="{:.2}" width="{w}" height="{w}" fill="{fill}"/>"#,
            x - r,
            y - r,
            w = 2.0 * r
        ),
        Some(1) => writeln!(
            out,
            r#"<polygon points="{x:.2},{:.2} {:.2},{:.2} {:.2},{:.2}" fill="{fill}"/>"#,
            y - r,
            x - r,
            y + r,
            x + r,
            y + r
        ),
        Some(2) => writeln!(
            out,
            r#"<polygon points="{x:.2},{:.2} {:.2},{y:.2} {x:.2},{:.2} {:.2},{y:.2}" fill="{fill}"/>"#,
            y - r,
            x + r,
            y + r,
            x - r
        ),
        Some(_) => writeln!(
            out,
            r#"<path d="M{:.2},{:.2}L{:.2},{:.2}M{:.2},{:.2}L{:.2},{:.2}" stroke="{fill}" stroke-width="2"/>"#,
            x - r,
            y - r,
            x + r,
            y + r,
            x - r,
            y + r,
            x + r,
            y - r
        ),
    };
}

fn legend(out: &mut String, chart: &Chart, markers: &[&str], width: f64) {
    let x = width - MARGIN_RIGHT + 20.0;
    let mut y = MARGIN_TOP + 10.0;
    for (i, series) in chart.series.iter().enumerate() {
        let _ = writeln!(
            out,
            r#"<rect x="{x}" y="{:.2}" width="12" height="12" fill="{}"/><text x="{}" y="{:.2}" font-size="12">{}</text>"#,
            y - 10.0,
            color(i),
            x + 18.0,
            y,
            escape(&series.name)
        );
        y += 18.0;
    }
    if let Some(reference) = &chart.reference {
        let _ = writeln!(
            out,
            r#"<line x1="{x}" y1="{:.2}" x2="{}" y2="{:.2}" stroke="black" stroke-dasharray="6 4"/><text x="{}" y="{:.2}" font-size="12">{}</text>"#,
            y - 4.0,
            x + 12.0,
            y - 4.0,
            x + 18.0,
            y,
            escape(&reference.name)
        );
        y += 18.0;
    }
    if !markers.is_empty() {
        y += 8.0;
        let _ = writeln!(
            out,
            r#"<text x="{x}" y="{y:.2}" font-size="12" font-weight="bold">Tool version</text>"#
        );
        for (i, label) in markers.iter().enumerate() {
            y += 18.0;
            marker(out, Some(i), x + 6.0, y - 4.0, "black");
            let _ = writeln!(
                out,
                r#"<text x="{}" y="{y:.2}" font-size="12">{}</text>"#,
                x + 18.0,
                escape(label)
            );
        }
    }
}

fn color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

fn format_value(value: f64) -> String {
    if value >= 100.0 {
        format!("{value:.0}")
    } else if value >= 1.0 {
        format!("{value:.2}")
    } else {
        format!("{value:.3}")
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar_chart() -> Chart {
        Chart::new("Timings <ascent>", ChartKind::StackedBar)
            .with_axes("step / rank", "Time (seconds)")
            .with_x_labels(vec!["s0/r0".into(), "s0/r1".into()])
            .with_series(Series::new("render", vec![1.0, 2.0]))
            .with_series(Series::new("save", vec![0.5, 0.0]))
    }

    #[test]
    fn test_stacked_bar_segments() {
        let svg = SvgRenderer::default().to_svg(&bar_chart());
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
        // one rect per non-zero segment
        assert_eq!(svg.matches("stroke-width=\"0.5\"").count(), 3);
        assert!(svg.contains("Timings &lt;ascent&gt;"));
    }

    #[test]
    fn test_reference_line_drawn_dashed() {
        let chart = bar_chart().with_reference(Series::new("[total] (avg)", vec![2.0, 2.0]));
        let svg = SvgRenderer::default().to_svg(&chart);
        assert!(svg.contains("stroke-dasharray"));
        assert!(svg.contains("[total] (avg)"));
    }

    #[test]
    fn test_empty_chart_renders() {
        let chart = Chart::new("empty", ChartKind::Line);
        let svg = SvgRenderer::default().to_svg(&chart);
        assert!(svg.contains("empty"));
        assert!(!svg.contains("<polyline"));
    }

    #[test]
    fn test_render_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/chart.svg");
        SvgRenderer::default().render(&bar_chart(), &path).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn test_explicit_x_positions_points() {
        let chart = Chart::new("times", ChartKind::Line)
            .with_series(Series::new("alpha", vec![1.0, 1.0, 1.0]).with_x(vec![0.0, 1.0, 10.0]))
            .with_x_ticks(vec![(0.0, "start".into()), (10.0, "end".into())]);
        let renderer = SvgRenderer::default();
        let svg = renderer.to_svg(&chart);

        let xs: Vec<f64> = svg
            .lines()
            .filter(|l| l.starts_with("<circle"))
            .filter_map(|l| l.split("cx=\"").nth(1)?.split('"').next()?.parse().ok())
            .collect();
        assert_eq!(xs.len(), 3);
        // spacing follows the x values, not the point index
        let near = xs[1] - xs[0];
        let far = xs[2] - xs[1];
        assert!((far / near - 9.0).abs() < 0.01, "{xs:?}");
        assert!(svg.contains(">start</text>"));
        assert!(svg.contains(">end</text>"));
    }

    #[test]
    fn test_version_markers_and_legend() {
        let chart = Chart::new("times", ChartKind::Line).with_series(
            Series::new("alpha", vec![1.0, 2.0, 3.0])
                .with_x(vec![0.0, 1.0, 2.0])
                .with_markers(vec![Some("5.11".into()), Some("5.12".into()), None]),
        );
        let svg = SvgRenderer::default().to_svg(&chart);
        assert!(svg.contains("Tool version"));
        assert!(svg.contains(">5.11</text>"));
        assert!(svg.contains(">5.12</text>"));
        // the unlabelled point stays a circle
        assert_eq!(svg.matches("<circle").count(), 1);
        // first version is a square: plot point plus legend swatch
        assert_eq!(svg.matches(r#"width="8" height="8""#).count(), 2);
        // second version is a triangle
        assert_eq!(svg.matches("<polygon").count(), 2);
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"a<b>&"c""#), "a&lt;b&gt;&amp;&quot;c&quot;");
    }
}
