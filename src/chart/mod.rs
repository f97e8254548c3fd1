//! Chart descriptions and renderers.
//!
//! Charts are described as data ([`Chart`]) and handed to a
//! [`ChartRenderer`]. The bundled [`SvgRenderer`] writes self-contained SVG.

use crate::core::error::{Error, Result};
use crate::metrics::{Metric, PerformanceHistory};
use crate::timings::{TOTAL_OPERATION, TimingTable};
use std::path::{Path, PathBuf};

mod svg;

pub use svg::SvgRenderer;

/// How series are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// One polyline per series.
    Line,
    /// One bar per x position, series stacked bottom to top.
    StackedBar,
}

/// A named sequence of y values, one per x position.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
    /// Explicit x coordinates, parallel to `values`. Empty places point `i`
    /// in slot `i`.
    pub x: Vec<f64>,
    /// Per-point marker label, parallel to `values`. Points sharing a label
    /// share a marker shape.
    pub markers: Vec<Option<String>>,
}

impl Series {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
            x: Vec::new(),
            markers: Vec::new(),
        }
    }

    pub fn with_x(mut self, x: Vec<f64>) -> Self {
        self.x = x;
        self
    }

    pub fn with_markers(mut self, markers: Vec<Option<String>>) -> Self {
        self.markers = markers;
        self
    }

    /// Marker label of point `i`.
    pub fn marker(&self, i: usize) -> Option<&str> {
        self.markers.get(i).and_then(|m| m.as_deref())
    }
}

/// Renderer-independent chart description.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub kind: ChartKind,
    /// Tick labels for x positions. May be empty.
    pub x_labels: Vec<String>,
    /// Labelled ticks on a continuous x axis, used with explicit series x.
    pub x_ticks: Vec<(f64, String)>,
    pub series: Vec<Series>,
    /// Dashed line drawn over the series.
    pub reference: Option<Series>,
}

impl Chart {
    pub fn new(title: impl Into<String>, kind: ChartKind) -> Self {
        Self {
            title: title.into(),
            x_label: String::new(),
            y_label: String::new(),
            kind,
            x_labels: Vec::new(),
            x_ticks: Vec::new(),
            series: Vec::new(),
            reference: None,
        }
    }

    pub fn with_axes(mut self, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        self.x_label = x_label.into();
        self.y_label = y_label.into();
        self
    }

    pub fn with_x_labels(mut self, labels: Vec<String>) -> Self {
        self.x_labels = labels;
        self
    }

    pub fn with_x_ticks(mut self, ticks: Vec<(f64, String)>) -> Self {
        self.x_ticks = ticks;
        self
    }

    pub fn with_series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    pub fn with_reference(mut self, reference: Series) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Number of x positions covered by any series.
    pub fn len(&self) -> usize {
        self.series
            .iter()
            .chain(self.reference.iter())
            .map(|s| s.values.len())
            .max()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest and largest explicit x over all series, if any series has them.
    pub fn x_range(&self) -> Option<(f64, f64)> {
        self.series
            .iter()
            .chain(self.reference.iter())
            .flat_map(|s| s.x.iter().copied())
            .fold(None, |range, x| match range {
                None => Some((x, x)),
                Some((lo, hi)) => Some((f64::min(lo, x), f64::max(hi, x))),
            })
    }

    /// Distinct marker labels in order of first appearance.
    pub fn marker_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for series in &self.series {
            for label in series.markers.iter().flatten() {
                if !labels.contains(&label.as_str()) {
                    labels.push(label);
                }
            }
        }
        labels
    }

    /// Largest y value the chart must show.
    pub fn y_max(&self) -> f64 {
        let data_max = match self.kind {
            ChartKind::Line => self
                .series
                .iter()
                .flat_map(|s| s.values.iter().copied())
                .fold(0.0, f64::max),
            ChartKind::StackedBar => (0..self.len())
                .map(|i| {
                    self.series
                        .iter()
                        .filter_map(|s| s.values.get(i))
                        .filter(|v| **v > 0.0)
                        .sum::<f64>()
                })
                .fold(0.0, f64::max),
        };
        let reference_max = self
            .reference
            .iter()
            .flat_map(|s| s.values.iter().copied())
            .fold(0.0, f64::max);
        data_max.max(reference_max)
    }
}

/// Writes a [`Chart`] to a file.
pub trait ChartRenderer {
    /// Render `chart` into `path`, creating parent directories.
    fn render(&self, chart: &Chart, path: &Path) -> Result<()>;

    /// File extension of produced files, without the dot.
    fn extension(&self) -> &str;
}

/// Stacked bar per `(step, rank)` with one segment per operation.
///
/// The mean `[total]` of each step is drawn as a reference line when the
/// table has a `[total]` operation.
pub fn timing_chart(table: &TimingTable, title: &str) -> Chart {
    let num_steps = table.num_steps();
    let num_ranks = table.num_ranks();

    let mut operations: Vec<(&str, Vec<f64>)> = table
        .operations
        .iter()
        .filter(|(name, _)| name.as_str() != TOTAL_OPERATION)
        .map(|(name, steps)| {
            let flat = steps.values().flat_map(|ranks| ranks.iter().copied()).collect();
            (name.as_str(), flat)
        })
        .collect();
    // largest contributors at the bottom
    operations.sort_by(|(a_name, a), (b_name, b)| {
        mean(b)
            .total_cmp(&mean(a))
            .then_with(|| a_name.cmp(b_name))
    });

    let mut x_labels = Vec::with_capacity(num_steps * num_ranks);
    for step in 0..num_steps {
        for rank in 0..num_ranks {
            x_labels.push(format!("s{step}/r{rank}"));
        }
    }

    let mut chart = Chart::new(title, ChartKind::StackedBar)
        .with_axes("step / rank", "Time (seconds)")
        .with_x_labels(x_labels);
    for (name, values) in operations {
        chart = chart.with_series(Series::new(name, values));
    }

    if let Some(total) = table.operation(TOTAL_OPERATION) {
        let line = total
            .values()
            .flat_map(|ranks| std::iter::repeat_n(mean(ranks), num_ranks))
            .collect();
        chart = chart.with_reference(Series::new("[total] (avg)", line));
    }

    chart
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Metrics charted per test, with their file prefix and axis label.
pub const CHARTED_METRICS: [(Metric, &str, &str); 3] = [
    (Metric::ExecutionTime, "execution_time", "Execution Time (s)"),
    (Metric::MemoryUsageMb, "memory_usage", "Memory Usage (MB)"),
    (Metric::CpuUsagePercent, "cpu_usage", "CPU Usage (%)"),
];

const DATE_TICKS: usize = 6;

/// One line per machine of `metric` against the run timestamps.
///
/// Each point is marked with the tool version recorded for that run.
/// Entries whose timestamp does not parse are skipped.
pub fn metric_chart(
    test_name: &str,
    metric: Metric,
    y_label: &str,
    histories: &[(String, PerformanceHistory)],
) -> Chart {
    let mut chart = Chart::new(format!("{test_name}: {y_label}"), ChartKind::Line)
        .with_axes("Date", y_label);
    for (machine, history) in histories {
        let mut x = Vec::new();
        let mut values = Vec::new();
        let mut markers = Vec::new();
        for (timestamp, record) in history.entries() {
            let Some(value) = record.value(metric) else {
                continue;
            };
            let Some(seconds) = parse_timestamp(timestamp) else {
                tracing::debug!(machine = %machine, timestamp, "unparseable history timestamp");
                continue;
            };
            x.push(seconds);
            values.push(value);
            markers.push(
                record
                    .machine_info
                    .as_ref()
                    .and_then(|info| info.tool_version())
                    .map(str::to_string),
            );
        }
        chart = chart.with_series(
            Series::new(machine.clone(), values)
                .with_x(x)
                .with_markers(markers),
        );
    }
    let ticks = chart.x_range().map(date_ticks).unwrap_or_default();
    chart.with_x_ticks(ticks)
}

/// Seconds since the epoch of a history key, read as UTC.
fn parse_timestamp(timestamp: &str) -> Option<f64> {
    chrono::NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|t| t.and_utc().timestamp_millis() as f64 / 1000.0)
}

fn date_ticks((lo, hi): (f64, f64)) -> Vec<(f64, String)> {
    let positions: Vec<f64> = if hi > lo {
        (0..DATE_TICKS)
            .map(|i| lo + (hi - lo) * i as f64 / (DATE_TICKS - 1) as f64)
            .collect()
    } else {
        vec![lo]
    };
    let format = if hi - lo < 2.0 * 86_400.0 {
        "%m-%d %H:%M"
    } else {
        "%Y-%m-%d"
    };
    positions
        .into_iter()
        .filter_map(|x| {
            chrono::DateTime::from_timestamp(x as i64, 0)
                .map(|t| (x, t.format(format).to_string()))
        })
        .collect()
}

/// Render the per-machine metric charts of one test into `testing_dir`.
///
/// Reads every `performance_metrics_<machine>.json` there. Unreadable
/// history files are logged and skipped. Returns the written paths; empty
/// when there is no history.
pub fn render_metric_charts(
    renderer: &dyn ChartRenderer,
    testing_dir: &Path,
    test_name: &str,
) -> Result<Vec<PathBuf>> {
    let mut histories = Vec::new();
    for (machine, path) in crate::metrics::history::machine_files(testing_dir)? {
        match PerformanceHistory::load(&path) {
            Ok(history) if !history.is_empty() => histories.push((machine, history)),
            Ok(_) => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping history file"),
        }
    }
    if histories.is_empty() {
        tracing::debug!(test = test_name, "no performance data to chart");
        return Ok(Vec::new());
    }

    let mut written = Vec::new();
    for (metric, prefix, y_label) in CHARTED_METRICS {
        let chart = metric_chart(test_name, metric, y_label, &histories);
        let path = testing_dir.join(format!(
            "{prefix}_{test_name}.{}",
            renderer.extension()
        ));
        renderer.render(&chart, &path)?;
        written.push(path);
    }
    Ok(written)
}

/// Open a file with the platform's default viewer.
pub fn open(path: &Path) -> Result<()> {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(windows) {
        "explorer"
    } else {
        "xdg-open"
    };
    std::process::Command::new(opener)
        .arg(path)
        .spawn()
        .map_err(|e| Error::chart(format!("failed to run {opener}: {e}")))?;
    Ok(())
}
