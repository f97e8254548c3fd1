//! Resource sampling around a test run and the records persisted per machine.
//!
//! Measurements are taken in the orchestrator process, not in the child tool
//! process. They approximate the harness's own footprint and are only useful
//! as a trend across repeated runs on the same machine.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use sysinfo::{Pid, ProcessesToUpdate, System};

pub mod history;
pub mod regression;

pub use history::PerformanceHistory;
pub use regression::{PerformanceChange, RegressionDetector, TwoPointDetector};

/// Metrics tracked in performance history, in regression-check order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    ExecutionTime,
    MemoryUsageMb,
    CpuUsagePercent,
    DiskUsagePercent,
}

impl Metric {
    /// All metrics, in the order the regression check visits them.
    pub const ALL: [Metric; 4] = [
        Metric::ExecutionTime,
        Metric::MemoryUsageMb,
        Metric::CpuUsagePercent,
        Metric::DiskUsagePercent,
    ];

    /// JSON key of the metric in a [`MetricsRecord`].
    pub fn key(self) -> &'static str {
        match self {
            Metric::ExecutionTime => "execution_time",
            Metric::MemoryUsageMb => "memory_usage_mb",
            Metric::CpuUsagePercent => "cpu_usage_percent",
            Metric::DiskUsagePercent => "disk_usage_percent",
        }
    }
}

/// Static description of the machine a record was captured on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MachineInfo {
    #[serde(default)]
    pub system: String,
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub release: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub machine: String,
    #[serde(default)]
    pub processor: String,
    #[serde(default)]
    pub paraview_version: Option<String>,
    #[serde(default)]
    pub visit_version: Option<String>,
}

impl MachineInfo {
    /// Describe the current machine, tagging the tool versions under test.
    pub fn detect(paraview_version: Option<String>, visit_version: Option<String>) -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        let processor = system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().to_string())
            .unwrap_or_default();

        Self {
            system: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            node: System::host_name().unwrap_or_default(),
            release: System::kernel_version().unwrap_or_default(),
            version: System::os_version().unwrap_or_default(),
            machine: std::env::consts::ARCH.to_string(),
            processor,
            paraview_version,
            visit_version,
        }
    }

    /// The tool version recorded with this machine, VisIt first.
    pub fn tool_version(&self) -> Option<&str> {
        self.visit_version
            .as_deref()
            .or(self.paraview_version.as_deref())
    }
}

/// One sample of resource usage for a test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MetricsRecord {
    #[serde(default)]
    pub test_name: String,

    /// Wall time of the run in seconds.
    #[serde(default)]
    pub execution_time: f64,

    /// Resident set size in bytes.
    #[serde(default)]
    pub memory_usage: u64,

    #[serde(default)]
    pub memory_usage_mb: f64,

    #[serde(default)]
    pub cpu_usage_percent: f64,

    /// Not collected; kept so histories that carry it are still checked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_usage_percent: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_info: Option<MachineInfo>,
}

impl MetricsRecord {
    /// Value of `metric`, if this record carries it.
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::ExecutionTime => Some(self.execution_time),
            Metric::MemoryUsageMb => Some(self.memory_usage_mb),
            Metric::CpuUsagePercent => Some(self.cpu_usage_percent),
            Metric::DiskUsagePercent => self.disk_usage_percent,
        }
    }
}

/// Samples resource usage of the current process.
pub struct MetricsCollector {
    system: System,
    pid: Option<Pid>,
}

impl MetricsCollector {
    /// Create a collector and take the CPU baseline sample.
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        let pid = sysinfo::get_current_pid().ok();
        Self { system, pid }
    }

    /// Build a record for a run that started at `start` and ended at `end`.
    ///
    /// Memory is the orchestrator's RSS at call time, not a peak; CPU is the
    /// global utilization since the previous sample.
    pub fn gather(&mut self, test_name: &str, start: SystemTime, end: SystemTime) -> MetricsRecord {
        let execution_time = end
            .duration_since(start)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let memory_usage = self.current_rss();

        self.system.refresh_cpu_usage();
        let cpu_usage_percent = f64::from(self.system.global_cpu_usage()).max(0.0);

        MetricsRecord {
            test_name: test_name.to_string(),
            execution_time,
            memory_usage,
            memory_usage_mb: memory_usage as f64 / (1024.0 * 1024.0),
            cpu_usage_percent,
            disk_usage_percent: None,
            machine_info: None,
        }
    }

    fn current_rss(&mut self) -> u64 {
        let Some(pid) = self.pid else {
            return 0;
        };
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        self.system.process(pid).map(|p| p.memory()).unwrap_or(0)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
