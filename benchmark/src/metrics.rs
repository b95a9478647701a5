// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Result types for benchmark runs.
//!
//! A run produces a `BenchmarkReport`: an ordered list of measurements,
//! cross-domain comparisons and progress notes, rendered later by the
//! reporter.

use std::fmt;

use boundary_core::UsageError;
use sysinfo::System;

/// Benchmark families selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BenchmarkCategory {
    /// Boundary-call round trips
    Switching,
    /// Region lifecycle and heap movement
    MemoryManagement,
    /// Sequential and random mutating access
    MemoryAccess,
    /// Isolated domain creation and teardown
    CreateDomain,
}

impl fmt::Display for BenchmarkCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchmarkCategory::Switching => write!(f, "switching"),
            BenchmarkCategory::MemoryManagement => write!(f, "memory_management"),
            BenchmarkCategory::MemoryAccess => write!(f, "memory_access"),
            BenchmarkCategory::CreateDomain => write!(f, "create_domain"),
        }
    }
}

/// Average cost of one operation over a bracketed loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleAverage {
    total: u64,
    count: u64,
}

impl CycleAverage {
    /// Average `total` cycles over `count` operations. A zero count has no
    /// average and is rejected.
    pub fn compute(total: u64, count: u64) -> Result<Self, UsageError> {
        if count == 0 {
            return Err(UsageError::ZeroLoopCount);
        }
        Ok(Self { total, count })
    }

    /// Cycles per operation, truncated.
    pub fn cycles(&self) -> u64 {
        self.total / self.count
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl fmt::Display for CycleAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cycles())
    }
}

/// Result of a single measured operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Measured(CycleAverage),
    /// The measurement was not taken; the reason is shown instead.
    Skipped(String),
}

/// A labeled per-operation cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub label: String,
    /// Parameters of the run, e.g. region size and count.
    pub detail: Option<String>,
    pub outcome: Outcome,
}

impl Measurement {
    pub fn measured(label: impl Into<String>, average: CycleAverage) -> Self {
        Self {
            label: label.into(),
            detail: None,
            outcome: Outcome::Measured(average),
        }
    }

    pub fn skipped(label: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            label: label.into(),
            detail: None,
            outcome: Outcome::Skipped(reason.to_string()),
        }
    }

    /// Attach run parameters to the measurement.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// The average, if the measurement was taken.
    pub fn average(&self) -> Option<CycleAverage> {
        match self.outcome {
            Outcome::Measured(average) => Some(average),
            Outcome::Skipped(_) => None,
        }
    }
}

/// Raw total cost of a measured side against its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ratio {
    pub measured: Option<u64>,
    pub baseline: Option<u64>,
}

impl Ratio {
    pub fn new(measured: Option<u64>, baseline: Option<u64>) -> Self {
        Self { measured, baseline }
    }

    /// `measured / baseline`, absent when either side is missing or the
    /// baseline is zero.
    pub fn value(&self) -> Option<f64> {
        match (self.measured, self.baseline) {
            (Some(measured), Some(baseline)) if baseline > 0 => {
                Some(measured as f64 / baseline as f64)
            }
            _ => None,
        }
    }
}

/// Sequential and random costs of one domain normalized to ordinary memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub label: String,
    pub detail: String,
    pub sequential: Ratio,
    pub random: Ratio,
}

/// One line of a report.
#[derive(Debug, Clone, PartialEq)]
pub enum BenchmarkResult {
    Measurement(Measurement),
    Comparison(Comparison),
    /// Progress marker printed verbatim.
    Note(String),
}

impl From<Measurement> for BenchmarkResult {
    fn from(measurement: Measurement) -> Self {
        BenchmarkResult::Measurement(measurement)
    }
}

impl From<Comparison> for BenchmarkResult {
    fn from(comparison: Comparison) -> Self {
        BenchmarkResult::Comparison(comparison)
    }
}

/// Results of one benchmark family, in the order they were produced.
#[derive(Debug, Clone)]
pub struct BenchmarkReport {
    pub category: BenchmarkCategory,
    pub results: Vec<BenchmarkResult>,
}

impl BenchmarkReport {
    pub fn new(category: BenchmarkCategory) -> Self {
        Self {
            category,
            results: Vec::new(),
        }
    }

    /// Add a result to the report.
    pub fn add_result(&mut self, result: impl Into<BenchmarkResult>) {
        self.results.push(result.into());
    }

    /// All measurements, skipping notes and comparisons.
    pub fn measurements(&self) -> impl Iterator<Item = &Measurement> {
        self.results.iter().filter_map(|result| match result {
            BenchmarkResult::Measurement(m) => Some(m),
            _ => None,
        })
    }

    /// All comparisons.
    pub fn comparisons(&self) -> impl Iterator<Item = &Comparison> {
        self.results.iter().filter_map(|result| match result {
            BenchmarkResult::Comparison(c) => Some(c),
            _ => None,
        })
    }

    /// Look up a measurement by label.
    pub fn measurement(&self, label: &str) -> Option<&Measurement> {
        self.measurements().find(|m| m.label == label)
    }
}

/// Host information printed before a run.
#[derive(Debug, Clone)]
pub struct SystemInfo {
    /// Operating system name
    pub os: String,
    /// Kernel version (Linux)
    pub kernel_version: Option<String>,
    /// CPU model name
    pub cpu_model: String,
    /// Number of logical CPUs
    pub cpu_cores: usize,
    /// Total system memory in bytes
    pub memory_bytes: u64,
    /// Hostname
    pub hostname: String,
}

impl SystemInfo {
    /// Collect current system information.
    pub fn collect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        Self {
            os: System::name().unwrap_or_else(|| "Unknown".to_string()),
            kernel_version: System::kernel_version(),
            cpu_model: sys
                .cpus()
                .first()
                .map(|cpu| cpu.brand().to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            cpu_cores: sys.cpus().len(),
            memory_bytes: sys.total_memory(),
            hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        }
    }

    /// One-line banner, e.g. `host (Linux 6.1) | Xeon x 8 | 16384 MiB`.
    pub fn banner(&self) -> String {
        format!(
            "{} ({} {}) | {} x {} | {} MiB",
            self.hostname,
            self.os,
            self.kernel_version.as_deref().unwrap_or("unknown kernel"),
            self.cpu_model,
            self.cpu_cores,
            self.memory_bytes / (1024 * 1024)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_average_truncates() {
        let average = CycleAverage::compute(1_000, 3).unwrap();
        assert_eq!(average.cycles(), 333);
        assert_eq!(average.to_string(), "333");
    }

    #[test]
    fn test_cycle_average_rejects_zero_count() {
        assert!(matches!(
            CycleAverage::compute(10, 0),
            Err(UsageError::ZeroLoopCount)
        ));
    }

    #[test]
    fn test_ratio_missing_side() {
        assert_eq!(Ratio::new(Some(10), None).value(), None);
        assert_eq!(Ratio::new(None, Some(10)).value(), None);
        assert_eq!(Ratio::new(Some(10), Some(0)).value(), None);
        assert_eq!(Ratio::new(Some(30), Some(10)).value(), Some(3.0));
    }

    #[test]
    fn test_report_lookup() {
        let mut report = BenchmarkReport::new(BenchmarkCategory::CreateDomain);
        report.add_result(BenchmarkResult::Note("start".to_string()));
        report.add_result(Measurement::measured(
            "create_domain",
            CycleAverage::compute(100, 10).unwrap(),
        ));
        report.add_result(Measurement::skipped("other", "no reason"));

        assert_eq!(report.measurements().count(), 2);
        let created = report.measurement("create_domain").unwrap();
        assert_eq!(created.average().unwrap().cycles(), 10);
        assert!(report.measurement("other").unwrap().average().is_none());
    }

    #[test]
    fn test_system_info_collect() {
        let info = SystemInfo::collect();
        assert!(!info.os.is_empty());
        assert!(info.banner().contains("MiB"));
    }
}
