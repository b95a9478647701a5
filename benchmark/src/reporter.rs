// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Human-readable report generation.
//!
//! Formatting is pure and never fails: a missing denominator prints as
//! `n/a`, a skipped measurement prints its reason.

use std::io::Write;

use thiserror::Error;

use crate::metrics::{BenchmarkReport, BenchmarkResult, Comparison, Measurement, Outcome, Ratio};

/// Errors that can occur while emitting a report.
#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("Failed to write report: {0}")]
    Write(#[from] std::io::Error),
}

/// Width of the bracketed label column.
const LABEL_WIDTH: usize = 30;

/// Plain-text reporter writing one line per result.
#[derive(Debug, Default)]
pub struct TextReporter;

impl TextReporter {
    pub fn new() -> Self {
        Self
    }

    /// Format one measurement, e.g.
    /// `[ordinary reserve]             [ 4 pages, num: 100]    time is 812 cycles`.
    pub fn format_measurement(&self, measurement: &Measurement) -> String {
        let label = format!("[{}]", measurement.label);
        let value = match &measurement.outcome {
            Outcome::Measured(average) => format!("time is {} cycles", average),
            Outcome::Skipped(reason) => format!("skipped: {}", reason),
        };

        match &measurement.detail {
            Some(detail) => format!("{:<width$} {}    {}", label, detail, value, width = LABEL_WIDTH),
            None => format!("{} {}", label, value),
        }
    }

    /// Format one comparison with both raw totals and their ratio.
    pub fn format_comparison(&self, comparison: &Comparison) -> String {
        format!(
            "{:<width$} {}    seq access time is {}, random access time is {}",
            format!("[{}]", comparison.label),
            comparison.detail,
            Self::format_ratio(&comparison.sequential),
            Self::format_ratio(&comparison.random),
            width = LABEL_WIDTH
        )
    }

    fn format_ratio(ratio: &Ratio) -> String {
        let side = |value: Option<u64>| match value {
            Some(cycles) => cycles.to_string(),
            None => "n/a".to_string(),
        };
        let value = match ratio.value() {
            Some(value) => format!("{:.6}", value),
            None => "n/a".to_string(),
        };
        format!("{} / {} = {}", side(ratio.measured), side(ratio.baseline), value)
    }

    /// Render every result of a report, in order.
    pub fn render(&self, report: &BenchmarkReport) -> Vec<String> {
        report
            .results
            .iter()
            .map(|result| match result {
                BenchmarkResult::Measurement(m) => self.format_measurement(m),
                BenchmarkResult::Comparison(c) => self.format_comparison(c),
                BenchmarkResult::Note(note) => note.clone(),
            })
            .collect()
    }

    /// Write the rendered report, one line per result.
    pub fn write(&self, report: &BenchmarkReport, out: &mut impl Write) -> Result<(), ReporterError> {
        for line in self.render(report) {
            writeln!(out, "{}", line)?;
        }
        out.flush()?;
        Ok(())
    }
}
