// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! State of one benchmark run.
//!
//! The session owns the configuration, the pattern generator and the
//! report being built. Harnesses borrow it for the duration of a run, so
//! two sessions never share a seed or a result list.

use boundary_core::{BenchConfig, PatternGenerator};

use crate::metrics::{BenchmarkCategory, BenchmarkReport, BenchmarkResult};

/// A single benchmark run.
#[derive(Debug)]
pub struct BenchmarkSession {
    config: BenchConfig,
    generator: PatternGenerator,
    report: BenchmarkReport,
}

impl BenchmarkSession {
    pub fn new(config: BenchConfig, category: BenchmarkCategory) -> Self {
        let access = &config.memory_access;
        let generator = PatternGenerator::new(access.algorithm, access.seed);
        Self {
            config,
            generator,
            report: BenchmarkReport::new(category),
        }
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// The generator, reset to the configured seed.
    pub fn reset_generator(&mut self) -> &mut PatternGenerator {
        self.generator.reset(self.config.memory_access.seed);
        &mut self.generator
    }

    /// Append a result to the report.
    pub fn record(&mut self, result: impl Into<BenchmarkResult>) {
        self.report.add_result(result);
    }

    /// Append a progress note.
    pub fn note(&mut self, note: impl Into<String>) {
        self.report.add_result(BenchmarkResult::Note(note.into()));
    }

    pub fn report(&self) -> &BenchmarkReport {
        &self.report
    }

    /// Finish the run and hand back its report.
    pub fn into_report(self) -> BenchmarkReport {
        self.report
    }
}
