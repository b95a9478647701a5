// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! boundary-bench harnesses
//!
//! Measures the cost of crossing an isolation boundary and of managing and
//! touching memory on either side of it.
//!
//! # Benchmark Families
//!
//! - **Switching**: every call shape, into and out of the domain
//! - **Memory management**: region lifecycle and heap movement, ordinary vs isolated
//! - **Memory access**: sequential vs random increments at several region sizes
//! - **Create domain**: domain creation latency
//!
//! # Output
//!
//! Harnesses append to a `BenchmarkReport` owned by the session; the
//! `TextReporter` renders it as plain lines.

pub mod create_domain;
pub mod harness;
pub mod memory_access;
pub mod memory_management;
pub mod metrics;
pub mod reporter;
pub mod session;
pub mod switching;

pub use create_domain::run_domain_creation;
pub use harness::{CycleHarness, PhaseOutcome};
pub use memory_access::run_memory_access;
pub use memory_management::{run_heap_round_trip, run_memory_management, run_region_lifecycle};
pub use metrics::{
    BenchmarkCategory, BenchmarkReport, BenchmarkResult, Comparison, CycleAverage, Measurement,
    Outcome, Ratio, SystemInfo,
};
pub use reporter::{ReporterError, TextReporter};
pub use session::BenchmarkSession;
pub use switching::run_switching;
