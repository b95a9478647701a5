// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Cycle harness for running and timing operations.
//!
//! Every timed phase is bracketed once around the whole loop and divided
//! afterwards; reading the counter per iteration would add its own cost to
//! each sample.

use boundary_core::{Clock, TimingSample};

/// Outcome of a fallible timed phase.
#[derive(Debug)]
pub struct PhaseOutcome<E> {
    /// Bracket around the loop, including the failing iteration if any.
    pub sample: TimingSample,
    /// Iterations that completed before the loop stopped.
    pub completed: u64,
    /// The error that stopped the loop early.
    pub failure: Option<E>,
}

impl<E> PhaseOutcome<E> {
    /// Whether every requested iteration completed.
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// A harness that warms up an operation and times a tight loop of it.
pub struct CycleHarness {
    /// Number of untimed iterations before measurement
    warmup_iterations: u64,
    /// Number of timed iterations
    measurement_iterations: u64,
}

impl CycleHarness {
    /// Create a harness timing `iterations` repetitions without warm-up.
    pub fn new(iterations: u64) -> Self {
        Self {
            warmup_iterations: 0,
            measurement_iterations: iterations,
        }
    }

    /// Set the number of warmup iterations.
    pub fn warmup(mut self, iterations: u64) -> Self {
        self.warmup_iterations = iterations;
        self
    }

    /// Set the number of measurement iterations.
    pub fn iterations(mut self, iterations: u64) -> Self {
        self.measurement_iterations = iterations;
        self
    }

    /// Number of timed iterations.
    pub fn measurement_iterations(&self) -> u64 {
        self.measurement_iterations
    }

    /// Warm up, then bracket `measurement_iterations` calls of `operation`.
    pub fn run<F>(&self, mut operation: F) -> TimingSample
    where
        F: FnMut(),
    {
        for _ in 0..self.warmup_iterations {
            operation();
        }

        let start = Clock::now();
        for _ in 0..self.measurement_iterations {
            operation();
        }
        let stop = Clock::now();

        TimingSample { start, stop }
    }

    /// Bracket a loop of fallible iterations, stopping at the first error.
    ///
    /// The iteration index is passed to `operation`. Nothing is allocated
    /// by the harness between the two counter reads.
    pub fn run_fallible<F, E>(&self, mut operation: F) -> PhaseOutcome<E>
    where
        F: FnMut(u64) -> Result<(), E>,
    {
        for i in 0..self.warmup_iterations {
            if let Err(failure) = operation(i) {
                let now = Clock::now();
                return PhaseOutcome {
                    sample: TimingSample {
                        start: now,
                        stop: now,
                    },
                    completed: 0,
                    failure: Some(failure),
                };
            }
        }

        let mut completed = 0;
        let mut failure = None;

        let start = Clock::now();
        for i in 0..self.measurement_iterations {
            if let Err(err) = operation(i) {
                failure = Some(err);
                break;
            }
            completed += 1;
        }
        let stop = Clock::now();

        PhaseOutcome {
            sample: TimingSample { start, stop },
            completed,
            failure,
        }
    }
}
