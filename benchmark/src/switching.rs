// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Boundary-call harness.
//!
//! Times every call shape in both directions. Calls into the domain are
//! bracketed as one tight loop in the caller; calls out of the domain are
//! issued in a loop from inside a single call in, and that one call is
//! bracketed.

use boundary_core::{
    measure, BenchError, BenchResult, CallShape, Direction, IsolatedDomain, TimingSample,
};

use crate::harness::CycleHarness;
use crate::metrics::{CycleAverage, Measurement};
use crate::session::BenchmarkSession;

/// Label of one cell, e.g. `call-in inout (i64[128])`.
pub fn cell_label(direction: Direction, shape: CallShape, len: usize) -> String {
    if shape.has_buffer() {
        format!("{} {} (i64[{}])", direction, shape, len)
    } else {
        format!("{} {}", direction, shape)
    }
}

/// Measure all eight shape/direction cells against `domain`.
pub fn run_switching<D: IsolatedDomain>(
    session: &mut BenchmarkSession,
    domain: &mut D,
) -> BenchResult<()> {
    let loops = session.config().switching.loop_count;
    let len = session.config().switching.buffer_len;

    let mut buffer: Vec<i64> = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| BenchError::Allocation {
            bytes: len * std::mem::size_of::<i64>(),
        })?;
    buffer.resize(len, 0);

    tracing::debug!(domain = %domain.id(), loops = loops.value(), len = len, "Switching benchmark");

    session.note("start warm...");
    for _ in 0..loops.warmup() {
        for shape in CallShape::ALL {
            domain.call_in(shape, &mut buffer);
        }
    }
    for shape in CallShape::ALL {
        domain.call_out_loop(shape, loops.warmup(), len)?;
    }
    session.note("warm end...");

    for shape in CallShape::ALL {
        let sample = CycleHarness::new(loops.value()).run(|| domain.call_in(shape, &mut buffer));
        record(session, Direction::IntoDomain, shape, len, sample, loops.value())?;
    }

    for shape in CallShape::ALL {
        let (result, sample) = measure(|| domain.call_out_loop(shape, loops.value(), len));
        result?;
        record(session, Direction::OutOfDomain, shape, len, sample, loops.value())?;
    }

    Ok(())
}

fn record(
    session: &mut BenchmarkSession,
    direction: Direction,
    shape: CallShape,
    len: usize,
    sample: TimingSample,
    loops: u64,
) -> BenchResult<()> {
    let average = CycleAverage::compute(sample.cost(), loops)?;
    let label = cell_label(direction, shape, len);
    tracing::debug!(cell = %label, cycles = average.cycles(), "Switching cell measured");
    session.record(Measurement::measured(label, average));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_labels() {
        assert_eq!(
            cell_label(Direction::IntoDomain, CallShape::Void, 128),
            "call-in void"
        );
        assert_eq!(
            cell_label(Direction::OutOfDomain, CallShape::InOut, 128),
            "call-out inout (i64[128])"
        );
    }
}
