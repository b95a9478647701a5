// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Isolated-memory-region harness.
//!
//! Runs reserve, protect-extend, protect-restrict and release over N
//! regions, then moves the heap boundary forward and back N times, once on
//! ordinary process memory and once inside the isolated domain.
//!
//! The ordinary heap is the program break, which the allocator shares.
//! Between the first heap growth and the final revert nothing in this
//! module allocates: ids are stored in pre-sized vectors and results are
//! built only after the boundary is restored.

use boundary_core::{
    BenchResult, DomainKind, IsolatedDomain, MemoryError, MemoryPlatform, PageCount,
    ProcessMemory, Protection, RegionCount, RegionId,
};

use crate::harness::{CycleHarness, PhaseOutcome};
use crate::metrics::{CycleAverage, Measurement};
use crate::session::BenchmarkSession;

/// Region lifecycle phases, in execution order.
const LIFECYCLE_PHASES: [&str; 4] = ["reserve", "protect extend", "protect restrict", "release"];

/// Heap phases, in execution order.
const HEAP_PHASES: [&str; 2] = ["heap extend", "heap shrink"];

fn phase_label(kind: DomainKind, phase: &str) -> String {
    format!("{} {}", kind, phase)
}

fn phase_detail(pages: PageCount, count: RegionCount) -> String {
    format!("[ {} pages, num: {}]", pages, count)
}

/// Turn a phase outcome into a measurement, averaging over the iterations
/// that completed.
fn summarize(
    kind: DomainKind,
    phase: &str,
    detail: &str,
    outcome: &PhaseOutcome<MemoryError>,
) -> Measurement {
    let label = phase_label(kind, phase);
    if let Some(err) = &outcome.failure {
        tracing::error!(
            domain = %kind,
            phase = phase,
            completed = outcome.completed,
            error = %err,
            "Phase stopped early"
        );
    }

    let measurement = match CycleAverage::compute(outcome.sample.cost(), outcome.completed) {
        Ok(average) => Measurement::measured(label, average),
        Err(_) => Measurement::skipped(
            label,
            outcome
                .failure
                .as_ref()
                .map(|err| err.to_string())
                .unwrap_or_else(|| "no iterations completed".to_string()),
        ),
    };
    measurement.with_detail(detail)
}

/// Release `ids` without timing, logging each failure.
fn release_untimed(memory: &mut dyn MemoryPlatform, ids: &[RegionId]) {
    for &id in ids {
        if let Err(err) = memory.release(id) {
            tracing::error!(domain = %memory.kind(), region = %id, error = %err, "Failed to release region");
        }
    }
}

/// Time the full region lifecycle over `count` regions of `pages` pages.
///
/// A failed reservation aborts the lifecycle: the regions reserved so far
/// are released untimed and the remaining phases are reported as skipped.
/// A failed protection change stops that phase only. Every region is
/// released, or reported as failed to release, before returning.
pub fn run_region_lifecycle(
    memory: &mut dyn MemoryPlatform,
    pages: PageCount,
    count: RegionCount,
) -> Vec<Measurement> {
    let kind = memory.kind();
    let detail = phase_detail(pages, count);
    let size = pages.bytes();
    let n = u64::from(count.value());

    let mut ids: Vec<RegionId> = Vec::with_capacity(count.value() as usize);
    let mut results = Vec::with_capacity(LIFECYCLE_PHASES.len());
    let harness = CycleHarness::new(n);

    let reserve = harness.run_fallible(|_| {
        let id = memory.reserve(size)?;
        ids.push(id);
        memory.touch_region(id)
    });
    results.push(summarize(kind, LIFECYCLE_PHASES[0], &detail, &reserve));

    if let Some(err) = reserve.failure {
        release_untimed(memory, &ids);
        for phase in &LIFECYCLE_PHASES[1..] {
            results.push(
                Measurement::skipped(
                    phase_label(kind, phase),
                    format!("reservation failed: {}", err),
                )
                .with_detail(detail.clone()),
            );
        }
        return results;
    }

    for (phase, protection) in [
        (LIFECYCLE_PHASES[1], Protection::all()),
        (LIFECYCLE_PHASES[2], Protection::READ),
    ] {
        let outcome = harness.run_fallible(|i| memory.change_protection(ids[i as usize], protection));
        results.push(summarize(kind, phase, &detail, &outcome));
    }

    let release = harness.run_fallible(|i| memory.release(ids[i as usize]));
    results.push(summarize(kind, LIFECYCLE_PHASES[3], &detail, &release));
    if !release.is_complete() {
        // The failing region is still reserved; retry it with the rest.
        release_untimed(memory, &ids[release.completed as usize..]);
    }

    results
}

/// Time `count` heap extensions of `pages` pages followed by as many
/// shrinks, after a fixed `preload` growth.
///
/// The boundary is returned to where it started, preload included. If the
/// extension phase stops early only what was actually grown is shrunk.
pub fn run_heap_round_trip(
    memory: &mut dyn MemoryPlatform,
    pages: PageCount,
    count: RegionCount,
    preload: usize,
) -> Result<Vec<Measurement>, MemoryError> {
    let kind = memory.kind();
    let size = pages.bytes();
    let n = u64::from(count.value());
    let start = memory.heap_boundary();

    if preload > 0 {
        let chunk = memory.grow_heap(preload)?;
        if let Err(err) = memory.touch_heap(chunk) {
            memory.shrink_heap(preload)?;
            return Err(err);
        }
    }

    let mut grown: u64 = 0;
    let extend = CycleHarness::new(n).run_fallible(|_| {
        let chunk = memory.grow_heap(size)?;
        grown += 1;
        memory.touch_heap(chunk)
    });

    let mut shrunk: u64 = 0;
    let shrink = CycleHarness::new(grown).run_fallible(|_| {
        memory.shrink_heap(size)?;
        shrunk += 1;
        Ok(())
    });

    let leftover = (grown - shrunk) as usize * size + preload;
    if leftover > 0 {
        memory.shrink_heap(leftover)?;
    }

    let end = memory.heap_boundary();
    if end != start {
        return Err(MemoryError::HeapShrinkFailed {
            delta: leftover,
            reason: format!("boundary {:#x} not restored to {:#x}", end, start),
        });
    }

    let detail = phase_detail(pages, count);
    Ok(vec![
        summarize(kind, HEAP_PHASES[0], &detail, &extend),
        summarize(kind, HEAP_PHASES[1], &detail, &shrink),
    ])
}

/// Region lifecycle followed by the heap round trip on one memory platform.
fn run_platform(
    memory: &mut dyn MemoryPlatform,
    pages: PageCount,
    count: RegionCount,
    preload: usize,
) -> Vec<Measurement> {
    let kind = memory.kind();
    let mut results = run_region_lifecycle(memory, pages, count);
    match run_heap_round_trip(memory, pages, count, preload) {
        Ok(heap) => results.extend(heap),
        Err(err) => {
            tracing::error!(domain = %kind, error = %err, "Heap round trip failed");
            let detail = phase_detail(pages, count);
            results.extend(HEAP_PHASES.iter().map(|phase| {
                Measurement::skipped(phase_label(kind, phase), &err).with_detail(detail.clone())
            }));
        }
    }
    results
}

/// Run the whole memory-management benchmark on ordinary memory, then
/// inside `domain`.
pub fn run_memory_management<D: IsolatedDomain>(
    session: &mut BenchmarkSession,
    domain: &mut D,
    pages: PageCount,
    count: RegionCount,
) -> BenchResult<()> {
    let preload = session.config().memory_management.heap_preload_bytes;
    tracing::debug!(pages = pages.value(), count = count.value(), "Memory management benchmark");

    let mut ordinary = ProcessMemory::process();
    for measurement in run_platform(&mut ordinary, pages, count, preload) {
        session.record(measurement);
    }

    let isolated = domain.run_inside(|memory| run_platform(memory, pages, count, preload));
    for measurement in isolated {
        session.record(measurement);
    }

    let leaked = domain.memory().live_regions();
    if leaked > 0 {
        tracing::warn!(domain = %domain.id(), regions = leaked, "Regions left reserved after benchmark");
    }
    Ok(())
}
