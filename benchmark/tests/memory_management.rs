// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Memory-management runs, including runs where the platform fails midway.
//!
//! Kept apart from the other harness tests: the ordinary heap phases move
//! the process program break. Test threads allocate from their own arenas,
//! so the break only moves under the harness.

use boundary_benchmark::{
    run_memory_management, run_region_lifecycle, BenchmarkCategory, BenchmarkSession, Measurement,
    Outcome, TextReporter,
};
use boundary_core::memory::ReservedHeap;
use boundary_core::{
    ConfigLoader, DomainKind, EmulatedPlatform, HeapChunk, IsolatedDomain, IsolatedMemory,
    IsolationPlatform, MemoryError, MemoryPlatform, MemoryRegion, PageCount, ProcessMemory,
    Protection, RegionCount, RegionId, PAGE_SIZE,
};

/// Isolated memory whose n-th call of one operation fails once.
struct FlakyMemory {
    inner: IsolatedMemory,
    fail_reserve_at: Option<usize>,
    fail_protect_at: Option<usize>,
    fail_release_at: Option<usize>,
    reserves: usize,
    protects: usize,
    releases: usize,
}

impl FlakyMemory {
    fn new() -> Self {
        let heap = ReservedHeap::new(64 * PAGE_SIZE, PAGE_SIZE).expect("Failed to reserve heap");
        Self {
            inner: IsolatedMemory::isolated(256 * PAGE_SIZE, heap),
            fail_reserve_at: None,
            fail_protect_at: None,
            fail_release_at: None,
            reserves: 0,
            protects: 0,
            releases: 0,
        }
    }
}

impl MemoryPlatform for FlakyMemory {
    fn kind(&self) -> DomainKind {
        self.inner.kind()
    }

    fn reserve(&mut self, size: usize) -> Result<RegionId, MemoryError> {
        self.reserves += 1;
        if self.fail_reserve_at == Some(self.reserves) {
            return Err(MemoryError::ReserveFailed {
                size,
                reason: "injected".to_string(),
            });
        }
        self.inner.reserve(size)
    }

    fn change_protection(&mut self, id: RegionId, protection: Protection) -> Result<(), MemoryError> {
        self.protects += 1;
        if self.fail_protect_at == Some(self.protects) {
            return Err(MemoryError::ProtectFailed {
                id,
                reason: "injected".to_string(),
            });
        }
        self.inner.change_protection(id, protection)
    }

    fn release(&mut self, id: RegionId) -> Result<(), MemoryError> {
        self.releases += 1;
        if self.fail_release_at == Some(self.releases) {
            return Err(MemoryError::ReleaseFailed {
                id,
                reason: "injected".to_string(),
            });
        }
        self.inner.release(id)
    }

    fn region(&self, id: RegionId) -> Result<&MemoryRegion, MemoryError> {
        self.inner.region(id)
    }

    fn region_bytes(&mut self, id: RegionId) -> Result<&mut [u8], MemoryError> {
        self.inner.region_bytes(id)
    }

    fn live_regions(&self) -> usize {
        self.inner.live_regions()
    }

    fn heap_boundary(&self) -> usize {
        self.inner.heap_boundary()
    }

    fn grow_heap(&mut self, delta: usize) -> Result<HeapChunk, MemoryError> {
        self.inner.grow_heap(delta)
    }

    fn shrink_heap(&mut self, delta: usize) -> Result<usize, MemoryError> {
        self.inner.shrink_heap(delta)
    }

    fn touch_heap(&mut self, chunk: HeapChunk) -> Result<(), MemoryError> {
        self.inner.touch_heap(chunk)
    }
}

fn counts(results: &[Measurement]) -> Vec<Option<u64>> {
    results
        .iter()
        .map(|m| m.average().map(|average| average.count()))
        .collect()
}

fn lifecycle_args() -> (PageCount, RegionCount) {
    (
        PageCount::new(1).expect("valid page count"),
        RegionCount::new(10).expect("valid region count"),
    )
}

#[test]
fn test_protect_failure_averages_completed_iterations() {
    let mut memory = FlakyMemory::new();
    memory.fail_protect_at = Some(4);
    let (pages, count) = lifecycle_args();

    let results = run_region_lifecycle(&mut memory, pages, count);

    assert_eq!(counts(&results), vec![Some(10), Some(3), Some(10), Some(10)]);
    assert_eq!(memory.live_regions(), 0);
}

#[test]
fn test_release_failure_releases_the_rest() {
    let mut memory = FlakyMemory::new();
    memory.fail_release_at = Some(6);
    let (pages, count) = lifecycle_args();

    let results = run_region_lifecycle(&mut memory, pages, count);

    assert_eq!(counts(&results), vec![Some(10), Some(10), Some(10), Some(5)]);
    assert_eq!(memory.live_regions(), 0);
    // Five timed, one failed, then five untimed retries.
    assert_eq!(memory.releases, 11);
}

#[test]
fn test_reserve_failure_skips_later_phases() {
    let mut memory = FlakyMemory::new();
    memory.fail_reserve_at = Some(5);
    let (pages, count) = lifecycle_args();

    let results = run_region_lifecycle(&mut memory, pages, count);

    assert_eq!(counts(&results), vec![Some(4), None, None, None]);
    for skipped in &results[1..] {
        match &skipped.outcome {
            Outcome::Skipped(reason) => assert!(reason.contains("reservation failed")),
            Outcome::Measured(_) => panic!("{} should be skipped", skipped.label),
        }
    }
    assert_eq!(memory.protects, 0);
    assert_eq!(memory.live_regions(), 0);

    let line = TextReporter::new().format_measurement(&results[1]);
    assert!(line.contains("skipped: reservation failed"));
}

#[test]
fn test_memory_management_round_trip() {
    let config = ConfigLoader::load_string(
        "memory_management:\n  heap_preload_bytes: 65536\ndomain:\n  heap_capacity_mb: 16\n  reserved_capacity_mb: 16\n",
    )
    .expect("Failed to load config");
    let platform = EmulatedPlatform::new(config.domain.clone());
    let mut domain = platform.create_domain().expect("Failed to create domain");
    let mut session = BenchmarkSession::new(config, BenchmarkCategory::MemoryManagement);

    let pages = PageCount::new(4).expect("valid page count");
    let count = RegionCount::new(100).expect("valid region count");

    let ordinary_before = ProcessMemory::process().heap_boundary();
    let isolated_before = domain.memory().heap_boundary();
    run_memory_management(&mut session, &mut domain, pages, count).expect("benchmark failed");

    assert_eq!(ProcessMemory::process().heap_boundary(), ordinary_before);
    assert_eq!(domain.memory().heap_boundary(), isolated_before);
    assert_eq!(domain.memory().live_regions(), 0);

    let report = session.into_report();
    let labels: Vec<&str> = report.measurements().map(|m| m.label.as_str()).collect();
    assert_eq!(
        labels,
        vec![
            "ordinary reserve",
            "ordinary protect extend",
            "ordinary protect restrict",
            "ordinary release",
            "ordinary heap extend",
            "ordinary heap shrink",
            "isolated reserve",
            "isolated protect extend",
            "isolated protect restrict",
            "isolated release",
            "isolated heap extend",
            "isolated heap shrink",
        ]
    );
    for measurement in report.measurements() {
        let average = measurement.average().expect("every phase measured");
        assert_eq!(average.count(), 100);
        assert_eq!(measurement.detail.as_deref(), Some("[ 4 pages, num: 100]"));
    }

    let lines = TextReporter::new().render(&report);
    assert_eq!(lines.len(), 12);
    assert!(lines.iter().all(|line| line.ends_with(" cycles")));
}
