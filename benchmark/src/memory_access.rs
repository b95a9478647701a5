// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Memory-access harness.
//!
//! For each region size the region is filled once, then a sequential and a
//! random increment pass of the same access volume are timed. The same
//! round runs on ordinary memory, on isolated memory from inside the
//! domain, and optionally from inside the domain on ordinary memory.

use std::hint::black_box;
use std::num::NonZeroUsize;

use boundary_core::{
    AccessError, AccessWidth, BenchError, BenchResult, Clock, IsolatedDomain, MemoryPlatform,
    PatternGenerator, ProcessMemory, MIB,
};

use crate::metrics::{Comparison, Measurement, Ratio};
use crate::session::BenchmarkSession;

/// A region viewed at the granularity of one access.
#[derive(Debug)]
pub enum AccessView<'a> {
    Bytes(&'a mut [u8]),
    Words(&'a mut [u32]),
    /// `step` consecutive 8-byte words per block.
    Blocks { qwords: &'a mut [u64], step: usize },
}

impl<'a> AccessView<'a> {
    /// View `bytes` for `width`-sized accesses. The region must hold at
    /// least one access position and be aligned for the element type.
    pub fn new(bytes: &'a mut [u8], width: AccessWidth) -> Result<Self, AccessError> {
        let region = bytes.len();
        check_fits(region, width)?;

        match width {
            AccessWidth::Byte => Ok(AccessView::Bytes(bytes)),
            AccessWidth::Word => {
                // SAFETY: every bit pattern is a valid u32.
                let (prefix, words, _) = unsafe { bytes.align_to_mut::<u32>() };
                if !prefix.is_empty() {
                    return Err(AccessError::Misaligned { width: 4 });
                }
                Ok(AccessView::Words(words))
            }
            AccessWidth::Block(_) => {
                // SAFETY: every bit pattern is a valid u64.
                let (prefix, qwords, _) = unsafe { bytes.align_to_mut::<u64>() };
                if !prefix.is_empty() {
                    return Err(AccessError::Misaligned { width: 8 });
                }
                let step = width.qwords();
                let blocks = qwords.len() / step;
                Ok(AccessView::Blocks {
                    qwords: &mut qwords[..blocks * step],
                    step,
                })
            }
        }
    }

    /// Number of distinct access positions.
    pub fn positions(&self) -> usize {
        match self {
            AccessView::Bytes(bytes) => bytes.len(),
            AccessView::Words(words) => words.len(),
            AccessView::Blocks { qwords, step } => qwords.len() / step,
        }
    }

    /// Visit `accesses` positions in index order, wrapping at the end.
    pub fn sequential_pass(&mut self, accesses: usize) {
        match self {
            AccessView::Bytes(bytes) => sequential(&mut bytes[..], accesses, 1),
            AccessView::Words(words) => sequential(&mut words[..], accesses, 1),
            AccessView::Blocks { qwords, step } => sequential(&mut qwords[..], accesses, *step),
        }
    }

    /// Visit `accesses` positions drawn from `generator`, with replacement.
    pub fn random_pass(&mut self, accesses: usize, generator: &mut PatternGenerator) {
        let Some(positions) = NonZeroUsize::new(self.positions()) else {
            return;
        };
        match self {
            AccessView::Bytes(bytes) => {
                for _ in 0..accesses {
                    let pos = generator.next_index(positions);
                    bytes[pos] = bytes[pos].wrapping_add(1);
                }
                black_box(bytes);
            }
            AccessView::Words(words) => {
                for _ in 0..accesses {
                    let pos = generator.next_index(positions);
                    words[pos] = words[pos].wrapping_add(1);
                }
                black_box(words);
            }
            AccessView::Blocks { qwords, step } => {
                let step = *step;
                for _ in 0..accesses {
                    let base = generator.next_index(positions) * step;
                    for qword in &mut qwords[base..base + step] {
                        *qword = qword.wrapping_add(1);
                    }
                }
                black_box(qwords);
            }
        }
    }
}

/// Element types a pass can increment.
trait Counter: Copy {
    fn bump(self) -> Self;
}

impl Counter for u8 {
    #[inline(always)]
    fn bump(self) -> Self {
        self.wrapping_add(1)
    }
}

impl Counter for u32 {
    #[inline(always)]
    fn bump(self) -> Self {
        self.wrapping_add(1)
    }
}

impl Counter for u64 {
    #[inline(always)]
    fn bump(self) -> Self {
        self.wrapping_add(1)
    }
}

/// Increment `accesses` groups of `step` elements, cycling over `elems`.
fn sequential<T: Counter>(elems: &mut [T], accesses: usize, step: usize) {
    let positions = elems.len() / step;
    if positions == 0 {
        return;
    }
    let mut remaining = accesses;
    while remaining > 0 {
        let take = remaining.min(positions);
        for elem in &mut elems[..take * step] {
            *elem = elem.bump();
        }
        remaining -= take;
    }
    black_box(elems);
}

/// Whether a region of `region` bytes holds at least one `width` access.
pub fn check_fits(region: usize, width: AccessWidth) -> Result<(), AccessError> {
    if region < width.bytes() {
        return Err(AccessError::RegionTooSmall {
            region,
            block: width.bytes(),
        });
    }
    Ok(())
}

/// Access positions covering `volume` bytes at `width`.
pub fn access_count(volume: usize, width: AccessWidth) -> usize {
    volume / width.bytes()
}

/// Raw cycle totals of one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassCosts {
    pub sequential: u64,
    pub random: u64,
}

/// Fill `bytes`, then time a sequential and a random pass over it.
///
/// `generator` must already be reset; the sequential pass does not draw
/// from it.
pub fn timed_passes(
    bytes: &mut [u8],
    width: AccessWidth,
    volume: usize,
    generator: &mut PatternGenerator,
) -> Result<PassCosts, AccessError> {
    bytes.fill(1);
    let mut view = AccessView::new(bytes, width)?;
    let accesses = access_count(volume, width);

    let start = Clock::now();
    view.sequential_pass(accesses);
    let stop = Clock::now();
    let sequential = stop.saturating_sub(start);

    let start = Clock::now();
    view.random_pass(accesses, generator);
    let stop = Clock::now();
    let random = stop.saturating_sub(start);

    Ok(PassCosts { sequential, random })
}

/// Reserve a region on `memory`, run one round over it and release it.
pub fn access_round(
    memory: &mut dyn MemoryPlatform,
    size: usize,
    width: AccessWidth,
    volume: usize,
    generator: &mut PatternGenerator,
) -> BenchResult<PassCosts> {
    let id = memory.reserve(size)?;
    let costs = memory
        .region_bytes(id)
        .map_err(BenchError::from)
        .and_then(|bytes| timed_passes(bytes, width, volume, generator).map_err(BenchError::from));
    let released = memory.release(id);

    let costs = costs?;
    released?;
    Ok(costs)
}

/// Like `access_round`, but the passes run inside `domain` over a region
/// owned by the ordinary domain.
fn shared_round<D: IsolatedDomain>(
    outer: &mut ProcessMemory,
    domain: &mut D,
    size: usize,
    width: AccessWidth,
    volume: usize,
    generator: &mut PatternGenerator,
) -> BenchResult<PassCosts> {
    let id = outer.reserve(size)?;
    let costs = match outer.region_bytes(id) {
        Ok(bytes) => domain
            .run_inside(|_| timed_passes(bytes, width, volume, generator))
            .map_err(BenchError::from),
        Err(err) => Err(err.into()),
    };
    let released = outer.release(id);

    let costs = costs?;
    released?;
    Ok(costs)
}

/// Keep the costs of a round, logging why it was lost otherwise.
fn settle(side: &str, round: BenchResult<PassCosts>) -> Option<PassCosts> {
    match round {
        Ok(costs) => Some(costs),
        Err(BenchError::Access(err)) => {
            tracing::warn!(side = side, error = %err, "Access round skipped");
            None
        }
        Err(err) => {
            tracing::error!(side = side, error = %err, "Access round failed");
            None
        }
    }
}

fn compare(label: &str, detail: &str, measured: Option<PassCosts>, baseline: Option<PassCosts>) -> Comparison {
    Comparison {
        label: label.to_string(),
        detail: detail.to_string(),
        sequential: Ratio::new(measured.map(|c| c.sequential), baseline.map(|c| c.sequential)),
        random: Ratio::new(measured.map(|c| c.random), baseline.map(|c| c.random)),
    }
}

/// Run every configured block size over every configured region size.
pub fn run_memory_access<D: IsolatedDomain>(
    session: &mut BenchmarkSession,
    domain: &mut D,
) -> BenchResult<()> {
    let access = session.config().memory_access.clone();
    let volume = access.access_volume;
    let mut outer = ProcessMemory::process();
    let algorithm = session.reset_generator().algorithm();
    tracing::debug!(algorithm = %algorithm, seed = access.seed, "Random passes share one generator");

    for &block_size in &access.block_sizes {
        let width = match AccessWidth::from_block_size(block_size) {
            Ok(width) => width,
            Err(err) => {
                tracing::warn!(block_size = block_size, error = %err, "Skipping block size");
                session.record(Measurement::skipped(format!("memory access {}B", block_size), err));
                continue;
            }
        };

        for &size in &access.region_sizes {
            let detail = format!(
                "[ mem_size: {} MB, total_access_size: {} MB, block: {}]",
                size / MIB,
                volume / MIB,
                width
            );

            if let Err(err) = check_fits(size, width) {
                tracing::warn!(size = size, width = %width, error = %err, "Skipping region size");
                session.record(
                    Measurement::skipped(format!("memory access {}", width), err).with_detail(detail),
                );
                continue;
            }

            tracing::debug!(size = size, width = %width, volume = volume, "Memory access round");

            let ordinary = settle(
                "ordinary",
                access_round(&mut outer, size, width, volume, session.reset_generator()),
            );

            let generator = session.reset_generator();
            let isolated = settle(
                "isolated",
                domain.run_inside(|memory| access_round(memory, size, width, volume, generator)),
            );
            session.record(compare("isolated / ordinary / normalized", &detail, isolated, ordinary));

            if access.include_shared_memory {
                let shared = settle(
                    "isolated on ordinary",
                    shared_round(&mut outer, domain, size, width, volume, session.reset_generator()),
                );
                session.record(compare(
                    "isolated on ordinary / ordinary / normalized",
                    &detail,
                    shared,
                    ordinary,
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use boundary_core::PatternAlgorithm;
    use proptest::prelude::*;

    fn width(block: usize) -> AccessWidth {
        AccessWidth::from_block_size(block).unwrap()
    }

    #[test]
    fn test_word_view_positions() {
        let mut backing = vec![0u64; 8];
        // SAFETY: u64 storage viewed as bytes, aligned to 8.
        let bytes = unsafe { std::slice::from_raw_parts_mut(backing.as_mut_ptr() as *mut u8, 64) };
        assert_eq!(AccessView::new(bytes, width(4)).unwrap().positions(), 16);
    }

    #[test]
    fn test_block_view_covers_every_block() {
        let mut backing = vec![0u64; 12];
        // SAFETY: u64 storage viewed as bytes, aligned to 8.
        let bytes = unsafe { std::slice::from_raw_parts_mut(backing.as_mut_ptr() as *mut u8, 96) };
        let mut view = AccessView::new(bytes, width(32)).unwrap();
        assert_eq!(view.positions(), 3);
        view.sequential_pass(3);
        assert_eq!(backing, vec![1u64; 12]);
    }

    #[test]
    fn test_block_view_drops_partial_tail() {
        let mut backing = vec![0u64; 5];
        // SAFETY: u64 storage viewed as bytes, aligned to 8.
        let bytes = unsafe { std::slice::from_raw_parts_mut(backing.as_mut_ptr() as *mut u8, 40) };
        let mut view = AccessView::new(bytes, width(16)).unwrap();
        assert_eq!(view.positions(), 2);
        view.sequential_pass(4);
        assert_eq!(backing, vec![2, 2, 2, 2, 0]);
    }

    #[test]
    fn test_region_too_small() {
        let mut bytes = vec![0u8; 8];
        assert_eq!(
            AccessView::new(&mut bytes, width(64)).unwrap_err(),
            AccessError::RegionTooSmall {
                region: 8,
                block: 64
            }
        );
    }

    #[test]
    fn test_random_pass_consumes_exact_access_count() {
        let mut bytes = vec![0u8; 1024];
        let mut generator = PatternGenerator::new(PatternAlgorithm::Lcg32, 0);
        AccessView::new(&mut bytes, width(1))
            .unwrap()
            .random_pass(200, &mut generator);
        let total: u32 = bytes.iter().map(|&b| u32::from(b)).sum();
        assert_eq!(total, 200);
    }

    #[test]
    fn test_random_pass_is_repeatable() {
        let run = |algorithm| {
            let mut bytes = vec![0u8; 4096];
            let mut generator = PatternGenerator::new(algorithm, 42);
            AccessView::new(&mut bytes, width(1))
                .unwrap()
                .random_pass(10_000, &mut generator);
            bytes
        };
        assert_eq!(run(PatternAlgorithm::Lcg32), run(PatternAlgorithm::Lcg32));
        assert_eq!(run(PatternAlgorithm::ParkMiller), run(PatternAlgorithm::ParkMiller));
    }

    #[test]
    fn test_timed_passes_on_plain_buffer() {
        let mut bytes = vec![0u8; 4096];
        let mut generator = PatternGenerator::new(PatternAlgorithm::Lcg32, 0);
        let costs = timed_passes(&mut bytes, width(1), 8192, &mut generator).unwrap();
        // Filled with 1, then two sequential sweeps and 8192 random increments.
        let total: u64 = bytes.iter().map(|&b| u64::from(b)).sum();
        assert_eq!(total, 4096 + 8192 + 8192);
        assert!(costs.sequential < u64::MAX && costs.random < u64::MAX);
    }

    proptest! {
        #[test]
        fn test_sequential_coverage(len in 1usize..512, volume in 0usize..65_536) {
            let mut counts = vec![0u32; len];
            sequential(&mut counts[..], volume, 1);
            let k = volume / len;
            for &c in &counts {
                prop_assert!(c as usize == k || c as usize == k + 1);
            }
            let total: usize = counts.iter().map(|&c| c as usize).sum();
            prop_assert_eq!(total, volume);
        }

        #[test]
        fn test_sequential_block_coverage(blocks in 1usize..64, step in 1usize..8, volume in 0usize..8192) {
            let mut counts = vec![0u64; blocks * step];
            sequential(&mut counts[..], volume, step);
            let k = volume / blocks;
            for &c in &counts {
                prop_assert!(c as usize == k || c as usize == k + 1);
            }
            let total: usize = counts.iter().map(|&c| c as usize).sum();
            prop_assert_eq!(total, volume * step);
        }

        #[test]
        fn test_sequential_exact_multiple(len in 1usize..256, k in 1usize..8) {
            let mut bytes = vec![0u8; len];
            AccessView::new(&mut bytes, width(1)).unwrap().sequential_pass(k * len);
            prop_assert!(bytes.iter().all(|&b| b as usize == k));
        }
    }
}
