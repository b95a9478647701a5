// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Cycle clock.
//!
//! Reads the hardware cycle counter with serialization on both sides of the
//! read, so the bracketed work cannot drift across a `now()` call. On x86_64
//! this is `LFENCE; RDTSC; LFENCE`, on aarch64 `ISB; MRS CNTVCT_EL0; ISB`.
//! Other targets fall back to a monotonic nanosecond counter.

use std::sync::atomic::{compiler_fence, Ordering};

/// Hardware cycle counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Clock;

impl Clock {
    /// Read the counter. Reads taken in program order never decrease.
    #[inline(always)]
    pub fn now() -> u64 {
        compiler_fence(Ordering::SeqCst);
        let value = read_counter();
        compiler_fence(Ordering::SeqCst);
        value
    }

    /// Name of the counter source for the report banner.
    pub fn source() -> &'static str {
        if cfg!(target_arch = "x86_64") {
            "rdtsc"
        } else if cfg!(target_arch = "aarch64") {
            "cntvct_el0"
        } else {
            "monotonic-ns"
        }
    }
}

#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn read_counter() -> u64 {
    let lo: u32;
    let hi: u32;
    // SAFETY: LFENCE and RDTSC are available on every x86_64 CPU and only
    // read the timestamp counter.
    unsafe {
        std::arch::asm!(
            "lfence",
            "rdtsc",
            "lfence",
            out("eax") lo,
            out("edx") hi,
            options(nostack, preserves_flags),
        );
    }
    (u64::from(hi) << 32) | u64::from(lo)
}

#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn read_counter() -> u64 {
    let value: u64;
    // SAFETY: CNTVCT_EL0 is readable from EL0 on Linux; ISB orders the read.
    unsafe {
        std::arch::asm!(
            "isb",
            "mrs {v}, cntvct_el0",
            "isb",
            v = out(reg) value,
            options(nostack, preserves_flags),
        );
    }
    value
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline(always)]
fn read_counter() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

/// A pair of counter readings bracketing one measured unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingSample {
    pub start: u64,
    pub stop: u64,
}

impl TimingSample {
    /// Elapsed cycles. Saturates to zero if the counter stepped backwards
    /// (migration across unsynchronised cores).
    pub fn cost(&self) -> u64 {
        self.stop.saturating_sub(self.start)
    }
}

/// Bracket `f` with two counter reads.
///
/// Anything that must not be measured (allocation, printing, setup) belongs
/// outside the closure.
#[inline(always)]
pub fn measure<F, T>(f: F) -> (T, TimingSample)
where
    F: FnOnce() -> T,
{
    let start = Clock::now();
    let result = f();
    let stop = Clock::now();
    (result, TimingSample { start, stop })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_is_non_decreasing() {
        let mut previous = Clock::now();
        for _ in 0..10_000 {
            let current = Clock::now();
            assert!(current >= previous, "{} < {}", current, previous);
            previous = current;
        }
    }

    #[test]
    fn test_measure_returns_result() {
        let (value, sample) = measure(|| (0..1000u64).sum::<u64>());
        assert_eq!(value, 499_500);
        assert!(sample.stop >= sample.start);
    }

    #[test]
    fn test_sample_cost_saturates() {
        let sample = TimingSample { start: 10, stop: 4 };
        assert_eq!(sample.cost(), 0);
        let sample = TimingSample { start: 4, stop: 10 };
        assert_eq!(sample.cost(), 6);
    }
}
