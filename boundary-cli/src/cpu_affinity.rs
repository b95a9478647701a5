// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CPU pinning for the benchmark process.
//!
//! Pinning keeps the whole run on one core so cycle counts are not skewed
//! by migrations between cores with unsynchronized counters.

use nix::sched::{sched_setaffinity, CpuSet};
use nix::unistd::Pid;
use thiserror::Error;

/// Errors raised while pinning the process.
#[derive(Debug, Error)]
pub enum AffinityError {
    #[error("CPU {cpu} does not exist ({available} CPUs available)")]
    OutOfRange { cpu: usize, available: usize },

    #[error("sched_setaffinity failed: {0}")]
    Pin(#[from] nix::Error),
}

/// Pin the calling thread to `cpu`. Called before any other thread exists,
/// this pins the whole process.
///
/// Returns the CPU the thread is running on afterwards, if the kernel
/// reports one.
pub fn pin_current_process(cpu: usize) -> Result<Option<usize>, AffinityError> {
    let available = num_cpus::get();
    if cpu >= available {
        return Err(AffinityError::OutOfRange { cpu, available });
    }

    let mut cpuset = CpuSet::new();
    cpuset.set(cpu)?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)?;

    tracing::debug!(cpu = cpu, "Process pinned to CPU");
    Ok(current_cpu())
}

/// The CPU the calling thread is running on.
pub fn current_cpu() -> Option<usize> {
    // SAFETY: sched_getcpu has no preconditions.
    let cpu = unsafe { libc::sched_getcpu() };
    usize::try_from(cpu).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_cpu_rejected() {
        let available = num_cpus::get();
        assert!(matches!(
            pin_current_process(available),
            Err(AffinityError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_current_cpu_reported() {
        assert!(current_cpu().is_some());
    }

    #[test]
    fn test_pin_current_process() {
        // May fail in restricted environments, but must not panic.
        match pin_current_process(0) {
            Ok(now) => {
                if let Some(cpu) = now {
                    assert_eq!(cpu, 0);
                }
            }
            Err(e) => println!("Pin failed (expected in restricted environments): {}", e),
        }
    }
}
