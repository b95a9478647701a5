// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! All types validate their invariants at creation time, so harness code
//! never has to re-check a zero loop count or a bad block size.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AccessError, UsageError};

/// Page granularity used to size regions and to touch committed memory.
pub const PAGE_SIZE: usize = 4096;

/// One mebibyte.
pub const MIB: usize = 1024 * 1024;

/// Which side of the isolation boundary owns a piece of memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainKind {
    /// Ordinary process memory managed by the host OS.
    Ordinary,
    /// Memory owned by the isolated execution domain.
    Isolated,
}

impl fmt::Display for DomainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainKind::Ordinary => write!(f, "ordinary"),
            DomainKind::Isolated => write!(f, "isolated"),
        }
    }
}

/// Number of pages per region. Must be non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageCount(u32);

impl PageCount {
    /// Create a new PageCount with validation.
    pub fn new(pages: u32) -> Result<Self, UsageError> {
        if pages == 0 {
            return Err(UsageError::InvalidValue {
                field: "page_count",
                value: pages.to_string(),
                reason: "Page count must be greater than 0".to_string(),
            });
        }
        Ok(Self(pages))
    }

    /// Get the inner value.
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Region size in bytes.
    pub fn bytes(&self) -> usize {
        self.0 as usize * PAGE_SIZE
    }
}

impl fmt::Display for PageCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of regions handled per memory-management phase. Must be non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionCount(u32);

impl RegionCount {
    /// Create a new RegionCount with validation.
    pub fn new(count: u32) -> Result<Self, UsageError> {
        if count == 0 {
            return Err(UsageError::InvalidValue {
                field: "region_count",
                value: count.to_string(),
                reason: "Region count must be greater than 0".to_string(),
            });
        }
        Ok(Self(count))
    }

    /// Get the inner value.
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for RegionCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Repetition count of a timed loop. Zero is rejected: the average would be undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoopCount(u64);

impl LoopCount {
    /// Create a new LoopCount with validation.
    pub fn new(loops: u64) -> Result<Self, UsageError> {
        if loops == 0 {
            return Err(UsageError::ZeroLoopCount);
        }
        Ok(Self(loops))
    }

    /// Get the inner value.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Roughly a tenth of the loop count, used to prime caches before timing.
    pub fn warmup(&self) -> u64 {
        self.0 / 10
    }
}

impl fmt::Display for LoopCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// CPU pinning request from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuAffinity {
    /// Leave scheduling to the OS (`-1`).
    Unpinned,
    /// Pin the process to one logical CPU.
    Core(usize),
}

impl CpuAffinity {
    /// Parse the raw command-line value. `-1` means no pinning.
    pub fn from_raw(raw: i64) -> Result<Self, UsageError> {
        match raw {
            -1 => Ok(Self::Unpinned),
            n if n >= 0 => Ok(Self::Core(n as usize)),
            n => Err(UsageError::InvalidValue {
                field: "cpu_affinity",
                value: n.to_string(),
                reason: "Must be a CPU index or -1 for no affinity".to_string(),
            }),
        }
    }
}

/// Granularity of a single mutating access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessWidth {
    /// Increment single bytes.
    Byte,
    /// Increment 4-byte words.
    Word,
    /// Increment `n` bytes per visited position in 8-byte steps (`n % 8 == 0`).
    Block(usize),
}

impl AccessWidth {
    /// Validate a block size in bytes.
    pub fn from_block_size(block_size: usize) -> Result<Self, AccessError> {
        match block_size {
            1 => Ok(Self::Byte),
            4 => Ok(Self::Word),
            n if n > 0 && n % 8 == 0 => Ok(Self::Block(n)),
            n => Err(AccessError::UnsupportedBlockSize(n)),
        }
    }

    /// Bytes touched per visited position.
    pub fn bytes(&self) -> usize {
        match self {
            AccessWidth::Byte => 1,
            AccessWidth::Word => 4,
            AccessWidth::Block(n) => *n,
        }
    }

    /// Number of 8-byte steps per visited position (zero for byte/word access).
    pub fn qwords(&self) -> usize {
        match self {
            AccessWidth::Block(n) => n / 8,
            _ => 0,
        }
    }
}

impl fmt::Display for AccessWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}B", self.bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count_bytes() {
        let pages = PageCount::new(4).unwrap();
        assert_eq!(pages.bytes(), 16 * 1024);
    }

    #[test]
    fn test_zero_counts_rejected() {
        assert!(PageCount::new(0).is_err());
        assert!(RegionCount::new(0).is_err());
        assert!(matches!(LoopCount::new(0), Err(UsageError::ZeroLoopCount)));
    }

    #[test]
    fn test_loop_count_warmup() {
        assert_eq!(LoopCount::new(1_000_000).unwrap().warmup(), 100_000);
        assert_eq!(LoopCount::new(5).unwrap().warmup(), 0);
    }

    #[test]
    fn test_cpu_affinity_parsing() {
        assert_eq!(CpuAffinity::from_raw(-1).unwrap(), CpuAffinity::Unpinned);
        assert_eq!(CpuAffinity::from_raw(3).unwrap(), CpuAffinity::Core(3));
        assert!(CpuAffinity::from_raw(-2).is_err());
    }

    #[test]
    fn test_access_width_dispatch() {
        assert_eq!(AccessWidth::from_block_size(1).unwrap(), AccessWidth::Byte);
        assert_eq!(AccessWidth::from_block_size(4).unwrap(), AccessWidth::Word);
        assert_eq!(
            AccessWidth::from_block_size(64).unwrap(),
            AccessWidth::Block(64)
        );
        assert_eq!(AccessWidth::from_block_size(64).unwrap().qwords(), 8);
    }

    #[test]
    fn test_access_width_rejects_unsupported() {
        for bad in [0, 2, 3, 6, 12, 20] {
            assert_eq!(
                AccessWidth::from_block_size(bad),
                Err(AccessError::UnsupportedBlockSize(bad))
            );
        }
    }
}
