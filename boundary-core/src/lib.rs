//! boundary-bench core library
//!
//! Cycle clock, deterministic access patterns, memory platforms for the
//! ordinary and isolated domains, and the isolation backend the benchmark
//! harnesses are written against.

pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod memory;
pub mod pattern;
pub mod types;

// Re-export commonly used types
pub use clock::{measure, Clock, TimingSample};
pub use config::{BenchConfig, ConfigLoader, DomainConfig};
pub use domain::{
    CallShape, Direction, DomainId, EmulatedDomain, EmulatedPlatform, IsolatedDomain,
    IsolationPlatform, PlatformStatus,
};
pub use error::{AccessError, BenchError, BenchResult, DomainError, MemoryError, UsageError};
pub use memory::{
    HeapChunk, IsolatedMemory, MemoryPlatform, MemoryRegion, ProcessMemory, Protection, RegionId,
};
pub use pattern::{PatternAlgorithm, PatternGenerator};
pub use types::{
    AccessWidth, CpuAffinity, DomainKind, LoopCount, PageCount, RegionCount, MIB, PAGE_SIZE,
};
