//! Custom error types for boundary-bench.
//!
//! Explicit enum error types only. No `Box<dyn Error>`, no `anyhow::Result`.
//! Severity is carried by the variant: usage and domain-creation errors are
//! fatal to the process, memory errors are fatal to the phase that raised
//! them, access errors only skip a single measurement.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::PlatformStatus;
use crate::memory::RegionId;

/// Top-level error type for a benchmark run.
#[derive(Debug, Error)]
pub enum BenchError {
    // =========================================================================
    // Fatal - malformed invocation or configuration
    // =========================================================================
    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Fatal - isolated domain could not be established
    // =========================================================================
    #[error("Isolated domain error: {0}")]
    Domain(#[from] DomainError),

    // =========================================================================
    // Fatal to the current phase
    // =========================================================================
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("Failed to allocate {bytes} bytes of scratch memory")]
    Allocation { bytes: usize },

    // =========================================================================
    // Recoverable - measurement skipped
    // =========================================================================
    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid user input, from the command line or from a configuration file.
#[derive(Debug, Error)]
pub enum UsageError {
    #[error("Missing required argument: {argument} ({hint})")]
    MissingArgument {
        argument: &'static str,
        hint: &'static str,
    },

    #[error("Invalid value: {field} = {value} - {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Loop count must be greater than zero")]
    ZeroLoopCount,
}

/// Failures of the isolation platform collaborator.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Failed to create isolated domain: {status}")]
    Create { status: PlatformStatus },

    #[error("Boundary call failed inside domain {id}: {reason}")]
    Transport { id: u64, reason: String },
}

impl DomainError {
    /// Suggestion attached to the underlying platform status, if any.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            DomainError::Create { status } => status.suggestion(),
            _ => None,
        }
    }
}

/// Failures of a memory platform (ordinary or isolated).
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Failed to reserve {size} bytes: {reason}")]
    ReserveFailed { size: usize, reason: String },

    #[error("Reserved-memory capacity exhausted: requested {requested}, available {available}")]
    CapacityExhausted { requested: usize, available: usize },

    #[error("Region {0} is not currently reserved")]
    NotReserved(RegionId),

    #[error("Failed to change protection of region {id}: {reason}")]
    ProtectFailed { id: RegionId, reason: String },

    #[error("Failed to release region {id}: {reason}")]
    ReleaseFailed { id: RegionId, reason: String },

    #[error("Region {id} is not writable with current protection {protection}")]
    NotWritable { id: RegionId, protection: String },

    #[error("Heap growth by {delta} bytes failed: {reason}")]
    HeapGrowFailed { delta: usize, reason: String },

    #[error("Heap shrink by {delta} bytes failed: {reason}")]
    HeapShrinkFailed { delta: usize, reason: String },

    /// Raised while the program break may be displaced, so it carries no
    /// heap-allocated data.
    #[error("Program break {direction} by {delta} bytes failed: {reason} (errno {errno})")]
    BreakMoveFailed {
        direction: &'static str,
        delta: usize,
        reason: &'static str,
        errno: i32,
    },

    #[error("Heap range {base:#x}+{len} is outside the committed heap")]
    HeapRangeInvalid { base: usize, len: usize },

    #[error("Region size must be greater than zero")]
    ZeroSize,
}

/// Unsupported access parameters. Reported, and the measurement skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("Unsupported block size {0}: must be 1, 4 or a multiple of 8")]
    UnsupportedBlockSize(usize),

    #[error("Region of {region} bytes cannot hold a {block}-byte block")]
    RegionTooSmall { region: usize, block: usize },

    #[error("Region base is not aligned for {width}-byte access")]
    Misaligned { width: usize },
}

/// Result type alias using BenchError.
pub type BenchResult<T> = Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_error_display() {
        let err = UsageError::MissingArgument {
            argument: "page_count",
            hint: "memory_management needs page_count and region_count",
        };
        assert!(err.to_string().contains("page_count"));
        assert!(err.to_string().contains("memory_management"));
    }

    #[test]
    fn test_error_chain() {
        let access = AccessError::UnsupportedBlockSize(3);
        let err: BenchError = access.into();
        assert!(matches!(err, BenchError::Access(_)));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn test_domain_error_suggestion() {
        let err = DomainError::Create {
            status: PlatformStatus::NoDevice,
        };
        assert!(err.suggestion().is_some());

        let err = DomainError::Create {
            status: PlatformStatus::OutOfMemory,
        };
        assert!(err.suggestion().is_none());
    }
}
