// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Isolated execution domains.
//!
//! The isolation platform is an external collaborator: it creates a domain
//! (or fails with a platform status), carries synchronous calls across the
//! boundary in both directions, and exposes the domain's memory. Harnesses
//! are written against the traits here; `EmulatedPlatform` is the in-process
//! backend shipped with the tool.

mod calls;
mod emulated;

use std::fmt;

pub use emulated::{EmulatedDomain, EmulatedPlatform};

use crate::error::DomainError;
use crate::memory::MemoryPlatform;

/// Argument shape of a boundary call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallShape {
    /// No arguments.
    Void,
    /// Caller buffer copied into the callee.
    In,
    /// Callee buffer copied back to the caller.
    Out,
    /// Copied in, then copied back.
    InOut,
}

impl CallShape {
    /// All shapes in reporting order.
    pub const ALL: [CallShape; 4] = [
        CallShape::Void,
        CallShape::In,
        CallShape::Out,
        CallShape::InOut,
    ];

    /// Position in dispatch tables.
    pub fn index(self) -> usize {
        match self {
            CallShape::Void => 0,
            CallShape::In => 1,
            CallShape::Out => 2,
            CallShape::InOut => 3,
        }
    }

    /// Whether the call carries a buffer.
    pub fn has_buffer(self) -> bool {
        !matches!(self, CallShape::Void)
    }
}

impl fmt::Display for CallShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallShape::Void => write!(f, "void"),
            CallShape::In => write!(f, "in"),
            CallShape::Out => write!(f, "out"),
            CallShape::InOut => write!(f, "inout"),
        }
    }
}

/// Direction of a boundary call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Outer domain calling into the isolated domain.
    IntoDomain,
    /// Isolated domain calling out to the outer domain.
    OutOfDomain,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::IntoDomain => write!(f, "call-in"),
            Direction::OutOfDomain => write!(f, "call-out"),
        }
    }
}

/// Identifier of a live domain, unique per platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DomainId(pub u64);

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Status reported by a platform when domain creation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformStatus {
    Unexpected,
    InvalidParameter,
    OutOfMemory,
    DomainLost,
    InvalidImage,
    InvalidDomainId,
    InvalidSignature,
    OutOfProtectedMemory,
    NoDevice,
    MemoryMapConflict,
    InvalidMetadata,
    DeviceBusy,
    InvalidVersion,
    NotAuthorized,
    ImageAccess,
    /// A code with no known mapping.
    Other(u32),
}

impl PlatformStatus {
    /// Map a raw platform code.
    pub fn from_code(code: u32) -> Self {
        match code {
            0x0001 => Self::Unexpected,
            0x0002 => Self::InvalidParameter,
            0x0003 => Self::OutOfMemory,
            0x0004 => Self::DomainLost,
            0x2001 => Self::InvalidImage,
            0x2002 => Self::InvalidDomainId,
            0x2003 => Self::InvalidSignature,
            0x2005 => Self::OutOfProtectedMemory,
            0x2006 => Self::NoDevice,
            0x2007 => Self::MemoryMapConflict,
            0x2009 => Self::InvalidMetadata,
            0x200c => Self::DeviceBusy,
            0x200d => Self::InvalidVersion,
            0x2008 => Self::NotAuthorized,
            0x200f => Self::ImageAccess,
            other => Self::Other(other),
        }
    }

    /// Human readable description.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Unexpected => "Unexpected error occurred.",
            Self::InvalidParameter => "Invalid parameter.",
            Self::OutOfMemory => "Out of memory.",
            Self::DomainLost => "Power transition occurred.",
            Self::InvalidImage => "Invalid domain image.",
            Self::InvalidDomainId => "Invalid domain identification.",
            Self::InvalidSignature => "Invalid domain signature.",
            Self::OutOfProtectedMemory => "Out of protected memory.",
            Self::NoDevice => "Invalid isolation device.",
            Self::MemoryMapConflict => "Memory map conflicted.",
            Self::InvalidMetadata => "Invalid domain metadata.",
            Self::DeviceBusy => "Isolation device was busy.",
            Self::InvalidVersion => "Domain version was invalid.",
            Self::NotAuthorized => "Domain was not authorized.",
            Self::ImageAccess => "Can't open domain image.",
            Self::Other(_) => "Unknown platform error.",
        }
    }

    /// Remedy to show alongside the message, where one is known.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::DomainLost => {
                Some("The domain was lost across a power transition; recreate it and retry.")
            }
            Self::NoDevice => Some(
                "Please make sure the isolation platform is enabled in the BIOS, and install its driver afterwards.",
            ),
            _ => None,
        }
    }
}

impl fmt::Display for PlatformStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(code) => write!(
                f,
                "Error code is {:#X}. Please refer to the platform developer reference for more details.",
                code
            ),
            status => write!(f, "{}", status.message()),
        }
    }
}

/// An initialized isolated domain. Owning a value is owning the handle:
/// calls require `&mut self`, and `destroy` consumes it.
pub trait IsolatedDomain {
    /// Platform identifier of this domain.
    fn id(&self) -> DomainId;

    /// One synchronous call into the domain with `buffer` marshalled per `shape`.
    fn call_in(&mut self, shape: CallShape, buffer: &mut [i64]);

    /// One call into the domain that itself performs `loops` calls back out,
    /// each carrying a `len`-element buffer marshalled per `shape`.
    fn call_out_loop(&mut self, shape: CallShape, loops: u64, len: usize) -> Result<(), DomainError>;

    /// Enter the domain once and run `work` against the domain's memory.
    fn run_inside<R>(&mut self, work: impl FnOnce(&mut dyn MemoryPlatform) -> R) -> R;

    /// The domain's memory, for inspection from the outside.
    fn memory(&self) -> &dyn MemoryPlatform;

    /// Tear the domain down. The handle cannot be used afterwards.
    fn destroy(self) -> Result<(), DomainError>
    where
        Self: Sized;
}

/// Creates isolated domains.
pub trait IsolationPlatform {
    type Domain: IsolatedDomain;

    /// Short platform name for reports.
    fn name(&self) -> &'static str;

    /// Load, verify and initialize a new domain.
    fn create_domain(&self) -> Result<Self::Domain, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_indices_are_distinct() {
        let indices: Vec<usize> = CallShape::ALL.iter().map(|s| s.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(PlatformStatus::from_code(0x2006), PlatformStatus::NoDevice);
        assert_eq!(PlatformStatus::from_code(0xdead), PlatformStatus::Other(0xdead));
        assert!(PlatformStatus::NoDevice
            .suggestion()
            .unwrap()
            .contains("enabled"));
    }

    #[test]
    fn test_unknown_status_display() {
        let text = PlatformStatus::Other(0x1234).to_string();
        assert!(text.contains("0x1234"));
    }
}
