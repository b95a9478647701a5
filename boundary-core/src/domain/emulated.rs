//! In-process emulation of an isolated domain.
//!
//! The domain owns its staging buffers, a bounded reserved-memory pool and
//! a private heap. Calls cross a non-inlined gate and marshal arguments by
//! copy; nothing is encrypted or hardware-protected, so figures measure
//! software boundary overhead only.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use super::calls::{self, INTO_DOMAIN, OUT_OF_DOMAIN};
use super::{CallShape, DomainId, IsolatedDomain, IsolationPlatform, PlatformStatus};
use crate::config::DomainConfig;
use crate::error::{DomainError, MemoryError};
use crate::memory::{IsolatedMemory, MemoryPlatform, ReservedHeap};

/// Platform that creates `EmulatedDomain`s.
#[derive(Debug)]
pub struct EmulatedPlatform {
    config: DomainConfig,
    next_id: AtomicU64,
    live: Arc<AtomicUsize>,
    /// Raw status code every creation fails with, if any.
    fault: Option<u32>,
}

/// Platform code for an absent isolation device.
const NO_DEVICE_CODE: u32 = 0x2006;

impl EmulatedPlatform {
    pub fn new(config: DomainConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(1),
            live: Arc::new(AtomicUsize::new(0)),
            fault: None,
        }
    }

    /// A platform whose device is absent; every creation fails with `NoDevice`.
    pub fn disabled(config: DomainConfig) -> Self {
        Self::failing(config, NO_DEVICE_CODE)
    }

    /// A platform on which every creation fails with the raw status `code`.
    pub fn failing(config: DomainConfig, code: u32) -> Self {
        Self {
            fault: Some(code),
            ..Self::new(config)
        }
    }

    /// Number of domains created and not yet destroyed.
    pub fn live_domains(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

impl IsolationPlatform for EmulatedPlatform {
    type Domain = EmulatedDomain;

    fn name(&self) -> &'static str {
        "emulated"
    }

    fn create_domain(&self) -> Result<EmulatedDomain, DomainError> {
        if let Some(code) = self.fault {
            return Err(DomainError::Create {
                status: PlatformStatus::from_code(code),
            });
        }

        let heap = ReservedHeap::new(self.config.heap_capacity, self.config.heap_min).map_err(
            |err| {
                tracing::debug!(error = %err, "Isolated heap reservation failed");
                let status = match err {
                    MemoryError::ZeroSize => PlatformStatus::InvalidParameter,
                    _ => PlatformStatus::OutOfMemory,
                };
                DomainError::Create { status }
            },
        )?;

        let id = DomainId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.live.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(id = %id, "Created emulated domain");

        Ok(EmulatedDomain {
            id,
            trusted_staging: Vec::new(),
            untrusted_staging: Vec::new(),
            outbound_args: Vec::new(),
            memory: IsolatedMemory::isolated(self.config.reserved_capacity, heap),
            live: Arc::clone(&self.live),
        })
    }
}

/// A live emulated domain.
#[derive(Debug)]
pub struct EmulatedDomain {
    id: DomainId,
    /// Callee-side copies of arguments for calls into the domain.
    trusted_staging: Vec<i64>,
    /// Callee-side copies of arguments for calls out of the domain.
    untrusted_staging: Vec<i64>,
    /// Argument buffer the domain passes on calls out. Kept between calls.
    outbound_args: Vec<i64>,
    memory: IsolatedMemory,
    live: Arc<AtomicUsize>,
}

impl IsolatedDomain for EmulatedDomain {
    fn id(&self) -> DomainId {
        self.id
    }

    fn call_in(&mut self, shape: CallShape, buffer: &mut [i64]) {
        calls::marshal_call(
            shape,
            INTO_DOMAIN[shape.index()],
            buffer,
            &mut self.trusted_staging,
        );
    }

    /// The argument buffer only grows, so a call after one of the same
    /// `len` does not allocate.
    fn call_out_loop(&mut self, shape: CallShape, loops: u64, len: usize) -> Result<(), DomainError> {
        if self.outbound_args.len() < len {
            let extra = len - self.outbound_args.len();
            self.outbound_args
                .try_reserve_exact(extra)
                .map_err(|err| DomainError::Transport {
                    id: self.id.0,
                    reason: format!("argument buffer of {} elements: {}", len, err),
                })?;
            self.outbound_args.resize(len, 0);
        }

        let args = &mut self.outbound_args[..len];
        let staging = &mut self.untrusted_staging;
        calls::enter(|| {
            let target = OUT_OF_DOMAIN[shape.index()];
            for _ in 0..loops {
                calls::marshal_call(shape, target, args, staging);
            }
        });
        Ok(())
    }

    fn run_inside<R>(&mut self, work: impl FnOnce(&mut dyn MemoryPlatform) -> R) -> R {
        let memory = &mut self.memory;
        calls::enter(|| work(memory))
    }

    fn memory(&self) -> &dyn MemoryPlatform {
        &self.memory
    }

    fn destroy(self) -> Result<(), DomainError> {
        let regions = self.memory.live_regions();
        if regions > 0 {
            tracing::warn!(id = %self.id, regions = regions, "Destroying domain with live regions");
        }
        tracing::debug!(id = %self.id, "Destroyed emulated domain");
        Ok(())
    }
}

impl Drop for EmulatedDomain {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DomainKind, PAGE_SIZE};

    fn small_config() -> DomainConfig {
        DomainConfig {
            heap_capacity: 64 * PAGE_SIZE,
            reserved_capacity: 64 * PAGE_SIZE,
            heap_min: PAGE_SIZE,
        }
    }

    #[test]
    fn test_create_and_destroy() {
        let platform = EmulatedPlatform::new(small_config());
        let domain = platform.create_domain().unwrap();
        assert_eq!(platform.live_domains(), 1);
        assert_eq!(domain.memory().kind(), DomainKind::Isolated);
        domain.destroy().unwrap();
        assert_eq!(platform.live_domains(), 0);
    }

    #[test]
    fn test_ids_are_unique() {
        let platform = EmulatedPlatform::new(small_config());
        let a = platform.create_domain().unwrap();
        let b = platform.create_domain().unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_disabled_platform_reports_no_device() {
        let platform = EmulatedPlatform::disabled(small_config());
        let err = platform.create_domain().unwrap_err();
        assert!(matches!(
            err,
            DomainError::Create {
                status: PlatformStatus::NoDevice
            }
        ));
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_failing_platform_maps_raw_code() {
        let platform = EmulatedPlatform::failing(small_config(), 0x2003);
        assert!(matches!(
            platform.create_domain().unwrap_err(),
            DomainError::Create {
                status: PlatformStatus::InvalidSignature
            }
        ));

        let platform = EmulatedPlatform::failing(small_config(), 0xbeef);
        let err = platform.create_domain().unwrap_err();
        assert!(err.to_string().contains("0xBEEF"));
        assert!(err.suggestion().is_none());
        assert_eq!(platform.live_domains(), 0);
    }

    #[test]
    fn test_call_out_buffer_is_retained() {
        let platform = EmulatedPlatform::new(small_config());
        let mut domain = platform.create_domain().unwrap();
        domain.call_out_loop(CallShape::InOut, 1, 128).unwrap();
        let args = domain.outbound_args.as_ptr();
        let staging = domain.untrusted_staging.as_ptr();

        for shape in CallShape::ALL {
            domain.call_out_loop(shape, 10, 128).unwrap();
            domain.call_out_loop(shape, 10, 64).unwrap();
        }
        assert_eq!(domain.outbound_args.as_ptr(), args);
        assert_eq!(domain.untrusted_staging.as_ptr(), staging);
        assert_eq!(domain.outbound_args.len(), 128);
    }

    #[test]
    fn test_zero_heap_capacity_is_invalid_parameter() {
        let mut config = small_config();
        config.heap_capacity = 0;
        config.heap_min = 0;
        let err = EmulatedPlatform::new(config).create_domain().unwrap_err();
        assert!(matches!(
            err,
            DomainError::Create {
                status: PlatformStatus::InvalidParameter
            }
        ));
    }

    #[test]
    fn test_call_in_out_marshals_back() {
        let platform = EmulatedPlatform::new(small_config());
        let mut domain = platform.create_domain().unwrap();
        let mut buffer = vec![3i64; 8];
        domain.call_in(CallShape::Out, &mut buffer);
        assert_eq!(buffer, vec![0; 8]);
    }

    #[test]
    fn test_call_out_loop_zero_length() {
        let platform = EmulatedPlatform::new(small_config());
        let mut domain = platform.create_domain().unwrap();
        for shape in CallShape::ALL {
            domain.call_out_loop(shape, 100, 0).unwrap();
        }
    }

    #[test]
    fn test_run_inside_uses_isolated_memory() {
        let platform = EmulatedPlatform::new(small_config());
        let mut domain = platform.create_domain().unwrap();
        let live = domain.run_inside(|memory| {
            let id = memory.reserve(PAGE_SIZE).unwrap();
            memory.touch_region(id).unwrap();
            memory.live_regions()
        });
        assert_eq!(live, 1);
    }
}
