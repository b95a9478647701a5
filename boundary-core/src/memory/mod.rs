// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Memory platforms.
//!
//! A memory platform reserves regions, changes their protection, releases
//! them, and moves a heap boundary. The ordinary platform is plain process
//! memory (`mmap`/`mprotect`/`munmap` and the program break); the isolated
//! platform is memory owned by an isolated domain, with a bounded reserved
//! pool and a private heap.

mod heap;
mod mapping;
mod table;

use bitflags::bitflags;
use std::fmt;

pub use heap::{Heap, HeapChunk, ProgramBreak, ReservedHeap};
pub use table::{MemoryRegion, RegionId, RegionTable};

use crate::error::MemoryError;
use crate::types::{DomainKind, PAGE_SIZE};

bitflags! {
    /// Page permissions of a region.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Protection: u32 {
        const READ = 0x1;
        const WRITE = 0x2;
        const EXEC = 0x4;
    }
}

impl Protection {
    /// Read and write, the protection regions are reserved with.
    pub const READ_WRITE: Self = Self::READ.union(Self::WRITE);

    fn to_libc(self) -> libc::c_int {
        let mut prot = libc::PROT_NONE;
        if self.contains(Self::READ) {
            prot |= libc::PROT_READ;
        }
        if self.contains(Self::WRITE) {
            prot |= libc::PROT_WRITE;
        }
        if self.contains(Self::EXEC) {
            prot |= libc::PROT_EXEC;
        }
        prot
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |bit: Self, c: char| if self.contains(bit) { c } else { '-' };
        write!(
            f,
            "{}{}{}",
            flag(Self::READ, 'r'),
            flag(Self::WRITE, 'w'),
            flag(Self::EXEC, 'x')
        )
    }
}

/// Reservation, protection and heap operations of one domain.
pub trait MemoryPlatform {
    /// Which side of the boundary this memory belongs to.
    fn kind(&self) -> DomainKind;

    /// Reserve `size` bytes, readable and writable.
    fn reserve(&mut self, size: usize) -> Result<RegionId, MemoryError>;

    /// Change the protection of a reserved region.
    fn change_protection(&mut self, id: RegionId, protection: Protection) -> Result<(), MemoryError>;

    /// Release a reserved region. The id is invalid afterwards.
    fn release(&mut self, id: RegionId) -> Result<(), MemoryError>;

    /// Look up a reserved region.
    fn region(&self, id: RegionId) -> Result<&MemoryRegion, MemoryError>;

    /// Mutable bytes of a reserved, writable region.
    fn region_bytes(&mut self, id: RegionId) -> Result<&mut [u8], MemoryError>;

    /// Number of regions currently reserved.
    fn live_regions(&self) -> usize;

    /// Current heap boundary address.
    fn heap_boundary(&self) -> usize;

    /// Move the heap boundary forward.
    fn grow_heap(&mut self, delta: usize) -> Result<HeapChunk, MemoryError>;

    /// Move the heap boundary back; returns the new boundary.
    fn shrink_heap(&mut self, delta: usize) -> Result<usize, MemoryError>;

    /// Write every page of a heap chunk to force commitment.
    fn touch_heap(&mut self, chunk: HeapChunk) -> Result<(), MemoryError>;

    /// Write every page of a region to force commitment.
    fn touch_region(&mut self, id: RegionId) -> Result<(), MemoryError> {
        let bytes = self.region_bytes(id)?;
        for page in bytes.chunks_mut(PAGE_SIZE) {
            page[0] = b'a';
        }
        std::hint::black_box(bytes);
        Ok(())
    }
}

/// Mapped regions plus a heap, shared by both domains.
#[derive(Debug)]
pub struct PlatformMemory<H: Heap> {
    kind: DomainKind,
    regions: RegionTable,
    capacity: Option<usize>,
    reserved: usize,
    heap: H,
}

/// Ordinary process memory.
pub type ProcessMemory = PlatformMemory<ProgramBreak>;

/// Memory owned by an isolated domain.
pub type IsolatedMemory = PlatformMemory<ReservedHeap>;

impl ProcessMemory {
    pub fn process() -> Self {
        Self {
            kind: DomainKind::Ordinary,
            regions: RegionTable::new(),
            capacity: None,
            reserved: 0,
            heap: ProgramBreak::new(),
        }
    }
}

impl IsolatedMemory {
    /// Isolated memory with a bounded reserved pool and a private heap.
    pub fn isolated(reserved_capacity: usize, heap: ReservedHeap) -> Self {
        Self {
            kind: DomainKind::Isolated,
            regions: RegionTable::new(),
            capacity: Some(reserved_capacity),
            reserved: 0,
            heap,
        }
    }
}

impl<H: Heap> PlatformMemory<H> {
    /// Bytes currently reserved across live regions.
    pub fn reserved_bytes(&self) -> usize {
        self.reserved
    }
}

impl<H: Heap> MemoryPlatform for PlatformMemory<H> {
    fn kind(&self) -> DomainKind {
        self.kind
    }

    fn reserve(&mut self, size: usize) -> Result<RegionId, MemoryError> {
        if size == 0 {
            return Err(MemoryError::ZeroSize);
        }

        let mapped = mapping::page_align_up(size);
        if let Some(capacity) = self.capacity {
            let available = capacity.saturating_sub(self.reserved);
            if mapped > available {
                return Err(MemoryError::CapacityExhausted {
                    requested: mapped,
                    available,
                });
            }
        }

        let base = mapping::map_anonymous(mapped, Protection::READ_WRITE, false)
            .map_err(|reason| MemoryError::ReserveFailed { size, reason })?;

        self.reserved += mapped;
        Ok(self.regions.insert(MemoryRegion {
            base,
            size: mapped,
            protection: Protection::READ_WRITE,
            owner: self.kind,
        }))
    }

    fn change_protection(&mut self, id: RegionId, protection: Protection) -> Result<(), MemoryError> {
        let region = self.regions.get_mut(id)?;
        // SAFETY: the region is live in our table; byte slices handed out by
        // `region_bytes` borrow `self` mutably and cannot outlive this call.
        unsafe { mapping::protect(region.base, region.size, protection) }
            .map_err(|reason| MemoryError::ProtectFailed { id, reason })?;
        region.protection = protection;
        Ok(())
    }

    fn release(&mut self, id: RegionId) -> Result<(), MemoryError> {
        let region = self.regions.get(id)?;
        // SAFETY: the region is live in our table and no slice borrows it.
        unsafe { mapping::unmap(region.base, region.size) }
            .map_err(|reason| MemoryError::ReleaseFailed { id, reason })?;

        let region = self.regions.remove(id)?;
        self.reserved -= region.size;
        Ok(())
    }

    fn region(&self, id: RegionId) -> Result<&MemoryRegion, MemoryError> {
        self.regions.get(id)
    }

    fn region_bytes(&mut self, id: RegionId) -> Result<&mut [u8], MemoryError> {
        let region = self.regions.get(id)?;
        if !region.protection.contains(Protection::READ_WRITE) {
            return Err(MemoryError::NotWritable {
                id,
                protection: region.protection.to_string(),
            });
        }
        // SAFETY: the region is mapped read/write for `size` bytes and the
        // returned slice borrows `self`, so it cannot outlive a release.
        Ok(unsafe { std::slice::from_raw_parts_mut(region.base.as_ptr(), region.size) })
    }

    fn live_regions(&self) -> usize {
        self.regions.live()
    }

    fn heap_boundary(&self) -> usize {
        self.heap.boundary()
    }

    fn grow_heap(&mut self, delta: usize) -> Result<HeapChunk, MemoryError> {
        self.heap.grow(delta)
    }

    fn shrink_heap(&mut self, delta: usize) -> Result<usize, MemoryError> {
        self.heap.shrink(delta)
    }

    fn touch_heap(&mut self, chunk: HeapChunk) -> Result<(), MemoryError> {
        if !self.heap.contains(chunk) {
            return Err(MemoryError::HeapRangeInvalid {
                base: chunk.base,
                len: chunk.len,
            });
        }
        // SAFETY: the chunk lies below the boundary of a heap we own.
        unsafe { mapping::touch_pages(chunk.base as *mut u8, chunk.len) };
        Ok(())
    }
}

impl<H: Heap> Drop for PlatformMemory<H> {
    fn drop(&mut self) {
        let leftover = self.regions.drain();
        if leftover.is_empty() {
            return;
        }

        tracing::warn!(
            domain = %self.kind,
            regions = leftover.len(),
            "Releasing regions still reserved at teardown"
        );
        for region in leftover {
            // SAFETY: drained regions are no longer reachable through the table.
            if let Err(reason) = unsafe { mapping::unmap(region.base, region.size) } {
                tracing::error!(domain = %self.kind, error = %reason, "Failed to release region");
            }
        }
    }
}
