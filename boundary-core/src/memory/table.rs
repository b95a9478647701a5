//! Owned table of live regions.
//!
//! Regions are addressed by generation-checked ids rather than raw
//! pointers, so a stale id (released, or reused slot) is rejected at the API
//! boundary instead of touching memory that is no longer ours.

use std::fmt;
use std::ptr::NonNull;

use super::Protection;
use crate::error::MemoryError;
use crate::types::DomainKind;

/// Opaque handle to a reserved region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId {
    index: u32,
    generation: u32,
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// A reserved region of memory.
#[derive(Debug)]
pub struct MemoryRegion {
    pub(crate) base: NonNull<u8>,
    pub(crate) size: usize,
    pub(crate) protection: Protection,
    pub(crate) owner: DomainKind,
}

impl MemoryRegion {
    /// Base address.
    pub fn base(&self) -> usize {
        self.base.as_ptr() as usize
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Current protection.
    pub fn protection(&self) -> Protection {
        self.protection
    }

    /// Owning domain.
    pub fn owner(&self) -> DomainKind {
        self.owner
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    region: Option<MemoryRegion>,
}

/// Slot table of reserved regions.
#[derive(Debug, Default)]
pub struct RegionTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl RegionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly reserved region.
    pub fn insert(&mut self, region: MemoryRegion) -> RegionId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.region = Some(region);
            return RegionId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            region: Some(region),
        });
        RegionId {
            index,
            generation: 0,
        }
    }

    pub fn get(&self, id: RegionId) -> Result<&MemoryRegion, MemoryError> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.region.as_ref())
            .ok_or(MemoryError::NotReserved(id))
    }

    pub fn get_mut(&mut self, id: RegionId) -> Result<&mut MemoryRegion, MemoryError> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.region.as_mut())
            .ok_or(MemoryError::NotReserved(id))
    }

    /// Stop tracking a region. The id is invalid afterwards.
    pub fn remove(&mut self, id: RegionId) -> Result<MemoryRegion, MemoryError> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation && slot.region.is_some())
            .ok_or(MemoryError::NotReserved(id))?;

        let region = slot.region.take().ok_or(MemoryError::NotReserved(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Ok(region)
    }

    /// Number of regions currently reserved.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Take every remaining region out of the table.
    pub fn drain(&mut self) -> Vec<MemoryRegion> {
        let regions: Vec<MemoryRegion> = self
            .slots
            .iter_mut()
            .filter_map(|slot| {
                let region = slot.region.take()?;
                slot.generation = slot.generation.wrapping_add(1);
                Some(region)
            })
            .collect();
        self.free = (0..self.slots.len() as u32).collect();
        self.live = 0;
        regions
    }
}
