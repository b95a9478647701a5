//! Heap boundaries that can be moved forward and back.
//!
//! The ordinary domain moves the process program break. The isolated
//! domain owns a private `PROT_NONE` reservation whose committed prefix
//! grows and shrinks with the boundary.

use std::ptr::NonNull;

use super::mapping;
use super::Protection;
use crate::error::MemoryError;

/// A range handed out by a heap extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapChunk {
    pub base: usize,
    pub len: usize,
}

impl HeapChunk {
    pub fn end(&self) -> usize {
        self.base + self.len
    }
}

/// A movable heap boundary.
pub trait Heap {
    /// Current boundary address.
    fn boundary(&self) -> usize;

    /// Move the boundary forward by `delta`; returns the new range.
    fn grow(&mut self, delta: usize) -> Result<HeapChunk, MemoryError>;

    /// Move the boundary back by `delta`; returns the new boundary.
    fn shrink(&mut self, delta: usize) -> Result<usize, MemoryError>;

    /// Whether `chunk` lies entirely below the boundary and is writable.
    fn contains(&self, chunk: HeapChunk) -> bool;
}

/// The process program break (`sbrk`).
///
/// The allocator shares the break, so the break must not be moved while
/// allocation may happen between a grow and its matching shrink.
#[derive(Debug)]
pub struct ProgramBreak {
    origin: usize,
}

impl ProgramBreak {
    pub fn new() -> Self {
        Self {
            origin: current_break(),
        }
    }
}

impl Default for ProgramBreak {
    fn default() -> Self {
        Self::new()
    }
}

fn current_break() -> usize {
    // SAFETY: sbrk(0) only queries the break.
    unsafe { libc::sbrk(0) as usize }
}

fn sbrk_failed(ptr: *mut libc::c_void) -> bool {
    ptr as usize == usize::MAX
}

/// errno of the last failed call, read without allocating.
fn last_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

// Errors below are built while the break may be displaced: no `String`s.
impl Heap for ProgramBreak {
    fn boundary(&self) -> usize {
        current_break()
    }

    fn grow(&mut self, delta: usize) -> Result<HeapChunk, MemoryError> {
        let increment = isize::try_from(delta).map_err(|_| MemoryError::BreakMoveFailed {
            direction: "grow",
            delta,
            reason: "delta exceeds isize",
            errno: 0,
        })?;

        // SAFETY: moving the break forward only adds memory to the process.
        let previous = unsafe { libc::sbrk(increment) };
        if sbrk_failed(previous) {
            return Err(MemoryError::BreakMoveFailed {
                direction: "grow",
                delta,
                reason: "sbrk failed",
                errno: last_errno(),
            });
        }

        Ok(HeapChunk {
            base: previous as usize,
            len: delta,
        })
    }

    fn shrink(&mut self, delta: usize) -> Result<usize, MemoryError> {
        let decrement = isize::try_from(delta).map_err(|_| MemoryError::BreakMoveFailed {
            direction: "shrink",
            delta,
            reason: "delta exceeds isize",
            errno: 0,
        })?;

        if current_break().saturating_sub(delta) < self.origin {
            return Err(MemoryError::BreakMoveFailed {
                direction: "shrink",
                delta,
                reason: "would move the break below its starting point",
                errno: 0,
            });
        }

        // SAFETY: the range being returned lies above `origin`, i.e. it was
        // added by `grow` and nothing else references it.
        let previous = unsafe { libc::sbrk(-decrement) };
        if sbrk_failed(previous) {
            return Err(MemoryError::BreakMoveFailed {
                direction: "shrink",
                delta,
                reason: "sbrk failed",
                errno: last_errno(),
            });
        }

        Ok(current_break())
    }

    fn contains(&self, chunk: HeapChunk) -> bool {
        chunk.base >= self.origin && chunk.end() <= current_break()
    }
}

/// Private heap of the isolated domain.
///
/// `capacity` bytes of address space are reserved up front; the committed
/// prefix `[base, base + committed)` is readable and writable and always
/// covers `[base, base + brk)` rounded up to a page.
#[derive(Debug)]
pub struct ReservedHeap {
    base: NonNull<u8>,
    capacity: usize,
    brk: usize,
    committed: usize,
}

impl ReservedHeap {
    /// Reserve `capacity` bytes and commit the first `initial` bytes.
    pub fn new(capacity: usize, initial: usize) -> Result<Self, MemoryError> {
        let capacity = mapping::page_align_up(capacity);
        if capacity == 0 {
            return Err(MemoryError::ZeroSize);
        }

        let base = mapping::map_anonymous(capacity, Protection::empty(), true).map_err(|reason| {
            MemoryError::ReserveFailed {
                size: capacity,
                reason,
            }
        })?;

        let mut heap = Self {
            base,
            capacity,
            brk: 0,
            committed: 0,
        };
        if initial > 0 {
            heap.grow(initial)?;
        }

        tracing::debug!(capacity = capacity, initial = initial, "Reserved isolated heap");
        Ok(heap)
    }

    /// Bytes between the heap base and the boundary.
    pub fn used(&self) -> usize {
        self.brk
    }

    /// Total reservable bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn at(&self, offset: usize) -> NonNull<u8> {
        // SAFETY: offset <= capacity, so the pointer stays within the reservation.
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(offset)) }
    }
}

impl Heap for ReservedHeap {
    fn boundary(&self) -> usize {
        self.base.as_ptr() as usize + self.brk
    }

    fn grow(&mut self, delta: usize) -> Result<HeapChunk, MemoryError> {
        let new_brk = self
            .brk
            .checked_add(delta)
            .filter(|end| *end <= self.capacity)
            .ok_or_else(|| MemoryError::HeapGrowFailed {
                delta,
                reason: format!(
                    "heap capacity exhausted ({} of {} bytes used)",
                    self.brk, self.capacity
                ),
            })?;

        let target = mapping::page_align_up(new_brk);
        if target > self.committed {
            // SAFETY: [committed, target) lies inside our reservation and is
            // not referenced by anyone yet.
            unsafe {
                mapping::protect(
                    self.at(self.committed),
                    target - self.committed,
                    Protection::READ | Protection::WRITE,
                )
            }
            .map_err(|reason| MemoryError::HeapGrowFailed { delta, reason })?;
            self.committed = target;
        }

        let chunk = HeapChunk {
            base: self.boundary(),
            len: delta,
        };
        self.brk = new_brk;
        Ok(chunk)
    }

    fn shrink(&mut self, delta: usize) -> Result<usize, MemoryError> {
        let new_brk = self
            .brk
            .checked_sub(delta)
            .ok_or_else(|| MemoryError::HeapShrinkFailed {
                delta,
                reason: format!("only {} bytes in use", self.brk),
            })?;

        let target = mapping::page_align_up(new_brk);
        if target < self.committed {
            let len = self.committed - target;
            // SAFETY: [target, committed) is above the new boundary; chunks
            // handed out for it are no longer valid per `contains`.
            unsafe {
                mapping::discard(self.at(target), len)
                    .and_then(|_| mapping::protect(self.at(target), len, Protection::empty()))
            }
            .map_err(|reason| MemoryError::HeapShrinkFailed { delta, reason })?;
            self.committed = target;
        }

        self.brk = new_brk;
        Ok(self.boundary())
    }

    fn contains(&self, chunk: HeapChunk) -> bool {
        let start = self.base.as_ptr() as usize;
        chunk.base >= start && chunk.end() <= self.boundary()
    }
}

impl Drop for ReservedHeap {
    fn drop(&mut self) {
        // SAFETY: base/capacity describe the mapping created in `new`.
        if let Err(reason) = unsafe { mapping::unmap(self.base, self.capacity) } {
            tracing::error!(error = %reason, "Failed to unmap isolated heap");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PAGE_SIZE;

    #[test]
    fn test_reserved_heap_round_trip() {
        let mut heap = ReservedHeap::new(16 * PAGE_SIZE, 0).unwrap();
        let start = heap.boundary();

        let chunk = heap.grow(3 * PAGE_SIZE).unwrap();
        assert_eq!(chunk.base, start);
        assert_eq!(heap.boundary(), start + 3 * PAGE_SIZE);
        assert!(heap.contains(chunk));

        unsafe { mapping::touch_pages(chunk.base as *mut u8, chunk.len) };

        heap.shrink(3 * PAGE_SIZE).unwrap();
        assert_eq!(heap.boundary(), start);
        assert!(!heap.contains(chunk));
    }

    #[test]
    fn test_reserved_heap_capacity_enforced() {
        let mut heap = ReservedHeap::new(4 * PAGE_SIZE, PAGE_SIZE).unwrap();
        assert_eq!(heap.used(), PAGE_SIZE);
        assert!(heap.grow(3 * PAGE_SIZE).is_ok());
        assert!(matches!(
            heap.grow(1),
            Err(MemoryError::HeapGrowFailed { .. })
        ));
    }

    #[test]
    fn test_reserved_heap_shrink_below_base_rejected() {
        let mut heap = ReservedHeap::new(4 * PAGE_SIZE, 0).unwrap();
        heap.grow(PAGE_SIZE).unwrap();
        assert!(matches!(
            heap.shrink(2 * PAGE_SIZE),
            Err(MemoryError::HeapShrinkFailed { .. })
        ));
        assert_eq!(heap.used(), PAGE_SIZE);
    }

    #[test]
    fn test_program_break_errors_are_static() {
        let mut brk = ProgramBreak::new();
        let err = brk.shrink(usize::MAX).unwrap_err();
        assert!(matches!(
            err,
            MemoryError::BreakMoveFailed {
                direction: "shrink",
                errno: 0,
                ..
            }
        ));

        let err = brk.grow(usize::MAX).unwrap_err();
        assert!(matches!(
            err,
            MemoryError::BreakMoveFailed {
                direction: "grow",
                reason: "delta exceeds isize",
                ..
            }
        ));
    }

    #[test]
    fn test_reserved_heap_unaligned_deltas() {
        let mut heap = ReservedHeap::new(8 * PAGE_SIZE, 0).unwrap();
        let start = heap.boundary();
        let a = heap.grow(100).unwrap();
        let b = heap.grow(PAGE_SIZE).unwrap();
        assert_eq!(b.base, a.end());
        unsafe { mapping::touch_pages(b.base as *mut u8, b.len) };
        heap.shrink(PAGE_SIZE).unwrap();
        heap.shrink(100).unwrap();
        assert_eq!(heap.boundary(), start);
    }
}
