//! Thin wrappers over the `mman` system calls.
//!
//! All unsafe calls into libc live here; callers get `Result<_, String>`
//! with the OS error rendered in, and wrap it into a `MemoryError` with the
//! region or heap context they own.

use std::ptr::NonNull;

use super::Protection;
use crate::types::PAGE_SIZE;

fn last_os_error() -> String {
    std::io::Error::last_os_error().to_string()
}

/// Round `value` up to the next page boundary.
pub(crate) fn page_align_up(value: usize) -> usize {
    value.div_ceil(PAGE_SIZE) * PAGE_SIZE
}

/// Map `size` bytes of private anonymous memory.
///
/// With `reserve_only` the mapping is `MAP_NORESERVE`: address space is
/// claimed but no swap is accounted until pages are made accessible.
pub(crate) fn map_anonymous(
    size: usize,
    protection: Protection,
    reserve_only: bool,
) -> Result<NonNull<u8>, String> {
    let mut flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
    if reserve_only {
        flags |= libc::MAP_NORESERVE;
    }

    // SAFETY: anonymous mapping with a null hint; no existing memory is affected.
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            size,
            protection.to_libc(),
            flags,
            -1,
            0,
        )
    };

    if ptr == libc::MAP_FAILED {
        return Err(format!("mmap failed: {}", last_os_error()));
    }

    NonNull::new(ptr as *mut u8).ok_or_else(|| "mmap returned null".to_string())
}

/// Change the protection of `[ptr, ptr + len)`.
///
/// # Safety
/// The range must lie inside a mapping owned by the caller, and no live
/// reference may rely on access that the new protection removes.
pub(crate) unsafe fn protect(ptr: NonNull<u8>, len: usize, protection: Protection) -> Result<(), String> {
    if libc::mprotect(ptr.as_ptr() as *mut libc::c_void, len, protection.to_libc()) != 0 {
        return Err(format!("mprotect failed: {}", last_os_error()));
    }
    Ok(())
}

/// Drop the backing pages of `[ptr, ptr + len)`.
///
/// # Safety
/// The range must lie inside a private anonymous mapping owned by the caller.
pub(crate) unsafe fn discard(ptr: NonNull<u8>, len: usize) -> Result<(), String> {
    if libc::madvise(ptr.as_ptr() as *mut libc::c_void, len, libc::MADV_DONTNEED) != 0 {
        return Err(format!("madvise failed: {}", last_os_error()));
    }
    Ok(())
}

/// Unmap `[ptr, ptr + len)`.
///
/// # Safety
/// The range must be a mapping owned by the caller with no outstanding references.
pub(crate) unsafe fn unmap(ptr: NonNull<u8>, len: usize) -> Result<(), String> {
    if libc::munmap(ptr.as_ptr() as *mut libc::c_void, len) != 0 {
        return Err(format!("munmap failed: {}", last_os_error()));
    }
    Ok(())
}

/// Write one byte into every page of `[ptr, ptr + len)` to force commitment.
///
/// # Safety
/// The range must be mapped writable and owned by the caller.
pub(crate) unsafe fn touch_pages(ptr: *mut u8, len: usize) {
    let mut offset = 0;
    while offset < len {
        std::ptr::write_volatile(ptr.add(offset), b'a');
        offset += PAGE_SIZE;
    }
}
