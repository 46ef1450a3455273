//! The kernel page-mapping primitives backing the arena's overflow path.
//!
//! `spec.md` §5 names the kernel page allocator as the only resource this
//! crate shares across threads; the only two operations it needs from it
//! are an anonymous read-write mapping and its matching unmap, both wrapped
//! here behind `libc` the way the rest of this corpus reaches for `libc`
//! instead of encoding raw syscall numbers.

use crate::header::{round_up, Header};

/// The OS page size, queried once per call — cheap relative to the `mmap`
/// itself and avoids caching a value that could (in principle) differ
/// across threads on unusual platforms.
fn page_size() -> usize {
    let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    sz.max(1) as usize
}

/// Maps `total` bytes (header plus payload) from the OS, rounded up to a
/// whole number of pages, and writes an initialized header at the start of
/// the mapping. Returns `None` if the kernel refuses the mapping.
///
/// # Safety
/// `total` must already account for `HEADER_STRIDE` (i.e. be the output of
/// [`crate::header::total_size_for`]), not a raw payload size.
pub(crate) unsafe fn map_block(total: usize) -> Option<*mut Header> {
    let mapped_bytes = round_up(total, page_size());
    let region = libc::mmap(
        std::ptr::null_mut(),
        mapped_bytes,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        -1,
        0,
    );
    if region == libc::MAP_FAILED {
        return None;
    }

    let header = region as *mut Header;
    (*header).total_size = mapped_bytes;
    (*header).from_os = true;
    (*header).valid = true;
    (*header).prev_in_chain = std::ptr::null_mut();
    (*header).next_in_chain = std::ptr::null_mut();
    (*header).prev_free = std::ptr::null_mut();
    (*header).next_free = std::ptr::null_mut();
    Some(header)
}

/// Unmaps an OS-backed block of `total_size` bytes starting at `header`.
/// Returns whether the kernel accepted the unmap.
///
/// # Safety
/// `header` must point to the start of a live mapping obtained from
/// [`map_block`], with `total_size` matching what was passed to it.
pub(crate) unsafe fn unmap_block(header: *mut Header, total_size: usize) -> bool {
    libc::munmap(header as *mut libc::c_void, total_size) == 0
}
