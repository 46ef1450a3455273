//! Block metadata and the size-rounding rules that govern allocation.
//!
//! Every allocation this crate hands out is preceded by a [`Header`]: a
//! fixed-size block carrying the size, origin, validity and the four
//! intrusive link fields used by the chain and the free lists. Everything
//! here is pure, const-evaluable arithmetic plus the header layout itself;
//! the arena and the two engines built on top of it live in sibling modules.

use std::mem::{align_of, size_of};

/// A zero-sized marker type aligned like the platform's maximum alignment
/// (the Rust analogue of C's `max_align_t`; 16 bytes covers SSE/x86-64 and
/// AArch64 NEON, which is what every allocation in this crate is aligned to).
#[repr(align(16))]
pub(crate) struct MaxAlignUnit;

/// Alignment guaranteed to every non-null pointer `allocate`/`resize` return.
pub const MAX_ALIGN: usize = align_of::<MaxAlignUnit>();

/// Metadata block immediately preceding every allocation's payload.
///
/// `user_ptr` from section 3 of the design notes is not stored here as a
/// physical field — it is always `header_address + HEADER_STRIDE`, and
/// storing it as a separate field would just be state that could drift from
/// that invariant. [`Header::user_ptr`] recomputes it instead.
#[repr(C)]
pub(crate) struct Header {
    pub total_size: usize,
    pub prev_in_chain: *mut Header,
    pub next_in_chain: *mut Header,
    pub prev_free: *mut Header,
    pub next_free: *mut Header,
    pub valid: bool,
    pub from_os: bool,
}

impl Header {
    /// Payload address for a header living at `header_ptr`.
    ///
    /// # Safety
    /// `header_ptr` must point to a live `Header` (or the memory immediately
    /// preceding where one is about to be written).
    #[inline]
    pub unsafe fn user_ptr(header_ptr: *mut Header) -> *mut u8 {
        (header_ptr as *mut u8).add(HEADER_STRIDE)
    }

    /// Recovers the header preceding a payload pointer previously returned
    /// by `allocate`/`resize`.
    ///
    /// # Safety
    /// `ptr` must have been returned by `allocate`/`resize` on the same
    /// arena and not yet reclaimed in a way that invalidates the header.
    #[inline]
    pub unsafe fn from_user_ptr(ptr: *mut u8) -> *mut Header {
        ptr.sub(HEADER_STRIDE) as *mut Header
    }
}

/// Rounds `v` up to the nearest multiple of `a`. `a` must be a power of two.
pub const fn round_up(v: usize, a: usize) -> usize {
    (v + a - 1) & !(a - 1)
}

/// Byte distance from a header's address to its payload's address:
/// `round_up(size_of::<Header>(), MAX_ALIGN)`, so the payload is always
/// maximally aligned regardless of `Header`'s own natural alignment.
pub const HEADER_STRIDE: usize = round_up(size_of::<Header>(), MAX_ALIGN);

/// The effective allocation size for a `size`-byte request (design notes
/// section 4.1): header plus payload rounded up to `MAX_ALIGN`, with a
/// one-quantum floor for zero-byte requests.
pub const fn total_size_for(size: usize) -> usize {
    if size == 0 {
        HEADER_STRIDE + MAX_ALIGN
    } else {
        HEADER_STRIDE + round_up(size, MAX_ALIGN)
    }
}

/// Size-class table index for a block of `total_size` bytes: a direct
/// table index, no logarithm, per section 4.1.
pub const fn size_class(total_size: usize) -> usize {
    total_size / MAX_ALIGN
}

/// Number of size-class slots for an arena of `capacity` bytes, per the
/// `N_CLASSES = (ARENA_CAPACITY - header_stride) / max_align` formula.
///
/// This formula under-counts by a few slots at the very top of the range
/// (the largest possible `total_size`, `CAPACITY` itself, needs slot
/// `CAPACITY / MAX_ALIGN`, which is `HEADER_STRIDE / MAX_ALIGN` past the
/// end of a table this size). The arena clamps lookups into the last slot
/// to stay in bounds rather than grow the table past the documented size;
/// see `Arena::class_index`.
pub const fn n_classes(capacity: usize) -> usize {
    capacity.saturating_sub(HEADER_STRIDE) / MAX_ALIGN
}
