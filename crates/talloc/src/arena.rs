//! The per-thread bump region and its size-class free lists.
//!
//! `Arena<CAPACITY>` owns a single fixed-size byte buffer, a bump offset
//! into it, a table of free-list tails indexed by size class, and a pointer
//! to the tail of the intrusive chain of every block ever carved out of the
//! buffer. It does not itself decide *how* to satisfy an allocation or
//! reclaim a block — that's [`crate::alloc_engine`] and [`crate::reclaim`].
//! This module only owns the data and the handful of accessors those two
//! engines build on.

use std::cell::RefCell;
use std::ptr;

use crate::header::{n_classes, Header, MAX_ALIGN};

/// Default arena capacity in bytes — `spec.md`'s `ARENA_CAPACITY` knob.
pub const DEFAULT_ARENA_CAPACITY: usize = 131_072;

/// A max-aligned, fixed-size byte buffer. Boxing `AlignedBuffer<N>` rather
/// than a bare `[u8; N]` keeps a 128 KiB (or larger, under the
/// size-multiplier knob) region off the stack during construction.
#[repr(align(16))]
pub(crate) struct AlignedBuffer<const N: usize>(pub [u8; N]);

/// A thread-local, fixed-capacity bump region with per-size-class free
/// lists, as described in `spec.md` §3.
///
/// `CAPACITY` is the compile-time `ARENA_CAPACITY` knob; the "optional
/// size-multiplier" knob from `spec.md` §6 is expressed by instantiating a
/// different `CAPACITY`, e.g. `Arena::<{ DEFAULT_ARENA_CAPACITY * 4 }>`.
pub struct Arena<const CAPACITY: usize = DEFAULT_ARENA_CAPACITY> {
    pub(crate) buffer: Box<AlignedBuffer<CAPACITY>>,
    pub(crate) offset: usize,
    pub(crate) free_tails: Box<[*mut Header]>,
    pub(crate) chain_tail: *mut Header,
}

// Arena's raw pointers only ever reference `buffer`, which it owns
// exclusively; it is thread-local by construction and never Send/Sync.

impl<const CAPACITY: usize> Arena<CAPACITY> {
    /// Builds an empty arena: zero offset, empty chain, every free-list
    /// slot null.
    ///
    /// # Panics
    /// If `CAPACITY` is not a multiple of `MAX_ALIGN`, or too small to hold
    /// even the smallest possible allocation.
    pub fn new() -> Self {
        assert!(
            CAPACITY % MAX_ALIGN == 0,
            "arena capacity must be a multiple of MAX_ALIGN ({MAX_ALIGN})"
        );
        assert!(
            CAPACITY >= MAX_ALIGN * 4,
            "arena capacity {CAPACITY} is too small to host a single allocation"
        );
        Arena {
            buffer: Box::new(AlignedBuffer([0u8; CAPACITY])),
            offset: 0,
            free_tails: vec![ptr::null_mut(); n_classes(CAPACITY).max(1)].into_boxed_slice(),
            chain_tail: ptr::null_mut(),
        }
    }

    #[inline]
    pub(crate) fn buffer_ptr(&mut self) -> *mut u8 {
        self.buffer.0.as_mut_ptr()
    }

    #[inline]
    pub(crate) fn header_at(&mut self, byte_offset: usize) -> *mut Header {
        unsafe { self.buffer_ptr().add(byte_offset) as *mut Header }
    }

    /// Clamps a size class into the bounds of `free_tails`.
    ///
    /// `n_classes` undercounts the top of the range by a few slots (see its
    /// doc comment); requests that land past the end of the table alias
    /// into the last slot instead of panicking. Those are necessarily the
    /// largest blocks the arena can hold, so sharing one slot among them
    /// costs a little reuse precision and nothing else.
    #[inline]
    pub(crate) fn class_index(&self, total_size: usize) -> usize {
        crate::header::size_class(total_size).min(self.free_tails.len() - 1)
    }

    /// Current bump offset — how many bytes of the arena are spoken for
    /// by the chain (freed tail blocks shrink this back down).
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Total capacity of the arena's embedded buffer.
    pub const fn capacity(&self) -> usize {
        CAPACITY
    }
}

impl<const CAPACITY: usize> Default for Arena<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static DEFAULT_ARENA: RefCell<Arena<DEFAULT_ARENA_CAPACITY>> =
        RefCell::new(Arena::new());
}

/// Runs `f` against this thread's default-capacity arena.
pub(crate) fn with_default_arena<R>(f: impl FnOnce(&mut Arena<DEFAULT_ARENA_CAPACITY>) -> R) -> R {
    DEFAULT_ARENA.with(|cell| f(&mut cell.borrow_mut()))
}
