//! A per-thread general-purpose allocator.
//!
//! Every thread owns a single fixed-capacity arena: a flat byte buffer it
//! bump-allocates out of, backed by per-size-class free lists for reusing
//! reclaimed blocks, and an anonymous OS mapping as the fallback once the
//! arena is full. Nothing here crosses threads, and nothing here takes a
//! lock — each thread's arena is entirely its own.
//!
//! The public surface is exactly three operations:
//!
//! - [`allocate`] — request a block of at least `size` bytes.
//! - [`free`] — return a block to its arena (or unmap it, if it came from
//!   the OS fallback).
//! - [`resize`] — grow or shrink a block, preserving its contents.
//!
//! All three speak in `*mut u8`: null is the only failure signal, matching
//! the allocator's no-error-object design (see `SPEC_FULL.md` §7). Callers
//! needing something other than the default arena capacity can build their
//! own [`Arena`] and call its inherent methods directly; `allocate`/`free`/
//! `resize` are thin wrappers over the thread-local default-capacity one.

mod alloc_engine;
pub mod arena;
mod header;
mod os;
mod reclaim;

#[cfg(test)]
mod tests;

pub use arena::{Arena, DEFAULT_ARENA_CAPACITY};

/// Requests a block of at least `size` bytes from this thread's default
/// arena. Returns null only if the arena is full and the OS mapping
/// fallback itself fails.
pub fn allocate(size: usize) -> *mut u8 {
    arena::with_default_arena(|arena| arena.allocate(size))
}

/// Returns a block previously obtained from [`allocate`]/[`resize`] to this
/// thread's default arena. Null and already-freed pointers are no-ops.
///
/// # Safety
/// `ptr` must be null or have been returned by [`allocate`]/[`resize`] on
/// this same thread.
pub unsafe fn free(ptr: *mut u8) {
    arena::with_default_arena(|arena| arena.free(ptr))
}

/// Resizes a block previously obtained from [`allocate`]/[`resize`] to
/// `new_size` bytes, preserving its contents up to the smaller of the old
/// and new sizes. Returns null (leaving the original block untouched) only
/// if growing requires a fresh allocation and that allocation fails.
///
/// # Safety
/// `ptr` must be null or have been returned by [`allocate`]/[`resize`] on
/// this same thread.
pub unsafe fn resize(ptr: *mut u8, new_size: usize) -> *mut u8 {
    arena::with_default_arena(|arena| arena.resize(ptr, new_size))
}
