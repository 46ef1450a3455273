//! Free and resize, `spec.md` §4.3 and §4.4.
//!
//! Three shapes of free: an OS-mapped block unmaps directly; a block at
//! the tail of the chain shrinks the bump offset instead of ever touching
//! a free list; anything else goes onto its size class's free list and is
//! then coalesced with whichever of its chain neighbours are themselves
//! free. Resize tries to avoid moving anything before it tries moving.

use std::ptr;

use crate::arena::Arena;
use crate::header::{total_size_for, Header, HEADER_STRIDE};
use crate::os;

impl<const CAPACITY: usize> Arena<CAPACITY> {
    /// Reclaims a block returned by `allocate`/`resize`.
    ///
    /// Null pointers and pointers to already-freed blocks are accepted as
    /// no-ops — `spec.md` §4.3 makes free idempotent rather than undefined
    /// behaviour on a double free.
    ///
    /// # Safety
    /// `ptr` must be null or have been returned by `allocate`/`resize` on
    /// this same arena.
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        let header = Header::from_user_ptr(ptr);
        if !(*header).valid {
            return;
        }

        if (*header).from_os {
            let total = (*header).total_size;
            (*header).valid = false;
            os::unmap_block(header, total);
            return;
        }

        if (*header).next_in_chain.is_null() {
            let prev = (*header).prev_in_chain;
            if !prev.is_null() {
                (*prev).next_in_chain = ptr::null_mut();
            }
            self.offset -= (*header).total_size;
            (*header).valid = false;
            self.chain_tail = prev;
            return;
        }

        self.insert_free(header);
        self.coalesce(header);
    }

    /// Links `header` onto the tail of its size class's free list.
    pub(crate) fn insert_free(&mut self, header: *mut Header) {
        unsafe {
            (*header).valid = false;
            let class = self.class_index((*header).total_size);
            let tail = self.free_tails[class];
            (*header).prev_free = tail;
            (*header).next_free = ptr::null_mut();
            if !tail.is_null() {
                (*tail).next_free = header;
            }
            self.free_tails[class] = header;
        }
    }

    /// Unlinks `header` from whichever free list it is currently on.
    pub(crate) fn remove_free(&mut self, header: *mut Header) {
        unsafe {
            let class = self.class_index((*header).total_size);
            let prev = (*header).prev_free;
            let next = (*header).next_free;
            if self.free_tails[class] == header {
                self.free_tails[class] = prev;
            }
            if !next.is_null() {
                (*next).prev_free = prev;
            }
            if !prev.is_null() {
                (*prev).next_free = next;
            }
            (*header).prev_free = ptr::null_mut();
            (*header).next_free = ptr::null_mut();
        }
    }

    /// Merges `header` with whichever of its chain neighbours are
    /// themselves free, forward before backward. Each merge re-indexes the
    /// surviving block into the free list matching its new, larger size
    /// class, so the block ends the operation on exactly one free list.
    fn coalesce(&mut self, header: *mut Header) {
        unsafe {
            let next = (*header).next_in_chain;
            if !next.is_null() && !(*next).valid {
                self.remove_free(next);
                let merged = (*header).total_size + (*next).total_size;
                let next_next = (*next).next_in_chain;
                (*header).next_in_chain = next_next;
                if !next_next.is_null() {
                    (*next_next).prev_in_chain = header;
                } else {
                    self.chain_tail = header;
                }
                self.remove_free(header);
                (*header).total_size = merged;
                self.insert_free(header);
            }

            let prev = (*header).prev_in_chain;
            if !prev.is_null() && !(*prev).valid {
                self.remove_free(header);
                let merged = (*prev).total_size + (*header).total_size;
                let next_of_header = (*header).next_in_chain;
                (*prev).next_in_chain = next_of_header;
                if !next_of_header.is_null() {
                    (*next_of_header).prev_in_chain = prev;
                } else {
                    self.chain_tail = prev;
                }
                self.remove_free(prev);
                (*prev).total_size = merged;
                self.insert_free(prev);
            }
        }
    }

    /// Resizes a block to `new_size` bytes, preserving its contents up to
    /// the smaller of the old and new sizes (`spec.md` §4.4).
    ///
    /// Tries, in order: shrink or no-op in place when the existing block is
    /// already big enough; grow in place by absorbing a free block
    /// immediately following it in the chain; otherwise allocate fresh,
    /// copy, and free the source. Returns null (leaving the original block
    /// untouched) only if that fresh allocation itself fails.
    ///
    /// # Safety
    /// `ptr` must be null or have been returned by `allocate`/`resize` on
    /// this same arena.
    pub unsafe fn resize(&mut self, ptr: *mut u8, new_size: usize) -> *mut u8 {
        if ptr.is_null() {
            return ptr::null_mut();
        }
        let header = Header::from_user_ptr(ptr);
        if !(*header).valid {
            return ptr::null_mut();
        }

        let new_total = total_size_for(new_size);

        if (*header).total_size >= new_total {
            return ptr;
        }

        let next = (*header).next_in_chain;
        if !next.is_null()
            && !(*next).valid
            && (*header).total_size + (*next).total_size >= new_total
        {
            self.remove_free(next);
            let merged = (*header).total_size + (*next).total_size;
            let next_next = (*next).next_in_chain;
            (*header).next_in_chain = next_next;
            if !next_next.is_null() {
                (*next_next).prev_in_chain = header;
            } else {
                self.chain_tail = header;
            }
            (*header).total_size = merged;
            return ptr;
        }

        let old_total = (*header).total_size;
        let new_ptr = self.allocate(new_size);
        if new_ptr.is_null() {
            return ptr::null_mut();
        }
        let to_copy = old_total.min(new_total) - HEADER_STRIDE;
        ptr::copy_nonoverlapping(ptr, new_ptr, to_copy);
        self.free(ptr);
        new_ptr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::DEFAULT_ARENA_CAPACITY;

    #[test]
    fn double_free_is_a_no_op() {
        let mut arena = Arena::<DEFAULT_ARENA_CAPACITY>::new();
        unsafe {
            let ptr = arena.allocate(16);
            arena.free(ptr);
            arena.free(ptr);
        }
    }

    #[test]
    fn freeing_null_is_a_no_op() {
        let mut arena = Arena::<DEFAULT_ARENA_CAPACITY>::new();
        unsafe { arena.free(ptr::null_mut()) };
    }

    #[test]
    fn tail_free_shrinks_offset() {
        let mut arena = Arena::<DEFAULT_ARENA_CAPACITY>::new();
        unsafe {
            let a = arena.allocate(64);
            let before = arena.offset();
            arena.free(a);
            assert!(arena.offset() < before);
        }
    }

    #[test]
    fn freed_interior_block_is_reused() {
        let mut arena = Arena::<DEFAULT_ARENA_CAPACITY>::new();
        unsafe {
            let a = arena.allocate(32);
            let _b = arena.allocate(32);
            arena.free(a);
            let offset_before_reuse = arena.offset();
            let c = arena.allocate(32);
            assert_eq!(arena.offset(), offset_before_reuse);
            assert_eq!(a, c);
        }
    }

    #[test]
    fn shrink_resize_is_in_place() {
        let mut arena = Arena::<DEFAULT_ARENA_CAPACITY>::new();
        unsafe {
            let a = arena.allocate(256);
            let b = arena.resize(a, 16);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn grow_resize_preserves_contents() {
        let mut arena = Arena::<DEFAULT_ARENA_CAPACITY>::new();
        unsafe {
            let a = arena.allocate(16);
            ptr::write_bytes(a, 0xAB, 16);
            let b = arena.resize(a, 4096);
            assert!(!b.is_null());
            let mut buf = [0u8; 16];
            ptr::copy_nonoverlapping(b, buf.as_mut_ptr(), 16);
            assert_eq!(buf, [0xABu8; 16]);
        }
    }
}
