//! The three-way allocation strategy from `spec.md` §4.2: reuse a freed
//! block of the right size first, then bump the arena, then fall back to
//! an OS mapping once the arena is full.

use std::cell::Cell;
use std::ptr;

use crate::arena::Arena;
use crate::header::{total_size_for, Header};
use crate::os;

#[cfg(debug_assertions)]
thread_local! {
    static WARNED_ARENA_INIT: Cell<bool> = const { Cell::new(false) };
    static WARNED_ARENA_FULL: Cell<bool> = const { Cell::new(false) };
}

#[cfg(debug_assertions)]
fn warn_arena_init(capacity: usize) {
    WARNED_ARENA_INIT.with(|warned| {
        if !warned.replace(true) {
            talloc_log::warn!("arena of {} bytes handed out its first block", capacity);
        }
    });
}

#[cfg(debug_assertions)]
fn warn_arena_full() {
    WARNED_ARENA_FULL.with(|warned| {
        if !warned.replace(true) {
            talloc_log::warn!("arena exhausted, falling back to OS-mapped allocations");
        }
    });
}

impl<const CAPACITY: usize> Arena<CAPACITY> {
    /// Satisfies a `size`-byte request via, in order: an exact-size-class
    /// free-list pop, a bump of the arena, or an anonymous OS mapping.
    /// Returns null only if the OS mapping itself fails.
    pub fn allocate(&mut self, size: usize) -> *mut u8 {
        let total = total_size_for(size);

        if let Some(header) = self.pop_free_list(total) {
            return unsafe { Header::user_ptr(header) };
        }

        if self.offset + total <= CAPACITY {
            #[cfg(debug_assertions)]
            if self.offset == 0 {
                warn_arena_init(CAPACITY);
            }
            let header = self.bump(total);
            return unsafe { Header::user_ptr(header) };
        }

        #[cfg(debug_assertions)]
        warn_arena_full();

        match unsafe { os::map_block(total) } {
            Some(header) => unsafe { Header::user_ptr(header) },
            None => ptr::null_mut(),
        }
    }

    /// Pops the tail of the free list for `total`'s size class, if any.
    pub(crate) fn pop_free_list(&mut self, total: usize) -> Option<*mut Header> {
        let class = self.class_index(total);
        let tail = self.free_tails[class];
        if tail.is_null() {
            return None;
        }
        unsafe {
            let prev_free = (*tail).prev_free;
            self.free_tails[class] = prev_free;
            if !prev_free.is_null() {
                (*prev_free).next_free = ptr::null_mut();
            }
            (*tail).valid = true;
            (*tail).prev_free = ptr::null_mut();
            (*tail).next_free = ptr::null_mut();
            Some(tail)
        }
    }

    /// Carves `total` bytes off the end of the chain and appends the new
    /// header to it.
    fn bump(&mut self, total: usize) -> *mut Header {
        let at = self.offset;
        let header = self.header_at(at);
        self.offset += total;
        unsafe {
            (*header).total_size = total;
            (*header).from_os = false;
            (*header).valid = true;
            (*header).prev_free = ptr::null_mut();
            (*header).next_free = ptr::null_mut();
            (*header).next_in_chain = ptr::null_mut();
            (*header).prev_in_chain = self.chain_tail;
            if !self.chain_tail.is_null() {
                (*self.chain_tail).next_in_chain = header;
            }
            self.chain_tail = header;
        }
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::DEFAULT_ARENA_CAPACITY;

    #[test]
    fn first_allocation_bumps_from_zero() {
        let mut arena = Arena::<DEFAULT_ARENA_CAPACITY>::new();
        let ptr = arena.allocate(64);
        assert!(!ptr.is_null());
        assert_eq!(arena.offset(), total_size_for(64));
    }

    #[test]
    fn distinct_allocations_do_not_overlap() {
        let mut arena = Arena::<DEFAULT_ARENA_CAPACITY>::new();
        let a = arena.allocate(32);
        let b = arena.allocate(32);
        assert_ne!(a, b);
    }

    #[test]
    fn oversized_request_falls_back_to_os_map() {
        let mut arena = Arena::<DEFAULT_ARENA_CAPACITY>::new();
        let ptr = arena.allocate(DEFAULT_ARENA_CAPACITY * 2);
        assert!(!ptr.is_null());
        unsafe {
            let header = Header::from_user_ptr(ptr);
            assert!((*header).from_os);
            crate::os::unmap_block(header, (*header).total_size);
        }
    }

    #[test]
    fn zero_size_request_still_returns_a_usable_pointer() {
        let mut arena = Arena::<DEFAULT_ARENA_CAPACITY>::new();
        let ptr = arena.allocate(0);
        assert!(!ptr.is_null());
    }
}
