//! 3-level radix tree mapping page IDs to span records.
//!
//! With 48-bit virtual addresses and a 12-bit page shift there are 36 bits
//! of page ID, split 12/12/12 across the levels. The root array is a 32 KiB
//! static; mid and leaf nodes are lazily carved from OS pages. Reads are
//! lock-free (`AtomicPtr` with Acquire); writes happen under the page cache
//! lock.
//!
//! The tree doubles as the live-span index and the coalescing neighbor
//! index: every span — in use or free — is registered at its first and last
//! pages, and those are the only pages the page cache ever looks up (a
//! release looks up the base; coalescing looks up `start - 1` and `end`,
//! which are by construction endpoint pages of the adjacent spans).

use crate::config::PAGE_SIZE;
use crate::platform;
use crate::span::Span;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

const ROOT_BITS: usize = 12;
const MID_BITS: usize = 12;
const LEAF_BITS: usize = 12;

const ROOT_LEN: usize = 1 << ROOT_BITS; // 4096
const MID_LEN: usize = 1 << MID_BITS; // 4096
const LEAF_LEN: usize = 1 << LEAF_BITS; // 4096

const MID_SHIFT: usize = LEAF_BITS; // 12
const ROOT_SHIFT: usize = LEAF_BITS + MID_BITS; // 24

const MID_MASK: usize = (1 << MID_BITS) - 1;
const LEAF_MASK: usize = (1 << LEAF_BITS) - 1;

#[repr(C)]
struct MidNode {
    children: [AtomicPtr<LeafNode>; MID_LEN],
}

#[repr(C)]
struct LeafNode {
    spans: [AtomicPtr<Span>; LEAF_LEN],
}

/// Radix tree for page_id -> *mut Span lookup.
pub struct PageMap {
    root: [AtomicPtr<MidNode>; ROOT_LEN],
}

unsafe impl Send for PageMap {}
unsafe impl Sync for PageMap {}

/// Const-initialized array of null AtomicPtrs: null has the all-zero bit
/// pattern, so transmuting a zeroed usize array is valid.
macro_rules! null_atomic_array {
    ($len:expr, $T:ty) => {{
        unsafe { core::mem::transmute::<[usize; $len], [AtomicPtr<$T>; $len]>([0usize; $len]) }
    }};
}

impl PageMap {
    #[allow(clippy::new_without_default)]
    pub const fn new() -> Self {
        Self {
            root: null_atomic_array!(ROOT_LEN, MidNode),
        }
    }

    /// Look up the span registered at a page ID. Null if none. Lock-free.
    #[inline]
    pub fn get(&self, page_id: usize) -> *mut Span {
        let root_idx = page_id >> ROOT_SHIFT;
        let mid_idx = (page_id >> MID_SHIFT) & MID_MASK;
        let leaf_idx = page_id & LEAF_MASK;

        if root_idx >= ROOT_LEN {
            return ptr::null_mut();
        }

        let mid = self.root[root_idx].load(Ordering::Acquire);
        if mid.is_null() {
            return ptr::null_mut();
        }

        let leaf = unsafe { (*mid).children[mid_idx].load(Ordering::Acquire) };
        if leaf.is_null() {
            return ptr::null_mut();
        }

        unsafe { (*leaf).spans[leaf_idx].load(Ordering::Acquire) }
    }

    /// Set the entry for a page ID.
    ///
    /// # Safety
    /// Must run under the page cache lock. `span` must be valid or null.
    pub unsafe fn set(&self, page_id: usize, span: *mut Span) {
        let root_idx = page_id >> ROOT_SHIFT;
        let mid_idx = (page_id >> MID_SHIFT) & MID_MASK;
        let leaf_idx = page_id & LEAF_MASK;

        assert!(root_idx < ROOT_LEN, "page_id out of range for page map");

        let mut mid = self.root[root_idx].load(Ordering::Acquire);
        if mid.is_null() {
            mid = unsafe { Self::alloc_node::<MidNode>() };
            assert!(!mid.is_null(), "failed to allocate page map mid node");
            // Release so readers see the zero-initialized node.
            self.root[root_idx].store(mid, Ordering::Release);
        }

        let mut leaf = unsafe { (*mid).children[mid_idx].load(Ordering::Acquire) };
        if leaf.is_null() {
            leaf = unsafe { Self::alloc_node::<LeafNode>() };
            assert!(!leaf.is_null(), "failed to allocate page map leaf node");
            unsafe { (*mid).children[mid_idx].store(leaf, Ordering::Release) };
        }

        unsafe { (*leaf).spans[leaf_idx].store(span, Ordering::Release) };
    }

    /// Register a span at its first and last pages.
    ///
    /// Endpoints are all the page cache ever consults, for both live and
    /// free spans, so interior pages stay unregistered.
    ///
    /// # Safety
    /// Must run under the page cache lock; `span` must be valid.
    pub unsafe fn register_endpoints(&self, span: *mut Span) {
        let start = unsafe { (*span).start_page };
        let count = unsafe { (*span).num_pages };
        unsafe { self.set(start, span) };
        if count > 1 {
            unsafe { self.set(start + count - 1, span) };
        }
    }

    /// Clear the endpoint entries of a span that is about to be merged away
    /// or resized, so no stale record stays reachable.
    ///
    /// # Safety
    /// Must run under the page cache lock; `span` must be valid.
    pub unsafe fn clear_endpoints(&self, span: *mut Span) {
        let start = unsafe { (*span).start_page };
        let count = unsafe { (*span).num_pages };
        unsafe { self.set(start, ptr::null_mut()) };
        if count > 1 {
            unsafe { self.set(start + count - 1, ptr::null_mut()) };
        }
    }

    unsafe fn alloc_node<T>() -> *mut T {
        let size = core::mem::size_of::<T>();
        let alloc_size = (size + PAGE_SIZE - 1) & !(PAGE_SIZE - 1);
        // page_alloc returns zeroed memory, which is all-null AtomicPtrs.
        let ptr = unsafe { platform::page_alloc(alloc_size) };
        ptr.cast::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{self, SpanState};

    #[test]
    fn empty_map_returns_null() {
        let map = PageMap::new();
        assert!(map.get(0).is_null());
        assert!(map.get(1000).is_null());
        assert!(map.get(123_456_789).is_null());
    }

    #[test]
    fn set_get_clear() {
        let map = PageMap::new();
        let s = span::alloc_record();
        assert!(!s.is_null());

        unsafe {
            (*s).start_page = 42;
            (*s).num_pages = 1;

            map.set(42, s);
            assert_eq!(map.get(42), s);
            assert!(map.get(41).is_null());
            assert!(map.get(43).is_null());

            map.set(42, ptr::null_mut());
            assert!(map.get(42).is_null());

            span::free_record(s);
        }
    }

    #[test]
    fn endpoints_only() {
        let map = PageMap::new();
        let s = span::alloc_record();
        assert!(!s.is_null());

        unsafe {
            (*s).start_page = 100;
            (*s).num_pages = 5;
            (*s).state = SpanState::Free;

            map.register_endpoints(s);
            assert_eq!(map.get(100), s);
            assert_eq!(map.get(104), s);
            // Interior pages are deliberately not registered.
            assert!(map.get(102).is_null());
            assert!(map.get(99).is_null());
            assert!(map.get(105).is_null());

            map.clear_endpoints(s);
            assert!(map.get(100).is_null());
            assert!(map.get(104).is_null());

            span::free_record(s);
        }
    }

    #[test]
    fn single_page_span_endpoints() {
        let map = PageMap::new();
        let s = span::alloc_record();
        unsafe {
            (*s).start_page = 7;
            (*s).num_pages = 1;
            map.register_endpoints(s);
            assert_eq!(map.get(7), s);
            map.clear_endpoints(s);
            assert!(map.get(7).is_null());
            span::free_record(s);
        }
    }

    #[test]
    fn high_page_ids_traverse_all_levels() {
        let map = PageMap::new();
        let s = span::alloc_record();
        assert!(!s.is_null());

        unsafe {
            let page_id = (1usize << 33) + (1 << 17) + 42;
            (*s).start_page = page_id;
            (*s).num_pages = 1;

            map.set(page_id, s);
            assert_eq!(map.get(page_id), s);
            assert!(map.get(page_id - 1).is_null());
            assert!(map.get(page_id + 1).is_null());

            span::free_record(s);
        }
    }
}
