//! Central cache (middle end): one shared free list per size class.
//!
//! Every class pairs its list head with its own spinlock, so threads working
//! in different classes never contend. A lock section does pointer work plus
//! at most one page-cache call. When a class runs dry it takes a span from
//! the page cache and slices it into blocks on the spot; sliced blocks stay
//! in circulation as blocks from then on.

use crate::block::{self, FreeBlock, FreeList};
use crate::config::{FREE_LIST_SIZE, PAGE_SIZE};
use crate::page_cache::PageCache;
use crate::size_class;
use crate::stat_inc;
use crate::sync::SpinMutex;
use core::ptr;

/// Per-class spin-locked free lists for the whole process.
///
/// One `SpinMutex<FreeList>` per class is 24 bytes, so the full array is
/// 768 KiB — but every field of it is zero bits (unlocked flag, null head,
/// zero length), so the process-wide static lives entirely in `.bss`: no
/// binary-size cost and no lazy-init branch on the hot path.
pub struct CentralCache {
    lists: [SpinMutex<FreeList>; FREE_LIST_SIZE],
}

impl Default for CentralCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CentralCache {
    pub const fn new() -> Self {
        Self {
            lists: [const { SpinMutex::new(FreeList::new()) }; FREE_LIST_SIZE],
        }
    }

    /// Remove up to `batch` blocks of class `index` as a chain. Returns
    /// `(count, head)`.
    ///
    /// A non-empty class list is served as-is, even when it holds fewer than
    /// `batch` blocks. An empty one is first restocked with a freshly sliced
    /// span; `(0, null)` means the page cache could not supply one.
    ///
    /// # Safety
    /// `page_cache` must guard the page cache that backs this central cache.
    pub unsafe fn fetch_range(
        &self,
        index: usize,
        batch: usize,
        page_cache: &SpinMutex<PageCache>,
    ) -> (usize, *mut FreeBlock) {
        if index >= FREE_LIST_SIZE || batch == 0 {
            return (0, ptr::null_mut());
        }
        stat_inc!(central_fetches);

        let mut list = self.lists[index].lock();
        if list.is_empty() {
            return unsafe { Self::restock(&mut *list, index, batch, page_cache) };
        }
        let (count, head) = list.take_front(batch as u32);
        (count as usize, head)
    }

    /// Splice a chain of `count` blocks back onto the class list.
    ///
    /// # Safety
    /// `head` must start a chain of exactly `count` free blocks of class
    /// `index`, none reachable from anywhere else.
    pub unsafe fn return_range(&self, head: *mut FreeBlock, count: usize, index: usize) {
        if head.is_null() || count == 0 || index >= FREE_LIST_SIZE {
            return;
        }
        stat_inc!(central_returns);

        let mut list = self.lists[index].lock();
        unsafe { list.push_chain(head, count as u32) };
    }

    /// Pull a span from the page cache, slice it into blocks, hand
    /// `min(batch, total)` to the caller and keep the rest as the new list.
    unsafe fn restock(
        list: &mut FreeList,
        index: usize,
        batch: usize,
        page_cache: &SpinMutex<PageCache>,
    ) -> (usize, *mut FreeBlock) {
        let size = size_class::class_to_size(index);
        let pages = size_class::span_pages_for(size);

        let base = unsafe { page_cache.lock().allocate_span(pages) };
        if base.is_null() {
            return (0, ptr::null_mut());
        }
        stat_inc!(spans_carved);

        let total = (pages * PAGE_SIZE) / size;
        debug_assert!(total >= 1);
        let take = batch.min(total);

        unsafe {
            // Thread every block into one chain, in address order.
            for i in 0..total - 1 {
                let current = base.add(i * size) as *mut FreeBlock;
                let next = base.add((i + 1) * size) as *mut FreeBlock;
                block::write_next(current, next);
            }
            block::write_next(base.add((total - 1) * size) as *mut FreeBlock, ptr::null_mut());

            // Cut off the handed-out prefix; the tail becomes the class list.
            if take < total {
                let last_taken = base.add((take - 1) * size) as *mut FreeBlock;
                block::write_next(last_taken, ptr::null_mut());
                let remainder = base.add(take * size) as *mut FreeBlock;
                list.push_chain(remainder, (total - take) as u32);
            }
        }

        (take, base as *mut FreeBlock)
    }

    #[cfg(test)]
    fn class_len(&self, index: usize) -> u32 {
        self.lists[index].lock().len()
    }
}
