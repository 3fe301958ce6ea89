//! Thread cache (front end): per-thread free lists, one per size class.
//!
//! The owning thread is the only one that ever touches a `ThreadCache`, so
//! the hot paths run with no atomics and no locks. Misses pull a batch from
//! the central cache; a free list that outgrows [`MAX_LIST_LEN`] ships about
//! half of itself back. The cache's own storage is carved straight from
//! zeroed OS pages — an all-zero `ThreadCache` is a valid empty one — which
//! keeps the crate free of any dependence on the Rust heap.

use crate::block::{self, FreeBlock, FreeList};
use crate::central_cache::CentralCache;
use crate::config::{FREE_LIST_SIZE, MAX_LIST_LEN, PAGE_SIZE};
use crate::page_cache::PageCache;
use crate::platform;
use crate::size_class;
use crate::stat_inc;
use crate::sync::SpinMutex;
use core::ptr;

pub struct ThreadCache {
    lists: [FreeList; FREE_LIST_SIZE],
}

impl ThreadCache {
    /// Bytes of page-granular storage one cache occupies.
    const fn footprint() -> usize {
        core::mem::size_of::<ThreadCache>().div_ceil(PAGE_SIZE) * PAGE_SIZE
    }

    /// Carve a fresh, empty cache out of zeroed OS pages. Null on OS
    /// exhaustion.
    pub fn create() -> *mut ThreadCache {
        // Zeroed pages are a valid ThreadCache: every FreeList is a null
        // head with a zero length.
        unsafe { platform::page_alloc(Self::footprint()) as *mut ThreadCache }
    }

    /// Drain every list into the central cache and release the storage.
    ///
    /// # Safety
    /// `tc` must come from [`ThreadCache::create`] and must not be used
    /// afterwards.
    pub unsafe fn destroy(tc: *mut ThreadCache, central: &CentralCache) {
        unsafe {
            (*tc).flush(central);
            platform::page_dealloc(tc as *mut u8, Self::footprint());
        }
    }

    /// Allocate one block of class `index`. Null only when the lower tiers
    /// are out of memory.
    ///
    /// # Safety
    /// Must only be called from the owning thread. `index` must be a valid
    /// class.
    #[inline]
    pub unsafe fn allocate(
        &mut self,
        index: usize,
        central: &CentralCache,
        page_cache: &SpinMutex<PageCache>,
    ) -> *mut u8 {
        let block = self.lists[index].pop();
        if !block.is_null() {
            return block as *mut u8;
        }
        unsafe { self.fetch_from_central(index, central, page_cache) }
    }

    /// Release one block of class `index` back to this cache, spilling to
    /// the central cache when the class list grows too long.
    ///
    /// # Safety
    /// Must only be called from the owning thread. `ptr` must be a block of
    /// class `index` owned by the caller.
    #[inline]
    pub unsafe fn deallocate(&mut self, ptr: *mut u8, index: usize, central: &CentralCache) {
        let list = &mut self.lists[index];
        unsafe { list.push(ptr as *mut FreeBlock) };
        if list.len() > MAX_LIST_LEN {
            self.spill(index, central);
        }
    }

    /// Miss path: pull a batch from the central cache, keep one block for
    /// the caller, stash the rest.
    #[cold]
    unsafe fn fetch_from_central(
        &mut self,
        index: usize,
        central: &CentralCache,
        page_cache: &SpinMutex<PageCache>,
    ) -> *mut u8 {
        stat_inc!(thread_cache_misses);

        let batch = size_class::batch_count(size_class::class_to_size(index));
        let (count, head) = unsafe { central.fetch_range(index, batch, page_cache) };
        if count == 0 || head.is_null() {
            return ptr::null_mut();
        }

        if count > 1 {
            let rest = unsafe { block::read_next(head) };
            unsafe { self.lists[index].push_chain(rest, (count - 1) as u32) };
        }
        head as *mut u8
    }

    /// Keep the newer half of the class list, ship the rest as one chain.
    fn spill(&mut self, index: usize, central: &CentralCache) {
        let list = &mut self.lists[index];
        let retain = (list.len().div_ceil(2)).max(1);
        let (count, chain) = list.detach_after(retain);
        if count > 0 {
            unsafe { central.return_range(chain, count as usize, index) };
        }
    }

    /// Ship every cached block back to the central cache. Called when the
    /// owning thread exits.
    pub fn flush(&mut self, central: &CentralCache) {
        for index in 0..FREE_LIST_SIZE {
            let (count, head) = self.lists[index].take_all();
            if count > 0 {
                unsafe { central.return_range(head, count as usize, index) };
            }
        }
    }

    #[cfg(test)]
    fn list_len(&self, index: usize) -> u32 {
        self.lists[index].len()
    }
}
