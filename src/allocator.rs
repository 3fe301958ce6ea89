//! Front end: process-wide tier statics, per-thread cache wiring, and the
//! public allocation surface.
//!
//! All mutable state lives in module-level statics guarded by the tiers' own
//! locks; [`TierMalloc`] itself is zero-sized. With the `std` feature each
//! thread lazily builds its cache on first small allocation and drains it
//! back to the central cache when the thread exits; without `std` every
//! small request goes straight to the central cache.

use crate::block::{self, FreeBlock};
use crate::central_cache::CentralCache;
use crate::config::{ALIGNMENT, MAX_BYTES, PAGE_SIZE};
use crate::page_cache::PageCache;
use crate::pagemap::PageMap;
use crate::platform;
use crate::size_class;
use crate::sync::SpinMutex;
use crate::{stat_add, stat_inc};
use core::alloc::{GlobalAlloc, Layout};
use core::ptr;

pub(crate) static PAGE_MAP: PageMap = PageMap::new();
pub(crate) static PAGE_CACHE: SpinMutex<PageCache> = SpinMutex::new(PageCache::new(&PAGE_MAP));
pub(crate) static CENTRAL_CACHE: CentralCache = CentralCache::new();

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        use crate::thread_cache::ThreadCache;
        use core::cell::Cell;

        /// Owns the lazily created per-thread cache and drains it into the
        /// central cache when the thread exits.
        struct CacheHandle {
            cache: Cell<*mut ThreadCache>,
        }

        impl CacheHandle {
            /// The thread's cache, created on first use. Null when the OS
            /// cannot supply pages for it.
            fn get(&self) -> *mut ThreadCache {
                let tc = self.cache.get();
                if !tc.is_null() {
                    return tc;
                }
                let tc = ThreadCache::create();
                self.cache.set(tc);
                tc
            }
        }

        impl Drop for CacheHandle {
            fn drop(&mut self) {
                let tc = self.cache.get();
                if !tc.is_null() {
                    self.cache.set(ptr::null_mut());
                    unsafe { ThreadCache::destroy(tc, &CENTRAL_CACHE) };
                }
            }
        }

        std::thread_local! {
            static CACHE: CacheHandle = const {
                CacheHandle { cache: Cell::new(ptr::null_mut()) }
            };
        }

        #[inline]
        unsafe fn alloc_small(index: usize) -> *mut u8 {
            // try_with covers late-teardown calls after the TLS destructor
            // already ran; those fall through to the central cache.
            CACHE
                .try_with(|handle| {
                    let tc = handle.get();
                    if tc.is_null() {
                        return unsafe { alloc_from_central(index) };
                    }
                    unsafe { (*tc).allocate(index, &CENTRAL_CACHE, &PAGE_CACHE) }
                })
                .unwrap_or_else(|_| unsafe { alloc_from_central(index) })
        }

        #[inline]
        unsafe fn dealloc_small(ptr: *mut u8, index: usize) {
            let routed = CACHE.try_with(|handle| {
                let tc = handle.get();
                if tc.is_null() {
                    return false;
                }
                unsafe { (*tc).deallocate(ptr, index, &CENTRAL_CACHE) };
                true
            });
            if !matches!(routed, Ok(true)) {
                unsafe { dealloc_to_central(ptr, index) };
            }
        }
    } else {
        #[inline]
        unsafe fn alloc_small(index: usize) -> *mut u8 {
            unsafe { alloc_from_central(index) }
        }

        #[inline]
        unsafe fn dealloc_small(ptr: *mut u8, index: usize) {
            unsafe { dealloc_to_central(ptr, index) };
        }
    }
}

/// Single-block fallback for threads without a cache.
unsafe fn alloc_from_central(index: usize) -> *mut u8 {
    let (count, head) = unsafe { CENTRAL_CACHE.fetch_range(index, 1, &PAGE_CACHE) };
    if count == 0 || head.is_null() {
        ptr::null_mut()
    } else {
        head as *mut u8
    }
}

unsafe fn dealloc_to_central(ptr: *mut u8, index: usize) {
    let obj = ptr as *mut FreeBlock;
    unsafe {
        block::write_next(obj, ptr::null_mut());
        CENTRAL_CACHE.return_range(obj, 1, index);
    }
}

/// Bytes of whole pages covering `size`.
#[inline]
const fn page_bytes(size: usize) -> usize {
    size.div_ceil(PAGE_SIZE) * PAGE_SIZE
}

/// Requests above `MAX_BYTES` bypass the pool entirely.
unsafe fn alloc_large(size: usize) -> *mut u8 {
    stat_inc!(large_allocs);
    unsafe { platform::page_alloc(page_bytes(size)) }
}

unsafe fn dealloc_large(ptr: *mut u8, size: usize) {
    unsafe { platform::page_dealloc(ptr, page_bytes(size)) };
}

/// Where a layout's request is serviced.
enum Route {
    /// Size-class tiers (thread cache → central cache → page cache).
    Small(usize),
    /// Whole OS pages, bypassing the pool.
    Pages(usize),
    /// Alignment beyond PAGE_SIZE: not supported.
    Unsupported,
}

/// Route a layout. Must be a pure function of the layout so alloc and
/// dealloc always agree.
fn route(layout: Layout) -> Route {
    let size = layout.size();
    let align = layout.align();

    if align <= ALIGNMENT {
        return if size > MAX_BYTES {
            Route::Pages(size)
        } else {
            Route::Small(size_class::index_of(size))
        };
    }

    // Over-aligned: spans (and OS pages) are page-aligned and blocks sit at
    // multiples of the class size, so a class block satisfies `align` when
    // align <= PAGE_SIZE and the class size is a multiple of it. Anything
    // past page alignment has no home here.
    if align > PAGE_SIZE {
        return Route::Unsupported;
    }
    let effective = if size > align { size } else { align };
    if effective <= MAX_BYTES {
        let index = size_class::index_of(effective);
        if size_class::class_to_size(index) % align == 0 {
            return Route::Small(index);
        }
    }
    Route::Pages(effective)
}

/// Zero-sized handle to the process-wide allocator.
///
/// The caller-supplied size at [`deallocate`](Self::deallocate) is the
/// design contract: it must land in the same size class (and on the same
/// side of `MAX_BYTES`) as the size given at allocation, which is what lets
/// the allocator keep zero per-block metadata. The [`GlobalAlloc`] impl gets
/// this for free, since `Layout` is handed back at deallocation.
///
/// ```ignore
/// #[global_allocator]
/// static GLOBAL: tiermalloc::TierMalloc = tiermalloc::TierMalloc;
/// ```
pub struct TierMalloc;

impl TierMalloc {
    /// Allocate at least `size` bytes, aligned to `ALIGNMENT`. A zero size
    /// is served as `ALIGNMENT` bytes. Null only on OS memory exhaustion.
    pub fn allocate(&self, size: usize) -> *mut u8 {
        let size = if size == 0 { ALIGNMENT } else { size };
        stat_inc!(alloc_count);
        stat_add!(alloc_bytes, size as u64);

        if size > MAX_BYTES {
            return unsafe { alloc_large(size) };
        }
        unsafe { alloc_small(size_class::index_of(size)) }
    }

    /// Release a block obtained from [`allocate`](Self::allocate).
    ///
    /// # Safety
    /// `ptr` must come from this allocator and not have been freed since;
    /// `size` must be in the same size class (and on the same side of
    /// `MAX_BYTES`) as the size passed at allocation. Violations are
    /// undefined behavior and are not detected.
    pub unsafe fn deallocate(&self, ptr: *mut u8, size: usize) {
        if ptr.is_null() {
            return;
        }
        let size = if size == 0 { ALIGNMENT } else { size };
        stat_inc!(dealloc_count);

        if size > MAX_BYTES {
            unsafe { dealloc_large(ptr, size) };
            return;
        }
        unsafe { dealloc_small(ptr, size_class::index_of(size)) };
    }
}

unsafe impl GlobalAlloc for TierMalloc {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let size = layout.size();
        if size == 0 {
            return layout.align() as *mut u8;
        }

        stat_inc!(alloc_count);
        stat_add!(alloc_bytes, size as u64);

        match route(layout) {
            Route::Small(index) => unsafe { alloc_small(index) },
            Route::Pages(bytes) => unsafe { alloc_large(bytes) },
            Route::Unsupported => ptr::null_mut(),
        }
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        if layout.size() == 0 || ptr.is_null() {
            return;
        }

        stat_inc!(dealloc_count);

        match route(layout) {
            Route::Small(index) => unsafe { dealloc_small(ptr, index) },
            Route::Pages(bytes) => unsafe { dealloc_large(ptr, bytes) },
            Route::Unsupported => {}
        }
    }
}

/// Allocate at least `size` bytes from the process-wide allocator. See
/// [`TierMalloc::allocate`].
#[inline]
pub fn allocate(size: usize) -> *mut u8 {
    TierMalloc.allocate(size)
}

/// Release a block obtained from [`allocate`].
///
/// # Safety
/// See [`TierMalloc::deallocate`].
#[inline]
pub unsafe fn deallocate(ptr: *mut u8, size: usize) {
    unsafe { TierMalloc.deallocate(ptr, size) }
}
