//! Allocation statistics counters (`stats` feature).
//!
//! All counters use `Relaxed` ordering: they are observational only. The
//! tier locks provide every ordering guarantee the allocator needs for
//! correctness; these exist purely for monitoring.
//!
//! Obtain a [`Snapshot`] with [`snapshot()`]. Individual counter loads are
//! atomic, but the snapshot as a whole is not globally consistent —
//! concurrent allocations may race between loads, which is fine for
//! monitoring.

use core::sync::atomic::{AtomicU64, Ordering};

pub(crate) struct Stats {
    // ---- Front end ----
    /// Allocation requests (after the zero-size guard).
    pub alloc_count: AtomicU64,
    /// Deallocation requests.
    pub dealloc_count: AtomicU64,
    /// Sum of requested byte sizes.
    pub alloc_bytes: AtomicU64,
    /// Requests above MAX_BYTES, served by whole OS pages.
    pub large_allocs: AtomicU64,

    // ---- Tier traffic ----
    /// Thread-cache misses that went to the central cache.
    pub thread_cache_misses: AtomicU64,
    /// Central-cache batch fetches (thread-cache refills and fallbacks).
    pub central_fetches: AtomicU64,
    /// Central-cache batch returns (spills, flushes, fallbacks).
    pub central_returns: AtomicU64,
    /// Spans sliced into blocks by the central cache.
    pub spans_carved: AtomicU64,

    // ---- Page cache / OS ----
    /// Free spans split to serve a smaller request.
    pub span_splits: AtomicU64,
    /// Adjacent free spans merged on release.
    pub span_coalesces: AtomicU64,
    /// Calls into the OS page primitive.
    pub os_alloc_count: AtomicU64,
    /// Bytes requested from the OS.
    pub os_alloc_bytes: AtomicU64,
}

impl Stats {
    const fn new() -> Self {
        Self {
            alloc_count: AtomicU64::new(0),
            dealloc_count: AtomicU64::new(0),
            alloc_bytes: AtomicU64::new(0),
            large_allocs: AtomicU64::new(0),
            thread_cache_misses: AtomicU64::new(0),
            central_fetches: AtomicU64::new(0),
            central_returns: AtomicU64::new(0),
            spans_carved: AtomicU64::new(0),
            span_splits: AtomicU64::new(0),
            span_coalesces: AtomicU64::new(0),
            os_alloc_count: AtomicU64::new(0),
            os_alloc_bytes: AtomicU64::new(0),
        }
    }
}

pub(crate) static STATS: Stats = Stats::new();

/// A point-in-time copy of all counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct Snapshot {
    /// Allocation requests (after the zero-size guard).
    pub alloc_count: u64,
    /// Deallocation requests.
    pub dealloc_count: u64,
    /// Sum of requested byte sizes.
    pub alloc_bytes: u64,
    /// Requests above MAX_BYTES, served by whole OS pages.
    pub large_allocs: u64,
    /// Thread-cache misses that went to the central cache.
    pub thread_cache_misses: u64,
    /// Central-cache batch fetches.
    pub central_fetches: u64,
    /// Central-cache batch returns.
    pub central_returns: u64,
    /// Spans sliced into blocks by the central cache.
    pub spans_carved: u64,
    /// Free spans split to serve a smaller request.
    pub span_splits: u64,
    /// Adjacent free spans merged on release.
    pub span_coalesces: u64,
    /// Calls into the OS page primitive.
    pub os_alloc_count: u64,
    /// Bytes requested from the OS.
    pub os_alloc_bytes: u64,
}

/// Load all counters with `Relaxed` ordering.
pub fn snapshot() -> Snapshot {
    let s = &STATS;
    Snapshot {
        alloc_count: s.alloc_count.load(Ordering::Relaxed),
        dealloc_count: s.dealloc_count.load(Ordering::Relaxed),
        alloc_bytes: s.alloc_bytes.load(Ordering::Relaxed),
        large_allocs: s.large_allocs.load(Ordering::Relaxed),
        thread_cache_misses: s.thread_cache_misses.load(Ordering::Relaxed),
        central_fetches: s.central_fetches.load(Ordering::Relaxed),
        central_returns: s.central_returns.load(Ordering::Relaxed),
        spans_carved: s.spans_carved.load(Ordering::Relaxed),
        span_splits: s.span_splits.load(Ordering::Relaxed),
        span_coalesces: s.span_coalesces.load(Ordering::Relaxed),
        os_alloc_count: s.os_alloc_count.load(Ordering::Relaxed),
        os_alloc_bytes: s.os_alloc_bytes.load(Ordering::Relaxed),
    }
}
