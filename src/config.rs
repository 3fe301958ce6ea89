//! Compile-time configuration constants.
//!
//! There is no runtime configuration: no environment variables, no config
//! files, no CLI. Everything the allocator needs to know is fixed here.

/// Minimum alignment (and granularity) of every size class, in bytes.
///
/// All returned pointers are aligned to this, and a free block must be able
/// to hold one `next` pointer, so this can never go below
/// `size_of::<usize>()`.
pub const ALIGNMENT: usize = 8;

/// Largest request serviced by the size-class tiers (256 KiB).
///
/// Anything bigger is handed straight to the OS page primitive and never
/// enters the pool.
pub const MAX_BYTES: usize = 256 * 1024;

/// Number of size classes: one per `ALIGNMENT` step up to `MAX_BYTES`.
/// Class `i` serves blocks of exactly `(i + 1) * ALIGNMENT` bytes.
pub const FREE_LIST_SIZE: usize = MAX_BYTES / ALIGNMENT;

/// Page size used by the allocator (4 KiB, the common OS page).
pub const PAGE_SHIFT: usize = 12;
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// Default span handed from the page cache to the central cache: 8 pages
/// (32 KiB). Classes whose block size exceeds this get a span sized to fit
/// exactly one block instead.
pub const SPAN_PAGES: usize = 8;

/// Thread-cache spill threshold: once a per-class free list grows past this
/// many blocks, roughly half of it is shipped back to the central cache.
pub const MAX_LIST_LEN: u32 = 64;

/// Upper bound on the bytes moved in one thread-cache refill batch.
pub const MAX_BATCH_BYTES: usize = 4096;

/// Largest page count with a dedicated free-span list in the page cache.
/// Free spans bigger than this live on a single overflow list searched
/// best-fit.
pub const MAX_SPAN_PAGES: usize = 128;
