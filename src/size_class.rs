//! Size class arithmetic: bytes → class index, class index → block bytes.
//!
//! Unlike tcmalloc's hand-tuned table, classes here form a uniform ladder:
//! class `i` serves blocks of exactly `(i + 1) * ALIGNMENT` bytes, covering
//! 8 B to `MAX_BYTES` in 8-byte steps. Lookups are pure arithmetic — no
//! table, no state, no branches beyond the minimum clamp.

use crate::config::{ALIGNMENT, MAX_BATCH_BYTES, MAX_BYTES, PAGE_SIZE, SPAN_PAGES};

/// Round a request up to the next multiple of [`ALIGNMENT`].
///
/// Requests below `ALIGNMENT` (including 0) round up to `ALIGNMENT`.
#[inline]
pub const fn round_up(bytes: usize) -> usize {
    let bytes = if bytes < ALIGNMENT { ALIGNMENT } else { bytes };
    (bytes + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}

/// Map a request to its size class index.
///
/// Valid for `bytes <= MAX_BYTES`; the result is in `0..FREE_LIST_SIZE`.
/// Larger requests are the caller's problem (they bypass the class tiers).
#[inline]
pub const fn index_of(bytes: usize) -> usize {
    let bytes = if bytes < ALIGNMENT { ALIGNMENT } else { bytes };
    (bytes + ALIGNMENT - 1) / ALIGNMENT - 1
}

/// The exact block size served by a class.
#[inline]
pub const fn class_to_size(index: usize) -> usize {
    (index + 1) * ALIGNMENT
}

/// How many blocks a thread cache pulls from the central cache at once.
///
/// The baseline keeps one batch near 2 KiB; the cap keeps it at or below
/// [`MAX_BATCH_BYTES`]. Always at least 1.
#[inline]
pub const fn batch_count(size: usize) -> usize {
    let base = if size <= 32 {
        64
    } else if size <= 64 {
        32
    } else if size <= 128 {
        16
    } else if size <= 256 {
        8
    } else if size <= 512 {
        4
    } else if size <= 1024 {
        2
    } else {
        1
    };

    let cap = MAX_BATCH_BYTES / size;
    let cap = if cap < 1 { 1 } else { cap };
    if base < cap { base } else { cap }
}

/// Pages per span the central cache requests for a class of `size`-byte
/// blocks: the fixed [`SPAN_PAGES`] while one span holds several blocks,
/// otherwise just enough pages for a single block.
#[inline]
pub const fn span_pages_for(size: usize) -> usize {
    if size <= SPAN_PAGES * PAGE_SIZE {
        SPAN_PAGES
    } else {
        size.div_ceil(PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FREE_LIST_SIZE;

    #[test]
    fn round_up_basics() {
        assert_eq!(round_up(0), 8);
        assert_eq!(round_up(1), 8);
        assert_eq!(round_up(8), 8);
        assert_eq!(round_up(9), 16);
        assert_eq!(round_up(15), 16);
        assert_eq!(round_up(16), 16);
        assert_eq!(round_up(MAX_BYTES), MAX_BYTES);
    }

    #[test]
    fn index_basics() {
        assert_eq!(index_of(0), 0);
        assert_eq!(index_of(1), 0);
        assert_eq!(index_of(8), 0);
        assert_eq!(index_of(9), 1);
        assert_eq!(index_of(16), 1);
        assert_eq!(index_of(MAX_BYTES), FREE_LIST_SIZE - 1);
    }

    #[test]
    fn round_up_matches_index() {
        // round_up(n) == (index_of(n) + 1) * ALIGNMENT over the whole range.
        for n in 1..=MAX_BYTES {
            let i = index_of(n);
            assert!(i < FREE_LIST_SIZE, "index out of range for {n}");
            assert_eq!(round_up(n), class_to_size(i), "mismatch at {n}");
        }
    }

    #[test]
    fn index_is_idempotent_on_class_sizes() {
        for i in (0..FREE_LIST_SIZE).step_by(7) {
            let size = class_to_size(i);
            assert_eq!(index_of(size), i);
            assert_eq!(round_up(size), size);
        }
    }

    #[test]
    fn batch_table() {
        assert_eq!(batch_count(8), 64);
        assert_eq!(batch_count(32), 64);
        assert_eq!(batch_count(40), 32);
        assert_eq!(batch_count(64), 32);
        assert_eq!(batch_count(128), 16);
        assert_eq!(batch_count(256), 8);
        assert_eq!(batch_count(512), 4);
        assert_eq!(batch_count(1024), 2);
        assert_eq!(batch_count(1032), 1);
        assert_eq!(batch_count(MAX_BYTES), 1);
    }

    #[test]
    fn batch_never_exceeds_cap() {
        for i in 0..FREE_LIST_SIZE {
            let size = class_to_size(i);
            let batch = batch_count(size);
            assert!(batch >= 1);
            assert!(
                batch == 1 || batch * size <= MAX_BATCH_BYTES,
                "batch {batch} x size {size} exceeds cap"
            );
        }
    }

    #[test]
    fn span_pages_boundaries() {
        assert_eq!(span_pages_for(8), SPAN_PAGES);
        assert_eq!(span_pages_for(4096), SPAN_PAGES);
        assert_eq!(span_pages_for(SPAN_PAGES * PAGE_SIZE), SPAN_PAGES);
        assert_eq!(span_pages_for(SPAN_PAGES * PAGE_SIZE + 8), SPAN_PAGES + 1);
        assert_eq!(span_pages_for(MAX_BYTES), MAX_BYTES / PAGE_SIZE);
    }

    #[test]
    fn exact_page_sizes_fill_spans() {
        // Page-multiple classes divide a span with no waste.
        for size in [4096usize, 8192, 16384, 32768] {
            let pages = span_pages_for(size);
            assert_eq!((pages * PAGE_SIZE) % size, 0);
        }
    }
}
