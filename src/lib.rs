#![no_std]

//! tiermalloc: a three-tier small-object memory allocator.
//!
//! The tcmalloc lineage, with a uniform size-class ladder:
//! - Thread caches (fast path, no locks) — per-thread free lists, `std`
//!   feature
//! - Central cache (per-size-class spin locks) — shared block pools
//! - Page cache (single lock, OS-backed) — span management
//!
//! Small requests (up to 256 KiB) are rounded to an 8-byte class and served
//! from the tiers; bigger ones go straight to OS pages. The caller supplies
//! the allocation size again at free time, so blocks carry zero metadata.
//!
//! # Usage
//!
//! ```ignore
//! #[global_allocator]
//! static GLOBAL: tiermalloc::TierMalloc = tiermalloc::TierMalloc;
//! ```
//!
//! or directly:
//!
//! ```ignore
//! let p = tiermalloc::allocate(64);
//! unsafe { tiermalloc::deallocate(p, 64) };
//! ```

#[cfg(test)]
extern crate alloc;
#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod allocator;
pub mod block;
pub mod central_cache;
pub mod config;
#[cfg(feature = "ffi")]
pub mod ffi;
mod macros;
pub mod page_cache;
pub mod pagemap;
pub mod platform;
pub mod size_class;
pub mod span;
#[cfg(feature = "stats")]
pub mod stats;
pub mod sync;
pub mod thread_cache;

pub use allocator::{TierMalloc, allocate, deallocate};

// Panic handler for staticlib builds (no_std has no default panic handler).
// Only active when panic="abort", not during normal checks.
#[cfg(all(feature = "ffi", not(test), not(feature = "std"), panic = "abort"))]
#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    unsafe extern "C" {
        fn abort() -> !;
    }
    unsafe { abort() }
}
