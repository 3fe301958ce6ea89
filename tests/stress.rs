//! Stress tests with fill-pattern corruption detection: fill every block
//! with a pattern derived from its address and size, verify before freeing.
//! Use-after-free, double-free, or overlap shows up as a pattern mismatch.

use std::alloc::{GlobalAlloc, Layout};
use tiermalloc::{TierMalloc, allocate, deallocate};

#[global_allocator]
static GLOBAL: TierMalloc = TierMalloc;

fn fill_pattern(ptr: *mut u8, size: usize) {
    let seed = ptr as usize ^ size;
    for i in 0..size {
        unsafe {
            *ptr.add(i) = ((seed.wrapping_add(i).wrapping_mul(0x9E37_79B9)) & 0xFF) as u8;
        }
    }
}

fn check_pattern(ptr: *mut u8, size: usize) -> bool {
    let seed = ptr as usize ^ size;
    for i in 0..size {
        let expected = ((seed.wrapping_add(i).wrapping_mul(0x9E37_79B9)) & 0xFF) as u8;
        if unsafe { *ptr.add(i) } != expected {
            return false;
        }
    }
    true
}

#[test]
fn stress_single_thread_churn() {
    let sizes: &[usize] = &[8, 16, 32, 64, 128, 256, 512, 1024, 4096, 8192, 262144, 300_000];
    let rounds = 50;

    let mut live: Vec<(*mut u8, usize)> = Vec::new();

    for round in 0..rounds {
        for &size in sizes {
            let ptr = allocate(size);
            assert!(!ptr.is_null(), "allocate failed for size {size}");
            fill_pattern(ptr, size);
            live.push((ptr, size));
        }

        for &(ptr, size) in &live {
            assert!(
                check_pattern(ptr, size),
                "corruption at round {round}, size {size}"
            );
        }

        // Free half, picked non-sequentially to stress list ordering.
        let drain = live.len() / 2;
        for _ in 0..drain {
            let idx = (round * 7 + 3) % live.len();
            let (ptr, size) = live.swap_remove(idx);
            assert!(check_pattern(ptr, size), "corruption before free");
            unsafe { deallocate(ptr, size) };
        }
    }

    for (ptr, size) in live {
        assert!(check_pattern(ptr, size));
        unsafe { deallocate(ptr, size) };
    }
}

#[test]
fn stress_cross_thread_pattern() {
    use std::sync::mpsc;

    let npairs = 4;
    let ops = 500;
    let sizes: &[usize] = &[16, 64, 256, 1024, 8192];

    let mut producers = Vec::new();
    let mut consumers = Vec::new();

    for pair in 0..npairs {
        let (tx, rx) = mpsc::channel::<(usize, usize)>();

        producers.push(std::thread::spawn(move || {
            for i in 0..ops {
                let size = sizes[(pair + i) % sizes.len()];
                let ptr = allocate(size);
                assert!(!ptr.is_null());
                fill_pattern(ptr, size);
                tx.send((ptr as usize, size)).unwrap();
            }
        }));

        consumers.push(std::thread::spawn(move || {
            let mut count = 0usize;
            for (addr, size) in rx {
                let ptr = addr as *mut u8;
                assert!(
                    check_pattern(ptr, size),
                    "cross-thread corruption at pair {pair}, item {count}"
                );
                unsafe { deallocate(ptr, size) };
                count += 1;
            }
            count
        }));
    }

    for h in producers {
        h.join().unwrap();
    }
    let total: usize = consumers.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, npairs * ops);
}

#[test]
fn stress_many_threads_concurrent() {
    let nthreads = 8;
    let ops_per_thread = 400;

    let handles: Vec<_> = (0..nthreads)
        .map(|tid| {
            std::thread::spawn(move || {
                let mut live: Vec<(*mut u8, usize)> = Vec::with_capacity(64);

                for i in 0..ops_per_thread {
                    let size = [8, 32, 64, 128, 512, 2048][(tid + i) % 6];
                    let ptr = allocate(size);
                    assert!(!ptr.is_null());
                    fill_pattern(ptr, size);
                    live.push((ptr, size));

                    if live.len() > 32 {
                        for _ in 0..16 {
                            let (ptr, size) = live.pop().unwrap();
                            assert!(
                                check_pattern(ptr, size),
                                "thread {tid} corruption at op {i}"
                            );
                            unsafe { deallocate(ptr, size) };
                        }
                    }
                }

                for (ptr, size) in live {
                    assert!(check_pattern(ptr, size));
                    unsafe { deallocate(ptr, size) };
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
}

/// Address-independent fill, so content survives a moving realloc.
fn fill_fixed(ptr: *mut u8, size: usize, seed: usize) {
    for i in 0..size {
        unsafe {
            *ptr.add(i) = ((seed.wrapping_add(i).wrapping_mul(0x9E37_79B9)) & 0xFF) as u8;
        }
    }
}

fn check_fixed(ptr: *mut u8, size: usize, seed: usize) -> bool {
    for i in 0..size {
        let expected = ((seed.wrapping_add(i).wrapping_mul(0x9E37_79B9)) & 0xFF) as u8;
        if unsafe { *ptr.add(i) } != expected {
            return false;
        }
    }
    true
}

#[test]
fn stress_realloc_preserves_content() {
    // Exercises the GlobalAlloc surface, including its realloc.
    let initial = 64;
    let layout = Layout::from_size_align(initial, 8).unwrap();

    for round in 0..100 {
        let seed = round * 31 + 7;
        let ptr = unsafe { GLOBAL.alloc(layout) };
        assert!(!ptr.is_null());
        fill_fixed(ptr, initial, seed);

        let grown = unsafe { GLOBAL.realloc(ptr, layout, 256) };
        assert!(!grown.is_null());
        assert!(
            check_fixed(grown, initial, seed),
            "realloc lost content during grow (round {round})"
        );

        let grown_layout = Layout::from_size_align(256, 8).unwrap();
        unsafe { GLOBAL.dealloc(grown, grown_layout) };
    }
}
