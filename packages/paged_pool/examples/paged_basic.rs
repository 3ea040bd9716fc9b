//! Basic usage example for `PagedPool`.
//!
//! This example demonstrates acquiring and releasing untyped blocks, reading
//! the statistics counters, and compacting empty pages.

use std::num::NonZero;

use paged_pool::{PagedPool, PoolError};

fn main() -> Result<(), PoolError> {
    // A pool of 32-byte blocks, eight per page, at most four pages.
    let mut pool = PagedPool::builder()
        .object_size(32)
        .objects_per_page(NonZero::new(8).unwrap())
        .max_pages(4)
        .build()?;

    println!("Created pool: {} bytes per page", pool.stats().page_bytes);

    // Acquire a dozen blocks; the pool grows a second page on demand.
    let blocks: Vec<_> = (0..12)
        .map(|_| pool.acquire(None))
        .collect::<Result<_, _>>()?;

    println!(
        "Acquired {} blocks across {} pages",
        pool.stats().objects_in_use,
        pool.stats().pages_in_use
    );

    // The blocks are untyped bytes; store whatever fits.
    for (i, block) in blocks.iter().enumerate() {
        // SAFETY: Each block is 32 exclusively owned bytes.
        unsafe {
            block.as_ptr().cast::<u64>().write_unaligned(i as u64);
        }
    }

    // Release everything and compact.
    for block in blocks {
        // SAFETY: Each block came from this pool and is released exactly once.
        unsafe {
            pool.release(block.as_ptr())?;
        }
    }

    let released = pool.free_empty_pages();
    println!("Compaction released {released} empty pages");

    let stats = pool.stats();
    println!(
        "Final counters: {} allocations, {} deallocations, high-water mark {}",
        stats.allocations, stats.deallocations, stats.most_objects
    );

    Ok(())
}
