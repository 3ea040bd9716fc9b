//! Demonstrates the release-time verification of `PagedPool`.
//!
//! With debug checks enabled, the pool detects double frees, releases of
//! foreign or misaligned addresses, and writes that strayed into the pad
//! bands bracketing a block.

use std::num::NonZero;

use paged_pool::{PagedPool, PoolError};

fn main() -> Result<(), PoolError> {
    let mut pool = PagedPool::builder()
        .object_size(16)
        .objects_per_page(NonZero::new(4).unwrap())
        .pad_bytes(2)
        .debug_checks(true)
        .build()?;

    // A double free is caught by the free-list scan.
    let block = pool.acquire(None)?;
    // SAFETY: The block came from this pool and is in use.
    unsafe {
        pool.release(block.as_ptr())?;
    }
    // SAFETY: Debug checks are enabled, so the double free is detected.
    let result = unsafe { pool.release(block.as_ptr()) };
    println!("second release: {}", result.unwrap_err());

    // A misaligned address is caught by the boundary check.
    let block = pool.acquire(None)?;
    // SAFETY: Debug checks are enabled, so the bad boundary is detected.
    let result = unsafe { pool.release(block.as_ptr().add(3)) };
    println!("misaligned release: {}", result.unwrap_err());

    // A buffer overrun into the pad band is caught by the pad check.
    // SAFETY: The write lands in the pool's own pad band, which exists to
    // absorb and expose exactly this kind of stray write.
    unsafe {
        block.as_ptr().add(16).write(0);
    }
    // SAFETY: Debug checks are enabled, so the corruption is detected.
    let result = unsafe { pool.release(block.as_ptr()) };
    println!("release after overrun: {}", result.unwrap_err());

    // The padding validator pinpoints the damaged block without releasing it.
    let corrupted = pool.validate_padding(|address, size| {
        println!("corrupted {size}-byte block at {address:p}");
    });
    println!("{corrupted} corrupted block(s) found");

    Ok(())
}
