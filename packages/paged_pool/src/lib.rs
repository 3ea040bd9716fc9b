//! A fixed-size object pool allocator that serves equally sized blocks from
//! pre-reserved pages of raw bytes and recycles freed blocks on an intrusive
//! free list.
//!
//! This crate provides [`PagedPool`], a single-threaded user-space memory
//! manager for workloads that cannot tolerate the latency variance of a
//! general-purpose heap but can statically bound an object's size: game
//! engines, interpreter cell heaps, high-throughput request pools.
//!
//! # Key Features
//!
//! - **O(1) acquire and release**: blocks come off an intrusive free list
//!   whose nodes are the blocks themselves
//! - **Byte-exact page geometry**: configurable alignment, pad bands and
//!   per-block headers, laid out deterministically within each page
//! - **Lifecycle signatures**: every region is painted with a one-byte
//!   [`signature`] encoding its state, making raw memory self-describing
//!   in a debugger or a test
//! - **Release-time verification**: optional double-free, out-of-range,
//!   misaligned-release and pad-corruption detection with typed
//!   [`PoolError`] reporting
//! - **Inspection and compaction**: in-use dump and pad validation
//!   callbacks, plus release of fully-empty pages back to the system heap
//!
//! # Examples
//!
//! ```
//! use std::num::NonZero;
//!
//! use paged_pool::{PagedPool, PoolError};
//!
//! // Two pages of four 16-byte blocks at most.
//! let mut pool = PagedPool::builder()
//!     .object_size(16)
//!     .objects_per_page(NonZero::new(4).unwrap())
//!     .max_pages(2)
//!     .debug_checks(true)
//!     .build()?;
//!
//! let block = pool.acquire(None)?;
//!
//! // The pool traffics in untyped bytes; the caller owns the block until
//! // it is released.
//! // SAFETY: The block is 16 bytes of exclusively owned memory.
//! unsafe {
//!     block.as_ptr().cast::<u64>().write_unaligned(0xFEED_F00D);
//! }
//!
//! // SAFETY: The block came from this pool and is released exactly once.
//! unsafe {
//!     pool.release(block.as_ptr())?;
//! }
//!
//! // Releasing again is caught by the debug checks.
//! // SAFETY: Debug checks are enabled, so the double free is detected.
//! let result = unsafe { pool.release(block.as_ptr()) };
//! assert!(matches!(result, Err(PoolError::MultipleFree { .. })));
//! # Ok::<(), paged_pool::PoolError>(())
//! ```
//!
//! # Non-goals
//!
//! The pool is single-threaded by contract and performs no synchronization.
//! It does not coalesce blocks, does not serve variable-sized requests, does
//! not relocate live blocks, and does not run constructors or destructors
//! for the bytes it stores.

mod builder;
mod config;
mod error;
mod geometry;
mod header;
mod links;
mod page;
mod pool;
pub mod signature;
mod stats;

pub use builder::*;
pub use config::*;
pub use error::PoolError;
pub(crate) use error::Result;
pub use header::BlockDescriptor;
pub use pool::PagedPool;
pub use stats::*;
