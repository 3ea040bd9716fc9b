//! Integration tests for the `paged_pool` package.
//!
//! These exercise the pool's observable contract end to end: the bookkeeping
//! identities, the signature painting, the release-time verification, and
//! the page lifecycle including compaction.

#![allow(
    clippy::undocumented_unsafe_blocks,
    reason = "test code doesn't need the same safety rigor as production code"
)]

use std::num::NonZero;
use std::ptr::NonNull;

use paged_pool::{BlockDescriptor, HeaderKind, PagedPool, PoolError, signature};

/// Collects the free-list node addresses by walking the intrusive links.
fn free_list(pool: &PagedPool) -> Vec<NonNull<u8>> {
    let mut nodes = Vec::new();
    let mut cursor = pool.free_list_head();

    while let Some(node) = cursor {
        nodes.push(node);
        cursor = NonNull::new(unsafe { node.as_ptr().cast::<*mut u8>().read_unaligned() });
    }

    nodes
}

/// Asserts the identity that must hold at every observable point:
/// free + in-use covers exactly the blocks of all live pages.
fn assert_block_identity(pool: &PagedPool) {
    let stats = pool.stats();

    assert_eq!(
        stats.free_objects + stats.objects_in_use,
        stats.pages_in_use * pool.config().objects_per_page.get(),
    );
    assert!(stats.most_objects >= stats.objects_in_use);
    assert!(stats.allocations >= stats.deallocations);
    assert_eq!(free_list(pool).len(), stats.free_objects);
}

#[test]
fn page_cap_is_enforced_after_the_last_page_fills() {
    // objectSize=8, objectsPerPage=4, maxPages=2, everything else disabled.
    let mut pool = PagedPool::builder()
        .object_size(8)
        .objects_per_page(NonZero::new(4).unwrap())
        .max_pages(2)
        .build()
        .unwrap();

    for _ in 0..4 {
        let _ = pool.acquire(None).unwrap();
    }
    assert_eq!(pool.stats().pages_in_use, 1);

    // The fifth acquire must build a second page.
    let _ = pool.acquire(None).unwrap();
    assert_eq!(pool.stats().pages_in_use, 2);

    for _ in 0..3 {
        let _ = pool.acquire(None).unwrap();
    }

    // The ninth acquire exceeds the cap.
    let result = pool.acquire(None);
    assert!(matches!(result, Err(PoolError::NoPages { max_pages: 2 })));

    assert_block_identity(&pool);
}

#[test]
fn double_free_is_detected_by_the_free_list_scan() {
    let mut pool = PagedPool::builder()
        .object_size(8)
        .objects_per_page(NonZero::new(4).unwrap())
        .max_pages(2)
        .debug_checks(true)
        .build()
        .unwrap();

    let block = pool.acquire(None).unwrap();

    unsafe {
        pool.release(block.as_ptr()).unwrap();

        let result = pool.release(block.as_ptr());
        assert!(matches!(result, Err(PoolError::MultipleFree { .. })));
    }

    // The failed release changed nothing.
    assert_eq!(pool.stats().deallocations, 1);
    assert_block_identity(&pool);
}

#[test]
fn pad_corruption_is_detected_at_release() {
    // objectSize=16, objectsPerPage=2, padBytes=2, debug on.
    let mut pool = PagedPool::builder()
        .object_size(16)
        .objects_per_page(NonZero::new(2).unwrap())
        .pad_bytes(2)
        .debug_checks(true)
        .build()
        .unwrap();

    let block = pool.acquire(None).unwrap();

    unsafe {
        // Stray write one byte before the block, into the left pad band.
        block.as_ptr().sub(1).write(0x00);

        let result = pool.release(block.as_ptr());
        assert!(matches!(result, Err(PoolError::CorruptedBlock { .. })));
    }

    // The failed release changed nothing.
    assert_eq!(pool.stats().objects_in_use, 1);
    assert_block_identity(&pool);
}

#[test]
fn basic_headers_record_and_zero_the_allocation_serial() {
    // objectSize=16, objectsPerPage=2, basic headers.
    let mut pool = PagedPool::builder()
        .object_size(16)
        .objects_per_page(NonZero::new(2).unwrap())
        .header(HeaderKind::Basic)
        .build()
        .unwrap();

    // The basic header (u32 serial + flag byte) sits directly before the
    // block when no pad band is configured.
    let serial_of = |block: NonNull<u8>| unsafe {
        block.as_ptr().sub(5).cast::<u32>().read_unaligned()
    };

    let first = pool.acquire(None).unwrap();
    assert_eq!(serial_of(first), 1);

    let second = pool.acquire(None).unwrap();
    assert_eq!(serial_of(second), 2);

    unsafe {
        pool.release(first.as_ptr()).unwrap();
    }
    assert_eq!(serial_of(first), 0);

    // The in-use flag follows the serial.
    let flag_of = |block: NonNull<u8>| unsafe { block.as_ptr().sub(1).read() };
    assert_eq!(flag_of(first), 0);
    assert_eq!(flag_of(second), 1);
}

#[test]
fn aligned_pools_return_aligned_addresses_with_painted_gaps() {
    // objectSize=12, objectsPerPage=3, alignment=8, no headers.
    let mut pool = PagedPool::builder()
        .object_size(12)
        .objects_per_page(NonZero::new(3).unwrap())
        .alignment(8)
        .build()
        .unwrap();

    let blocks: Vec<_> = (0..3).map(|_| pool.acquire(None).unwrap()).collect();

    for block in &blocks {
        assert_eq!(block.addr().get() % 8, 0);
    }

    // Between adjacent blocks, the inter-alignment region carries its
    // signature: the 4 bytes after each 12-byte block except the last.
    for block in &blocks[..2] {
        let gap = unsafe { std::slice::from_raw_parts(block.as_ptr().add(12), 4) };
        assert_eq!(gap, [signature::ALIGN; 4]);
    }
}

#[test]
fn compaction_releases_only_fully_empty_pages() {
    // objectsPerPage=4, maxPages=0 (unbounded).
    let mut pool = PagedPool::builder()
        .object_size(8)
        .objects_per_page(NonZero::new(4).unwrap())
        .build()
        .unwrap();

    let first_page_blocks: Vec<_> = (0..4).map(|_| pool.acquire(None).unwrap()).collect();
    let _second_page_blocks: Vec<_> = (0..4).map(|_| pool.acquire(None).unwrap()).collect();
    assert_eq!(pool.stats().pages_in_use, 2);

    for block in &first_page_blocks {
        unsafe {
            pool.release(block.as_ptr()).unwrap();
        }
    }

    assert_eq!(pool.free_empty_pages(), 1);
    assert_eq!(pool.stats().pages_in_use, 1);

    // The released page's blocks are gone from the free list; the surviving
    // page is fully in use, so the free list is empty.
    let remaining = free_list(&pool);
    for block in &first_page_blocks {
        assert!(!remaining.contains(block));
    }
    assert!(remaining.is_empty());

    assert_block_identity(&pool);
}

#[test]
fn compaction_excises_interleaved_free_list_nodes() {
    let mut pool = PagedPool::builder()
        .object_size(8)
        .objects_per_page(NonZero::new(4).unwrap())
        .build()
        .unwrap();

    let blocks: Vec<_> = (0..8).map(|_| pool.acquire(None).unwrap()).collect();
    assert_eq!(pool.stats().pages_in_use, 2);

    // Release in an order that interleaves the two pages' blocks on the
    // free list; the excision pass must not rely on any grouping.
    for pair in blocks[..4].iter().zip(&blocks[4..]) {
        unsafe {
            pool.release(pair.0.as_ptr()).unwrap();
            pool.release(pair.1.as_ptr()).unwrap();
        }
    }

    assert_eq!(pool.free_empty_pages(), 2);
    assert_eq!(pool.stats().pages_in_use, 0);
    assert!(pool.free_list_head().is_none());
    assert!(pool.page_list_head().is_none());
    assert_block_identity(&pool);

    // The pool recovers by building a fresh page on demand.
    let block = pool.acquire(None).unwrap();
    assert_eq!(pool.stats().pages_in_use, 1);
    unsafe {
        pool.release(block.as_ptr()).unwrap();
    }
}

#[test]
fn compaction_consults_headers_when_present() {
    let mut pool = PagedPool::builder()
        .object_size(16)
        .objects_per_page(NonZero::new(2).unwrap())
        .header(HeaderKind::Basic)
        .build()
        .unwrap();

    let held = pool.acquire(None).unwrap();

    // One block is still flagged in use, so nothing can be released.
    assert_eq!(pool.free_empty_pages(), 0);
    assert_eq!(pool.stats().pages_in_use, 1);

    unsafe {
        pool.release(held.as_ptr()).unwrap();
    }

    assert_eq!(pool.free_empty_pages(), 1);
    assert_eq!(pool.stats().pages_in_use, 0);
}

#[test]
fn release_of_foreign_or_interior_addresses_is_rejected() {
    let mut pool = PagedPool::builder()
        .object_size(16)
        .objects_per_page(NonZero::new(4).unwrap())
        .debug_checks(true)
        .build()
        .unwrap();

    let block = pool.acquire(None).unwrap();

    // An address the pool has never seen.
    let mut foreign = 0_u64;
    let result = unsafe { pool.release(std::ptr::from_mut(&mut foreign).cast()) };
    assert!(matches!(result, Err(PoolError::BadBoundary { .. })));

    // An address inside a page but off the block boundary.
    let result = unsafe { pool.release(block.as_ptr().add(1)) };
    assert!(matches!(result, Err(PoolError::BadBoundary { .. })));

    // The genuine boundary still releases cleanly.
    unsafe {
        pool.release(block.as_ptr()).unwrap();
    }
}

#[test]
fn acquire_then_release_round_trip_never_fails_under_debug_checks() {
    let mut pool = PagedPool::builder()
        .object_size(32)
        .objects_per_page(NonZero::new(3).unwrap())
        .pad_bytes(3)
        .alignment(4)
        .header(HeaderKind::Basic)
        .debug_checks(true)
        .build()
        .unwrap();

    for _ in 0..4 {
        let blocks: Vec<_> = (0..6).map(|_| pool.acquire(None).unwrap()).collect();

        // All distinct, all aligned.
        for (i, a) in blocks.iter().enumerate() {
            assert_eq!(a.addr().get() % 4, 0);
            for b in blocks.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }

        for block in blocks.iter().rev() {
            unsafe {
                pool.release(block.as_ptr()).unwrap();
            }
        }

        assert_block_identity(&pool);
    }

    let stats = pool.stats();
    assert_eq!(stats.objects_in_use, 0);
    assert_eq!(
        stats.free_objects,
        stats.pages_in_use * pool.config().objects_per_page.get()
    );
}

#[test]
fn signatures_trace_the_block_lifecycle() {
    let mut pool = PagedPool::builder()
        .object_size(16)
        .objects_per_page(NonZero::new(2).unwrap())
        .build()
        .unwrap();

    let link_bytes = size_of::<*mut u8>();

    // A never-acquired block is UNALLOCATED beyond its free-list link.
    let untouched = free_list(&pool)[1];
    let tail = unsafe { std::slice::from_raw_parts(untouched.as_ptr().add(link_bytes), 16 - link_bytes) };
    assert!(tail.iter().all(|&byte| byte == signature::UNALLOCATED));

    // An acquired block is ALLOCATED end to end.
    let block = pool.acquire(None).unwrap();
    let bytes = unsafe { std::slice::from_raw_parts(block.as_ptr(), 16) };
    assert!(bytes.iter().all(|&byte| byte == signature::ALLOCATED));

    // A released block is FREED beyond the link that reclaimed its start.
    unsafe {
        pool.release(block.as_ptr()).unwrap();
    }
    let tail = unsafe { std::slice::from_raw_parts(block.as_ptr().add(link_bytes), 16 - link_bytes) };
    assert!(tail.iter().all(|&byte| byte == signature::FREED));
}

#[test]
fn extended_headers_count_lifetimes_per_slot() {
    let mut pool = PagedPool::builder()
        .object_size(16)
        .objects_per_page(NonZero::new(2).unwrap())
        .header(HeaderKind::Extended {
            user_defined_bytes: 4,
        })
        .build()
        .unwrap();

    // Header layout: [user 4][use u16][serial u32][flag], directly before
    // the block when no pad band is configured.
    let use_count_of = |block: NonNull<u8>| unsafe {
        block.as_ptr().sub(7).cast::<u16>().read_unaligned()
    };

    let block = pool.acquire(None).unwrap();
    assert_eq!(use_count_of(block), 1);

    unsafe {
        pool.release(block.as_ptr()).unwrap();
    }

    // The use counter survives release; LIFO recycling returns the same slot.
    let again = pool.acquire(None).unwrap();
    assert_eq!(again, block);
    assert_eq!(use_count_of(again), 2);

    unsafe {
        pool.release(again.as_ptr()).unwrap();
    }
    assert_eq!(use_count_of(block), 2);
}

#[test]
fn external_headers_carry_descriptors_with_labels() {
    let mut pool = PagedPool::builder()
        .object_size(16)
        .objects_per_page(NonZero::new(2).unwrap())
        .header(HeaderKind::External)
        .build()
        .unwrap();

    let descriptor_of = |block: NonNull<u8>| unsafe {
        block
            .as_ptr()
            .sub(size_of::<*mut u8>())
            .cast::<*mut BlockDescriptor>()
            .read_unaligned()
    };

    let block = pool.acquire(Some(b"render queue")).unwrap();

    let descriptor = descriptor_of(block);
    assert!(!descriptor.is_null());
    unsafe {
        assert!((*descriptor).in_use);
        assert_eq!((*descriptor).allocation_number, 1);
        assert_eq!(&*(*descriptor).label, b"render queue");
    }

    unsafe {
        pool.release(block.as_ptr()).unwrap();
    }

    // The descriptor is gone and the header pointer is nulled.
    assert!(descriptor_of(block).is_null());

    // A label-less acquire gets an empty label.
    let unlabeled = pool.acquire(None).unwrap();
    let descriptor = descriptor_of(unlabeled);
    unsafe {
        assert!((&(*descriptor).label).is_empty());
        pool.release(unlabeled.as_ptr()).unwrap();
    }
}

#[test]
fn dump_in_use_reports_held_blocks_for_every_header_kind() {
    for header in [
        HeaderKind::None,
        HeaderKind::Basic,
        HeaderKind::Extended {
            user_defined_bytes: 2,
        },
        HeaderKind::External,
    ] {
        let mut pool = PagedPool::builder()
            .object_size(16)
            .objects_per_page(NonZero::new(4).unwrap())
            .header(header)
            .build()
            .unwrap();

        let a = pool.acquire(None).unwrap();
        let b = pool.acquire(None).unwrap();
        let c = pool.acquire(None).unwrap();

        unsafe {
            pool.release(b.as_ptr()).unwrap();
        }

        let mut seen = Vec::new();
        let count = pool.dump_in_use(|address, size| seen.push((address, size)));

        assert_eq!(count, 2, "header kind {header:?}");
        assert!(seen.contains(&(a, 16)));
        assert!(seen.contains(&(c, 16)));
        assert!(!seen.iter().any(|entry| entry.0 == b));

        unsafe {
            pool.release(a.as_ptr()).unwrap();
            pool.release(c.as_ptr()).unwrap();
        }
    }
}

#[test]
fn validate_padding_reports_each_corrupted_block() {
    let mut pool = PagedPool::builder()
        .object_size(16)
        .objects_per_page(NonZero::new(4).unwrap())
        .pad_bytes(2)
        .build()
        .unwrap();

    let clean = pool.acquire(None).unwrap();
    let dirty = pool.acquire(None).unwrap();

    unsafe {
        // Overrun: one byte past the end of the block, into the right pad.
        dirty.as_ptr().add(16).write(0x00);
    }

    let mut seen = Vec::new();
    let count = pool.validate_padding(|address, size| seen.push((address, size)));

    assert_eq!(count, 1);
    assert_eq!(seen, vec![(dirty, 16)]);

    unsafe {
        pool.release(clean.as_ptr()).unwrap();
    }
}

#[test]
fn validate_padding_is_trivial_without_pad_bands() {
    let pool = PagedPool::builder().object_size(16).build().unwrap();

    let count = pool.validate_padding(|_, _| panic!("no block can be corrupted"));
    assert_eq!(count, 0);
}

#[test]
fn mixed_operation_sequences_preserve_the_identities() {
    let mut pool = PagedPool::builder()
        .object_size(24)
        .objects_per_page(NonZero::new(3).unwrap())
        .header(HeaderKind::Basic)
        .debug_checks(true)
        .build()
        .unwrap();

    let mut held = Vec::new();

    // Grow, shrink, compact, grow again; check the identities throughout.
    for round in 0..5 {
        for _ in 0..=round {
            held.push(pool.acquire(None).unwrap());
            assert_block_identity(&pool);
        }

        let keep = held.len() / 2;
        for block in held.split_off(keep) {
            unsafe {
                pool.release(block.as_ptr()).unwrap();
            }
            assert_block_identity(&pool);
        }

        pool.free_empty_pages();
        assert_block_identity(&pool);
    }

    for block in held.drain(..) {
        unsafe {
            pool.release(block.as_ptr()).unwrap();
        }
    }

    let stats = pool.stats();
    assert_eq!(stats.objects_in_use, 0);
    assert_eq!(
        stats.free_objects,
        stats.pages_in_use * pool.config().objects_per_page.get()
    );
    assert_block_identity(&pool);
}
