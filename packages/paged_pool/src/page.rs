use std::alloc::{alloc, dealloc};
use std::ptr::NonNull;

use crate::geometry::PageGeometry;
use crate::links::{self, LINK_BYTES};
use crate::{PoolConfig, PoolError, Result, signature};

/// One live page: a contiguous raw byte array housing a next-page link,
/// alignment regions, and a run of slots.
///
/// `Page` is a thin view over the page base address; the pool owns the
/// memory and decides when it is created and destroyed.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Page {
    base: NonNull<u8>,
}

impl Page {
    /// Wraps an existing page base address.
    ///
    /// # Safety
    ///
    /// `base` must be the base address of a live page allocated by
    /// [`Page::build()`] with the same geometry that is later passed to the
    /// view's methods.
    #[must_use]
    pub(crate) unsafe fn from_base(base: NonNull<u8>) -> Self {
        Self { base }
    }

    /// Allocates and initializes one page, linking it at the head of the
    /// page list and threading every slot onto the head of the free list.
    ///
    /// Slots are threaded so that the lowest-address slot ends up at the
    /// free-list head; acquisition therefore walks a fresh page in ascending
    /// address order.
    ///
    /// Fails with [`PoolError::OutOfMemory`] if the system heap refuses.
    pub(crate) fn build(
        geometry: &PageGeometry,
        config: &PoolConfig,
        page_head: &mut Option<NonNull<u8>>,
        free_head: &mut Option<NonNull<u8>>,
    ) -> Result<Self> {
        // SAFETY: The geometry guarantees a valid non-zero-size layout.
        let Some(base) = NonNull::new(unsafe { alloc(geometry.page_layout) }) else {
            return Err(PoolError::OutOfMemory {
                requested: geometry.page_bytes,
            });
        };

        let page = Self { base };

        // SAFETY: We just allocated page_bytes at base; every painted region
        // below lies within that range by construction of the geometry.
        unsafe {
            signature::paint(base, geometry.page_bytes, signature::UNALLOCATED);

            signature::paint(
                base.byte_add(LINK_BYTES),
                geometry.left_align_bytes,
                signature::ALIGN,
            );

            for index in 0..config.objects_per_page.get() {
                let slot = base.byte_add(geometry.slot_offset(index));

                // Header bytes start out zeroed: flags clear, serials zero,
                // descriptor pointers null.
                signature::paint(slot, geometry.header_bytes, 0);

                signature::paint(
                    slot.byte_add(geometry.header_bytes),
                    config.pad_bytes,
                    signature::PAD,
                );

                let block_end = geometry.header_bytes + config.pad_bytes + config.object_size;

                signature::paint(slot.byte_add(block_end), config.pad_bytes, signature::PAD);

                // The inter-align region is omitted after the last slot.
                if index + 1 < config.objects_per_page.get() {
                    signature::paint(
                        slot.byte_add(block_end + config.pad_bytes),
                        geometry.inter_align_bytes,
                        signature::ALIGN,
                    );
                }
            }

            // Head-insert the page itself.
            links::write_link(base, *page_head);
            *page_head = Some(base);

            // Head-insert the slots in descending address order so the
            // lowest-address slot lands at the head.
            for index in (0..config.objects_per_page.get()).rev() {
                let block = page.block_ptr(index, geometry);
                links::write_link(block, *free_head);
                *free_head = Some(block);
            }
        }

        Ok(page)
    }

    /// The page base address, which doubles as the page-list node.
    #[must_use]
    pub(crate) fn base(&self) -> NonNull<u8> {
        self.base
    }

    /// The next page in the page list, if any.
    #[must_use]
    pub(crate) fn next(&self) -> Option<Self> {
        // SAFETY: The from_base()/build() contract guarantees the prefix
        // holds the page-list link.
        let next_base = unsafe { links::read_link(self.base) }?;

        // SAFETY: Page-list links only ever point at live page bases.
        Some(unsafe { Self::from_base(next_base) })
    }

    /// Replaces the next-page link.
    pub(crate) fn set_next(&self, next: Option<NonNull<u8>>) {
        // SAFETY: The from_base()/build() contract guarantees the prefix
        // is writable link storage.
        unsafe {
            links::write_link(self.base, next);
        }
    }

    /// Address of slot `index`'s block.
    #[must_use]
    pub(crate) fn block_ptr(&self, index: usize, geometry: &PageGeometry) -> NonNull<u8> {
        // SAFETY: Every slot's block lies within the page allocation.
        unsafe { self.base.byte_add(geometry.user_offset(index)) }
    }

    /// Address of slot `index`'s header.
    #[must_use]
    pub(crate) fn header_ptr(&self, index: usize, geometry: &PageGeometry) -> NonNull<u8> {
        // SAFETY: Every slot's header lies within the page allocation.
        unsafe { self.base.byte_add(geometry.slot_offset(index)) }
    }

    /// Whether `addr` falls within this page's byte range.
    #[must_use]
    pub(crate) fn contains(&self, addr: NonNull<u8>, geometry: &PageGeometry) -> bool {
        let start = self.base.addr().get();
        // Cannot overflow: the allocation exists, so its end is representable.
        let end = start.wrapping_add(geometry.page_bytes);
        let addr = addr.addr().get();

        addr >= start && addr < end
    }

    /// Resolves `addr` to a slot index, if it is exactly a block boundary of
    /// this page.
    #[must_use]
    pub(crate) fn slot_index_of(
        &self,
        addr: NonNull<u8>,
        geometry: &PageGeometry,
        objects_per_page: usize,
    ) -> Option<usize> {
        let first_block = self
            .base
            .addr()
            .get()
            .wrapping_add(geometry.first_user_offset);
        let addr = addr.addr().get();

        let offset = addr.checked_sub(first_block)?;

        if offset % geometry.slot_stride != 0 {
            return None;
        }

        let index = offset / geometry.slot_stride;

        // The page byte range extends past the last block boundary (trailing
        // pad band), so the index needs its own bound check.
        (index < objects_per_page).then_some(index)
    }

    /// Returns the page bytes to the system heap.
    ///
    /// # Safety
    ///
    /// The page must not be referenced again: no free-list node may still
    /// live inside it and it must already be unlinked from the page list.
    pub(crate) unsafe fn destroy(self, geometry: &PageGeometry) {
        // SAFETY: Allocated in build() with this same layout.
        unsafe {
            dealloc(self.base.as_ptr(), geometry.page_layout);
        }
    }
}
