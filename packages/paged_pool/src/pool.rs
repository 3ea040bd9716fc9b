use std::alloc::{Layout, alloc, dealloc};
use std::ptr::NonNull;

use tracing::debug;

use crate::geometry::PageGeometry;
use crate::links::{self, Chain};
use crate::page::Page;
use crate::{
    HeaderKind, PagedPoolBuilder, PoolConfig, PoolError, PoolStats, Result, header, signature,
};

/// A fixed-size object pool that serves equally sized blocks from raw byte
/// pages and recycles released blocks on an intrusive free list.
///
/// The pool pre-reserves pages from the system heap, carves each page into
/// slots of a fixed stride, and hands out the slots' user-visible blocks.
/// Released blocks go back onto a singly-linked free list whose nodes are
/// the blocks themselves, so acquire and release are O(1) outside of debug
/// verification.
///
/// # Key Features
///
/// - **Byte-exact page geometry**: headers, pad bands and alignment regions
///   are laid out deterministically and painted with one-byte
///   [signatures](crate::signature) that encode each region's lifecycle state
/// - **Intrusive free list**: free blocks store the link in their own first
///   bytes; no side allocations are made per block
/// - **Release-time verification**: optional double-free, range, alignment
///   and pad-corruption checks, reported as typed [`PoolError`] values
/// - **Header bookkeeping**: four [`HeaderKind`] variants, from zero bytes to
///   an externally allocated [`BlockDescriptor`][crate::BlockDescriptor]
/// - **Inspection**: in-use dump and pad validation callbacks, plus
///   compaction of fully-empty pages
/// - **System-heap bypass**: a mode that forwards every acquire/release to
///   the system heap while keeping the counters live
///
/// # Examples
///
/// ```
/// use paged_pool::PagedPool;
///
/// let mut pool = PagedPool::builder().object_size(16).build()?;
///
/// let block = pool.acquire(None)?;
///
/// // The block is untyped bytes; the caller owns it until release.
/// // SAFETY: The block is 16 bytes of exclusively owned memory.
/// unsafe {
///     block.as_ptr().write_bytes(0x5A, 16);
/// }
///
/// // SAFETY: The block came from this pool and is released exactly once.
/// unsafe {
///     pool.release(block.as_ptr())?;
/// }
///
/// assert_eq!(pool.stats().objects_in_use, 0);
/// # Ok::<(), paged_pool::PoolError>(())
/// ```
///
/// # Thread Safety
///
/// The pool is single-threaded by contract: it is [`Send`] and can be moved
/// between threads, but it is not [`Sync`] and performs no synchronization.
#[derive(Debug)]
pub struct PagedPool {
    /// Decoded once at construction; immutable except the debug toggle.
    config: PoolConfig,

    /// Byte-exact page layout derived from the configuration.
    geometry: PageGeometry,

    /// Head of the intrusive page list; the most recently built page.
    page_head: Option<NonNull<u8>>,

    /// Head of the intrusive free list of unused blocks.
    free_head: Option<NonNull<u8>>,

    /// Counters updated in lockstep with every state transition.
    stats: PoolStats,
}

// SAFETY: PagedPool contains raw pointers but they only ever reference pages
// the pool itself owns. Nothing is shared with other threads and no
// thread-local state is involved, so moving the pool between threads is fine.
// The absence of Sync is deliberate: there is no internal synchronization.
unsafe impl Send for PagedPool {}

impl PagedPool {
    /// Creates a builder for configuring and constructing a [`PagedPool`].
    ///
    /// You must specify the block size using
    /// [`object_size()`](PagedPoolBuilder::object_size) before calling
    /// [`build()`](PagedPoolBuilder::build).
    ///
    /// # Examples
    ///
    /// ```
    /// use paged_pool::PagedPool;
    ///
    /// let pool = PagedPool::builder().object_size(32).build()?;
    ///
    /// assert_eq!(pool.config().object_size, 32);
    /// # Ok::<(), paged_pool::PoolError>(())
    /// ```
    #[inline]
    pub fn builder() -> PagedPoolBuilder {
        PagedPoolBuilder::new()
    }

    /// Creates a new [`PagedPool`] with the specified configuration.
    ///
    /// This method is used internally by the builder to construct the pool.
    pub(crate) fn new_inner(config: PoolConfig) -> Result<Self> {
        let geometry = PageGeometry::for_config(&config)?;

        let mut pool = Self {
            config,
            geometry,
            page_head: None,
            free_head: None,
            stats: PoolStats {
                object_size: config.object_size,
                page_bytes: geometry.page_bytes,
                ..PoolStats::default()
            },
        };

        // The first page is built eagerly; bypass mode never owns pages.
        if !config.use_system_heap {
            pool.build_page()?;
        }

        Ok(pool)
    }

    /// Acquires one block and returns its address.
    ///
    /// `label` is consulted only for [`HeaderKind::External`] pools, where it
    /// is copied into the block's descriptor; other variants ignore it.
    ///
    /// The returned block is `object_size` bytes of untyped memory painted
    /// with [`signature::ALLOCATED`][crate::signature::ALLOCATED]. Ownership
    /// transfers to the caller until the block is passed back to
    /// [`release()`](Self::release).
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NoPages`] if the free list is empty and the page
    /// cap has been reached, and [`PoolError::OutOfMemory`] if a new page is
    /// needed but the system heap refuses.
    ///
    /// # Examples
    ///
    /// ```
    /// use paged_pool::PagedPool;
    ///
    /// let mut pool = PagedPool::builder().object_size(16).build()?;
    ///
    /// let first = pool.acquire(None)?;
    /// let second = pool.acquire(None)?;
    ///
    /// assert_ne!(first, second);
    /// assert_eq!(pool.stats().objects_in_use, 2);
    /// # Ok::<(), paged_pool::PoolError>(())
    /// ```
    pub fn acquire(&mut self, label: Option<&[u8]>) -> Result<NonNull<u8>> {
        if self.config.use_system_heap {
            return self.acquire_bypass();
        }

        if self.free_head.is_none() {
            if self.config.max_pages == 0 || self.stats.pages_in_use < self.config.max_pages {
                self.build_page()?;
            } else {
                debug!(
                    max_pages = self.config.max_pages,
                    "acquire failed: page limit reached"
                );

                return Err(PoolError::NoPages {
                    max_pages: self.config.max_pages,
                });
            }
        }

        // Pop the free-list head.
        let block = self
            .free_head
            .expect("free list was verified non-empty or replenished above");

        // SAFETY: Free-list nodes are block starts inside live pages and hold
        // a valid link in their first bytes.
        self.free_head = unsafe { links::read_link(block) };

        // SAFETY: The block is object_size bytes inside a live page. Painting
        // overwrites the link bytes, which is correct: the node was just
        // popped and the link already consumed.
        unsafe {
            signature::paint(block, self.config.object_size, signature::ALLOCATED);
        }

        let serial = self.stats.allocations.wrapping_add(1);

        // SAFETY: The slot's header sits a fixed distance before its block,
        // within the same live page.
        unsafe {
            header::mark_acquired(
                block.byte_sub(self.block_to_header_offset()),
                self.config.header,
                serial,
                label,
            );
        }

        self.stats.allocations = serial;
        // Cannot overflow: bounded by the number of blocks, which fit in memory.
        self.stats.objects_in_use = self.stats.objects_in_use.wrapping_add(1);
        self.stats.most_objects = self.stats.most_objects.max(self.stats.objects_in_use);
        // Cannot underflow: a block was just popped, so the count was at least 1.
        self.stats.free_objects = self.stats.free_objects.wrapping_sub(1);

        #[cfg(debug_assertions)]
        self.integrity_check();

        Ok(block)
    }

    /// Releases a block back to the pool. A null `block` is a no-op.
    ///
    /// The block's bytes are painted with
    /// [`signature::FREED`][crate::signature::FREED], the block is pushed
    /// onto the free list, and the slot's header is marked not-in-use.
    ///
    /// With debug checks enabled the argument is verified first: the free
    /// list is scanned for a double free, the page list for ownership, and
    /// the slot boundary and pad bands are checked. Verification precedes
    /// painting, so a second release of the same block is always detected by
    /// the free-list scan rather than masked by repainting.
    ///
    /// # Errors
    ///
    /// With debug checks enabled: [`PoolError::MultipleFree`],
    /// [`PoolError::BadBoundary`], or [`PoolError::CorruptedBlock`], each
    /// reported before any state has changed.
    ///
    /// # Safety
    ///
    /// `block` must be null, or an address previously returned by
    /// [`acquire()`](Self::acquire) of this pool that is currently in use.
    /// With debug checks enabled, every violation of that contract is caught
    /// and reported as an error instead; with them disabled, an invalid
    /// address corrupts pool memory.
    ///
    /// # Examples
    ///
    /// ```
    /// use paged_pool::PagedPool;
    ///
    /// let mut pool = PagedPool::builder().object_size(16).build()?;
    ///
    /// let block = pool.acquire(None)?;
    ///
    /// // SAFETY: The block came from this pool and is released exactly once.
    /// unsafe {
    ///     pool.release(block.as_ptr())?;
    /// }
    ///
    /// // Null is a no-op, not an error.
    /// // SAFETY: Null never dereferences anything.
    /// unsafe {
    ///     pool.release(std::ptr::null_mut())?;
    /// }
    ///
    /// assert_eq!(pool.stats().deallocations, 1);
    /// # Ok::<(), paged_pool::PoolError>(())
    /// ```
    pub unsafe fn release(&mut self, block: *mut u8) -> Result<()> {
        let Some(block) = NonNull::new(block) else {
            return Ok(());
        };

        if self.config.use_system_heap {
            // SAFETY: Bypass blocks were allocated in acquire_bypass() with
            // this same layout; the caller guarantees this is such a block.
            unsafe {
                dealloc(block.as_ptr(), self.bypass_layout());
            }

            // Cannot overflow: bounded by the number of successful acquires.
            self.stats.deallocations = self.stats.deallocations.wrapping_add(1);
            self.stats.objects_in_use = self.stats.objects_in_use.saturating_sub(1);

            return Ok(());
        }

        if self.config.debug_checks {
            self.verify_release(block)?;
        }

        // SAFETY: The block is object_size bytes inside a live page, either
        // verified above or guaranteed by the caller.
        unsafe {
            signature::paint(block, self.config.object_size, signature::FREED);
        }

        // Head-insert onto the free list. The link overwrites the first
        // freshly painted bytes, as the free-list discipline dictates.
        // SAFETY: The block has room for a link and the pool owns it again.
        unsafe {
            links::write_link(block, self.free_head);
        }
        self.free_head = Some(block);

        // SAFETY: The slot's header sits a fixed distance before its block,
        // within the same live page.
        unsafe {
            header::mark_released(
                block.byte_sub(self.block_to_header_offset()),
                self.config.header,
            );
        }

        // Cannot overflow/underflow: mirrors of the acquire-side updates.
        self.stats.free_objects = self.stats.free_objects.wrapping_add(1);
        self.stats.deallocations = self.stats.deallocations.wrapping_add(1);
        self.stats.objects_in_use = self.stats.objects_in_use.wrapping_sub(1);

        #[cfg(debug_assertions)]
        self.integrity_check();

        Ok(())
    }

    /// Calls `report` with `(address, size)` for every block currently held
    /// by a caller and returns how many there were.
    ///
    /// Header-carrying pools read the in-use flag (or the descriptor for
    /// [`HeaderKind::External`]); header-less pools treat absence from the
    /// free list as in use.
    ///
    /// # Examples
    ///
    /// ```
    /// use paged_pool::PagedPool;
    ///
    /// let mut pool = PagedPool::builder().object_size(16).build()?;
    ///
    /// let held = pool.acquire(None)?;
    /// let released = pool.acquire(None)?;
    /// // SAFETY: The block came from this pool and is released exactly once.
    /// unsafe {
    ///     pool.release(released.as_ptr())?;
    /// }
    ///
    /// let mut seen = Vec::new();
    /// let count = pool.dump_in_use(|address, size| seen.push((address, size)));
    ///
    /// assert_eq!(count, 1);
    /// assert_eq!(seen, vec![(held, 16)]);
    /// # Ok::<(), paged_pool::PoolError>(())
    /// ```
    pub fn dump_in_use(&self, mut report: impl FnMut(NonNull<u8>, usize)) -> usize {
        let mut count = 0_usize;

        for page in self.pages() {
            for index in 0..self.config.objects_per_page.get() {
                if self.block_in_use(&page, index) {
                    report(page.block_ptr(index, &self.geometry), self.config.object_size);

                    // Cannot overflow: bounded by the number of blocks.
                    count = count.wrapping_add(1);
                }
            }
        }

        count
    }

    /// Checks every block's pad bands against the pad signature, calling
    /// `report` with `(address, size)` for each corrupted block, and returns
    /// how many were corrupted.
    ///
    /// Returns zero immediately when the pool has no pad bands configured.
    pub fn validate_padding(&self, mut report: impl FnMut(NonNull<u8>, usize)) -> usize {
        if self.config.pad_bytes == 0 {
            return 0;
        }

        let mut count = 0_usize;

        for page in self.pages() {
            for index in 0..self.config.objects_per_page.get() {
                let block = page.block_ptr(index, &self.geometry);

                if !self.pad_bands_intact(block) {
                    report(block, self.config.object_size);

                    // Cannot overflow: bounded by the number of blocks.
                    count = count.wrapping_add(1);
                }
            }
        }

        count
    }

    /// Releases every page whose blocks are all unused back to the system
    /// heap and returns how many pages were released.
    ///
    /// Free-list nodes live inside page bytes, so each empty page's blocks
    /// are excised from the free list in a single pass before the page is
    /// returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::num::NonZero;
    ///
    /// use paged_pool::PagedPool;
    ///
    /// let mut pool = PagedPool::builder()
    ///     .object_size(16)
    ///     .objects_per_page(NonZero::new(2).unwrap())
    ///     .build()?;
    ///
    /// // Nothing is in use, so the eagerly built first page is releasable.
    /// assert_eq!(pool.free_empty_pages(), 1);
    /// assert_eq!(pool.stats().pages_in_use, 0);
    /// # Ok::<(), paged_pool::PoolError>(())
    /// ```
    pub fn free_empty_pages(&mut self) -> usize {
        let mut released = 0_usize;
        let mut prev: Option<Page> = None;
        // SAFETY: The page-list head, if any, is a live page base.
        let mut cursor = self.page_head.map(|base| unsafe { Page::from_base(base) });

        while let Some(page) = cursor {
            let next = page.next();

            if self.page_is_empty(&page) {
                self.unthread_page_blocks(&page);

                let next_base = next.map(|next_page| next_page.base());
                match prev {
                    None => self.page_head = next_base,
                    Some(prev_page) => prev_page.set_next(next_base),
                }

                // SAFETY: All of the page's blocks were excised from the free
                // list and the page was unlinked above; nothing references it.
                unsafe {
                    page.destroy(&self.geometry);
                }

                // Cannot underflow: a live page was just destroyed.
                self.stats.pages_in_use = self.stats.pages_in_use.wrapping_sub(1);
                // Cannot underflow: an empty page's blocks were all free.
                self.stats.free_objects = self
                    .stats
                    .free_objects
                    .wrapping_sub(self.config.objects_per_page.get());
                // Cannot overflow: bounded by the number of pages.
                released = released.wrapping_add(1);
            } else {
                prev = Some(page);
            }

            cursor = next;
        }

        if released > 0 {
            debug!(
                released,
                pages_in_use = self.stats.pages_in_use,
                "released empty pages"
            );
        }

        #[cfg(debug_assertions)]
        self.integrity_check();

        released
    }

    /// Toggles release-time verification.
    pub fn set_debug_checks(&mut self, enabled: bool) {
        self.config.debug_checks = enabled;
    }

    /// Returns a snapshot of the pool's configuration.
    #[must_use]
    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Returns a snapshot of the pool's statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// The current free-list head, if any. Read-only observer for tests.
    #[must_use]
    pub fn free_list_head(&self) -> Option<NonNull<u8>> {
        self.free_head
    }

    /// The current page-list head, if any. Read-only observer for tests.
    #[must_use]
    pub fn page_list_head(&self) -> Option<NonNull<u8>> {
        self.page_head
    }

    /// Builds one page and threads its blocks onto the free list.
    fn build_page(&mut self) -> Result<()> {
        Page::build(
            &self.geometry,
            &self.config,
            &mut self.page_head,
            &mut self.free_head,
        )?;

        // Cannot overflow: bounded by the number of pages that fit in memory.
        self.stats.pages_in_use = self.stats.pages_in_use.wrapping_add(1);
        self.stats.free_objects = self
            .stats
            .free_objects
            .wrapping_add(self.config.objects_per_page.get());

        debug!(
            page_bytes = self.geometry.page_bytes,
            pages_in_use = self.stats.pages_in_use,
            "created a page"
        );

        Ok(())
    }

    /// Acquire path for system-heap bypass mode.
    fn acquire_bypass(&mut self) -> Result<NonNull<u8>> {
        // SAFETY: The bypass layout has non-zero size (at least a link's worth).
        let Some(block) = NonNull::new(unsafe { alloc(self.bypass_layout()) }) else {
            debug!(
                requested = self.config.object_size,
                "bypass acquire failed: system heap refused"
            );

            return Err(PoolError::OutOfMemory {
                requested: self.config.object_size,
            });
        };

        self.stats.allocations = self.stats.allocations.wrapping_add(1);
        // Cannot overflow: bounded by the number of blocks that fit in memory.
        self.stats.objects_in_use = self.stats.objects_in_use.wrapping_add(1);
        self.stats.most_objects = self.stats.most_objects.max(self.stats.objects_in_use);

        Ok(block)
    }

    /// Allocation layout for one block in system-heap bypass mode.
    fn bypass_layout(&self) -> Layout {
        Layout::from_size_align(self.config.object_size, self.config.alignment.max(1))
            .expect("bypass layout was validated at construction")
    }

    /// Distance in bytes from a block back to its slot's header.
    fn block_to_header_offset(&self) -> usize {
        // Cannot underflow: the block always sits after its slot's header.
        self.geometry
            .first_user_offset
            .wrapping_sub(self.geometry.first_slot_offset)
    }

    /// Iterates over the live pages, head (most recently built) first.
    fn pages(&self) -> impl Iterator<Item = Page> + '_ {
        // SAFETY: The page chain is null-terminated and every node is a live
        // page base whose prefix holds the page-list link.
        unsafe { Chain::new(self.page_head) }.map(|base| {
            // SAFETY: Page-list nodes are live page bases.
            unsafe { Page::from_base(base) }
        })
    }

    /// Whether the free list currently contains `block`.
    fn free_list_contains(&self, block: NonNull<u8>) -> bool {
        // SAFETY: Free-list nodes are link-bearing block starts in live pages.
        unsafe { Chain::new(self.free_head) }.any(|node| node == block)
    }

    /// Whether slot `index` of `page` is currently held by a caller.
    fn block_in_use(&self, page: &Page, index: usize) -> bool {
        // SAFETY: The header region is live for as long as its page is.
        let flag = unsafe {
            header::is_in_use(page.header_ptr(index, &self.geometry), self.config.header)
        };

        match flag {
            Some(in_use) => in_use,
            // Without a header, free-list membership is the source of truth.
            None => !self.free_list_contains(page.block_ptr(index, &self.geometry)),
        }
    }

    /// Whether every block of `page` is unused.
    fn page_is_empty(&self, page: &Page) -> bool {
        (0..self.config.objects_per_page.get()).all(|index| !self.block_in_use(page, index))
    }

    /// Whether both pad bands bracketing `block` still carry the pad
    /// signature.
    fn pad_bands_intact(&self, block: NonNull<u8>) -> bool {
        let pad = self.config.pad_bytes;

        if pad == 0 {
            return true;
        }

        // SAFETY: The pad bands bracket the block within its live page, and
        // the pool creates no aliasing references to page bytes.
        let (left, right) = unsafe {
            let left = std::slice::from_raw_parts(block.byte_sub(pad).as_ptr(), pad);
            let right =
                std::slice::from_raw_parts(block.byte_add(self.config.object_size).as_ptr(), pad);
            (left, right)
        };

        left.iter().all(|&byte| byte == signature::PAD)
            && right.iter().all(|&byte| byte == signature::PAD)
    }

    /// Runs the release-time checks, in contract order: the double-free scan
    /// first (it must precede any repainting), then ownership, boundary and
    /// pad verification.
    fn verify_release(&self, block: NonNull<u8>) -> Result<()> {
        let address = block.addr().get();

        if self.free_list_contains(block) {
            debug!(address, "release failed: block already on the free list");

            return Err(PoolError::MultipleFree { address });
        }

        let Some(page) = self
            .pages()
            .find(|page| page.contains(block, &self.geometry))
        else {
            debug!(address, "release failed: address outside every live page");

            return Err(PoolError::BadBoundary { address });
        };

        if page
            .slot_index_of(block, &self.geometry, self.config.objects_per_page.get())
            .is_none()
        {
            debug!(address, "release failed: address not on a block boundary");

            return Err(PoolError::BadBoundary { address });
        }

        if !self.pad_bands_intact(block) {
            debug!(address, "release failed: pad bands overwritten");

            return Err(PoolError::CorruptedBlock { address });
        }

        Ok(())
    }

    /// Excises every free-list node that lives inside `page`, in one pass.
    fn unthread_page_blocks(&mut self, page: &Page) {
        let mut prev: Option<NonNull<u8>> = None;
        let mut cursor = self.free_head;

        while let Some(node) = cursor {
            // SAFETY: Free-list nodes are link-bearing block starts in live
            // pages.
            let next = unsafe { links::read_link(node) };

            if page.contains(node, &self.geometry) {
                match prev {
                    None => self.free_head = next,
                    // SAFETY: prev is a live free-list node we just visited.
                    Some(prev_node) => unsafe { links::write_link(prev_node, next) },
                }
            } else {
                prev = Some(node);
            }

            cursor = next;
        }
    }

    #[cfg(debug_assertions)]
    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    /// Verifies the bookkeeping identities that must hold at every
    /// observable point. Debug builds only.
    fn integrity_check(&self) {
        // Bypass mode owns no pages, so the identities below do not apply.
        if self.config.use_system_heap {
            return;
        }

        // SAFETY: Free-list nodes are link-bearing block starts in live pages.
        let free_len = unsafe { Chain::new(self.free_head) }.count();

        assert!(
            free_len == self.stats.free_objects,
            "free list length {free_len} does not match the free_objects counter {}",
            self.stats.free_objects,
        );

        assert!(
            self.stats.free_objects + self.stats.objects_in_use
                == self.stats.pages_in_use * self.config.objects_per_page.get(),
            "free + in-use does not cover exactly the blocks of all live pages",
        );

        assert!(
            self.stats.most_objects >= self.stats.objects_in_use,
            "high-water mark fell below the in-use count",
        );

        // Every free-list node must be a block boundary of some live page.
        // SAFETY: As above; the chain is null-terminated.
        for node in unsafe { Chain::new(self.free_head) } {
            assert!(
                self.pages().any(|page| {
                    page.slot_index_of(node, &self.geometry, self.config.objects_per_page.get())
                        .is_some()
                }),
                "free-list node {:#x} is not a block boundary of any live page",
                node.addr().get(),
            );
        }

        // A block is on the free list exactly when its header says not-in-use.
        for page in self.pages() {
            for index in 0..self.config.objects_per_page.get() {
                // SAFETY: The header region is live for as long as its page is.
                let Some(in_use) = (unsafe {
                    header::is_in_use(page.header_ptr(index, &self.geometry), self.config.header)
                }) else {
                    break;
                };

                assert!(
                    in_use != self.free_list_contains(page.block_ptr(index, &self.geometry)),
                    "slot {index} header flag disagrees with its free-list membership",
                );
            }
        }
    }
}

impl Drop for PagedPool {
    fn drop(&mut self) {
        // Free descriptors still owned by in-use slots, then unconditionally
        // return every page to the system heap. Callers were required to
        // release their blocks first; the pool does not defend against the
        // ones that did not.
        // SAFETY: The page-list head, if any, is a live page base.
        let mut cursor = self.page_head.map(|base| unsafe { Page::from_base(base) });

        while let Some(page) = cursor {
            let next = page.next();

            if self.config.header == HeaderKind::External {
                for index in 0..self.config.objects_per_page.get() {
                    // SAFETY: The header region stays live until the page is
                    // destroyed below; released slots hold a null descriptor
                    // pointer, which mark_released ignores.
                    unsafe {
                        header::mark_released(
                            page.header_ptr(index, &self.geometry),
                            HeaderKind::External,
                        );
                    }
                }
            }

            // SAFETY: The pool is being dropped; nothing references the page
            // afterwards.
            unsafe {
                page.destroy(&self.geometry);
            }

            cursor = next;
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use std::num::NonZero;

    use super::*;

    fn pool(object_size: usize, objects_per_page: usize) -> PagedPool {
        PagedPool::builder()
            .object_size(object_size)
            .objects_per_page(NonZero::new(objects_per_page).unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn construction_builds_the_first_page_eagerly() {
        let pool = pool(16, 4);

        assert_eq!(pool.stats().pages_in_use, 1);
        assert_eq!(pool.stats().free_objects, 4);
        assert!(pool.page_list_head().is_some());
        assert!(pool.free_list_head().is_some());
    }

    #[test]
    fn acquire_pops_the_free_list_head() {
        let mut pool = pool(16, 4);

        let head = pool.free_list_head().unwrap();
        let block = pool.acquire(None).unwrap();

        assert_eq!(block, head);
    }

    #[test]
    fn fresh_pages_are_consumed_in_ascending_address_order() {
        let mut pool = pool(16, 4);

        let mut previous = pool.acquire(None).unwrap();
        for _ in 0..3 {
            let block = pool.acquire(None).unwrap();
            assert!(block > previous);
            previous = block;
        }
    }

    #[test]
    fn release_head_inserts_onto_the_free_list() {
        let mut pool = pool(16, 4);

        let block = pool.acquire(None).unwrap();
        unsafe {
            pool.release(block.as_ptr()).unwrap();
        }

        assert_eq!(pool.free_list_head(), Some(block));
    }

    #[test]
    fn released_blocks_are_recycled_before_fresh_ones() {
        let mut pool = pool(16, 4);

        let first = pool.acquire(None).unwrap();
        let _second = pool.acquire(None).unwrap();

        unsafe {
            pool.release(first.as_ptr()).unwrap();
        }

        // LIFO discipline: the most recently released block comes back first.
        assert_eq!(pool.acquire(None).unwrap(), first);
    }

    #[test]
    fn null_release_is_a_no_op() {
        let mut pool = pool(16, 4);

        unsafe {
            pool.release(std::ptr::null_mut()).unwrap();
        }

        assert_eq!(pool.stats().deallocations, 0);
    }

    #[test]
    fn counters_track_the_acquire_release_cycle() {
        let mut pool = pool(16, 4);

        let a = pool.acquire(None).unwrap();
        let b = pool.acquire(None).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.allocations, 2);
        assert_eq!(stats.objects_in_use, 2);
        assert_eq!(stats.free_objects, 2);
        assert_eq!(stats.most_objects, 2);

        unsafe {
            pool.release(a.as_ptr()).unwrap();
            pool.release(b.as_ptr()).unwrap();
        }

        let stats = pool.stats();
        assert_eq!(stats.deallocations, 2);
        assert_eq!(stats.objects_in_use, 0);
        assert_eq!(stats.free_objects, 4);
        // The high-water mark never decreases.
        assert_eq!(stats.most_objects, 2);
    }

    #[test]
    fn debug_checks_can_be_toggled_after_construction() {
        let mut pool = pool(16, 4);
        assert!(!pool.config().debug_checks);

        pool.set_debug_checks(true);
        assert!(pool.config().debug_checks);

        // A double free is now detected.
        let block = pool.acquire(None).unwrap();
        unsafe {
            pool.release(block.as_ptr()).unwrap();
            let result = pool.release(block.as_ptr());
            assert!(matches!(result, Err(PoolError::MultipleFree { .. })));
        }
    }

    #[test]
    fn bypass_mode_owns_no_pages() {
        let mut pool = PagedPool::builder()
            .object_size(16)
            .use_system_heap(true)
            .build()
            .unwrap();

        assert_eq!(pool.stats().pages_in_use, 0);
        assert!(pool.page_list_head().is_none());
        assert!(pool.free_list_head().is_none());

        let block = pool.acquire(None).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.allocations, 1);
        assert_eq!(stats.objects_in_use, 1);
        assert_eq!(stats.free_objects, 0);

        unsafe {
            pool.release(block.as_ptr()).unwrap();
        }

        let stats = pool.stats();
        assert_eq!(stats.deallocations, 1);
        assert_eq!(stats.objects_in_use, 0);
    }

    #[test]
    fn bypass_blocks_honor_the_configured_alignment() {
        let mut pool = PagedPool::builder()
            .object_size(24)
            .alignment(16)
            .use_system_heap(true)
            .build()
            .unwrap();

        let block = pool.acquire(None).unwrap();
        assert_eq!(block.addr().get() % 16, 0);

        unsafe {
            pool.release(block.as_ptr()).unwrap();
        }
    }
}
