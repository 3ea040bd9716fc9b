/// Point-in-time statistics snapshot for a [`PagedPool`][crate::PagedPool].
///
/// All counters are monotonic except `objects_in_use` and `free_objects`.
/// Allocation serials are 4-byte quantities because the in-page headers
/// store them as `u32` in native byte order.
///
/// # Examples
///
/// ```
/// use paged_pool::PagedPool;
///
/// let mut pool = PagedPool::builder().object_size(16).build()?;
///
/// let block = pool.acquire(None)?;
/// let stats = pool.stats();
///
/// assert_eq!(stats.allocations, 1);
/// assert_eq!(stats.objects_in_use, 1);
/// assert_eq!(
///     stats.free_objects + stats.objects_in_use,
///     stats.pages_in_use * pool.config().objects_per_page.get()
/// );
///
/// // SAFETY: The block came from this pool and is released exactly once.
/// unsafe {
///     pool.release(block.as_ptr())?;
/// }
/// # Ok::<(), paged_pool::PoolError>(())
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub struct PoolStats {
    /// Bytes per user-visible block, as configured.
    pub object_size: usize,

    /// Total byte count of one page, including prefix, headers, pads and
    /// alignment regions.
    pub page_bytes: usize,

    /// Number of live pages.
    pub pages_in_use: usize,

    /// Number of blocks currently held by callers.
    pub objects_in_use: usize,

    /// Number of blocks on the free list.
    pub free_objects: usize,

    /// High-water mark of `objects_in_use`. Never decreases.
    pub most_objects: usize,

    /// Cumulative number of successful acquisitions.
    pub allocations: u32,

    /// Cumulative number of successful releases.
    pub deallocations: u32,
}
