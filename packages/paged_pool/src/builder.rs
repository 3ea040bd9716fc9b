use std::num::NonZero;

use crate::{HeaderKind, PagedPool, PoolConfig, PoolError};

/// Number of blocks a page houses unless configured otherwise.
const DEFAULT_OBJECTS_PER_PAGE: NonZero<usize> =
    const { NonZero::new(4).expect("literal must have non-zero value") };

/// Builder for creating an instance of [`PagedPool`].
///
/// [`PagedPool`] requires the block size to be specified at construction
/// time via [`object_size()`](Self::object_size); every other knob is
/// optional and defaults to the plainest configuration: four blocks per
/// page, unbounded pages, no alignment, no pads, no headers, no debug
/// checks.
///
/// # Examples
///
/// ```
/// use paged_pool::{HeaderKind, PagedPool};
///
/// // The plainest pool: 16-byte blocks, everything else defaulted.
/// let pool = PagedPool::builder().object_size(16).build()?;
///
/// // A heavily instrumented pool.
/// let pool = PagedPool::builder()
///     .object_size(64)
///     .objects_per_page(std::num::NonZero::new(32).unwrap())
///     .max_pages(8)
///     .alignment(16)
///     .pad_bytes(4)
///     .header(HeaderKind::Basic)
///     .debug_checks(true)
///     .build()?;
/// # Ok::<(), paged_pool::PoolError>(())
/// ```
#[derive(Debug)]
#[must_use]
pub struct PagedPoolBuilder {
    object_size: Option<usize>,
    objects_per_page: NonZero<usize>,
    max_pages: usize,
    alignment: usize,
    pad_bytes: usize,
    header: HeaderKind,
    use_system_heap: bool,
    debug_checks: bool,
}

impl PagedPoolBuilder {
    pub(crate) fn new() -> Self {
        Self {
            object_size: None,
            objects_per_page: DEFAULT_OBJECTS_PER_PAGE,
            max_pages: 0,
            alignment: 0,
            pad_bytes: 0,
            header: HeaderKind::None,
            use_system_heap: false,
            debug_checks: false,
        }
    }

    /// Sets the size in bytes of the blocks the pool hands out.
    ///
    /// Must be at least `size_of::<*mut u8>()`, because free blocks store
    /// the free-list link in their own first bytes; smaller values are
    /// rejected by [`build()`](Self::build).
    pub fn object_size(mut self, bytes: usize) -> Self {
        self.object_size = Some(bytes);
        self
    }

    /// Sets the number of blocks each page houses.
    pub fn objects_per_page(mut self, count: NonZero<usize>) -> Self {
        self.objects_per_page = count;
        self
    }

    /// Caps the number of live pages. Zero means unbounded, which is the
    /// default.
    pub fn max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages;
        self
    }

    /// Requires every block address to satisfy this alignment.
    ///
    /// Must be a power of two; 0 or 1 (the default) disables alignment
    /// padding entirely.
    pub fn alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Brackets every block with this many pad bytes on each side.
    ///
    /// The pad bands carry the [`signature::PAD`][crate::signature::PAD]
    /// pattern and let release-time verification detect writes that strayed
    /// outside the block.
    pub fn pad_bytes(mut self, bytes: usize) -> Self {
        self.pad_bytes = bytes;
        self
    }

    /// Selects the per-block header bookkeeping variant.
    pub fn header(mut self, header: HeaderKind) -> Self {
        self.header = header;
        self
    }

    /// Forwards every acquire/release directly to the system heap instead of
    /// the page machinery. Counters still update.
    pub fn use_system_heap(mut self, enabled: bool) -> Self {
        self.use_system_heap = enabled;
        self
    }

    /// Enables release-time verification: double-free, range, alignment and
    /// pad checks. Can be toggled later via
    /// [`PagedPool::set_debug_checks()`].
    pub fn debug_checks(mut self, enabled: bool) -> Self {
        self.debug_checks = enabled;
        self
    }

    /// Builds the pool, computing the page geometry and creating the first
    /// page (unless the pool bypasses to the system heap).
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ConfigurationInvalid`] if the geometry cannot be
    /// built and [`PoolError::OutOfMemory`] if the first page cannot be
    /// allocated.
    ///
    /// # Panics
    ///
    /// Panics if no object size has been set via
    /// [`object_size()`](Self::object_size).
    pub fn build(self) -> Result<PagedPool, PoolError> {
        let object_size = self
            .object_size
            .expect("object size must be set using .object_size() before calling .build()");

        PagedPool::new_inner(PoolConfig {
            object_size,
            objects_per_page: self.objects_per_page,
            max_pages: self.max_pages,
            alignment: self.alignment,
            pad_bytes: self.pad_bytes,
            header: self.header,
            use_system_heap: self.use_system_heap,
            debug_checks: self.debug_checks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_the_plainest_configuration() {
        let pool = PagedPool::builder().object_size(16).build().unwrap();
        let config = pool.config();

        assert_eq!(config.object_size, 16);
        assert_eq!(config.objects_per_page, DEFAULT_OBJECTS_PER_PAGE);
        assert_eq!(config.max_pages, 0);
        assert_eq!(config.alignment, 0);
        assert_eq!(config.pad_bytes, 0);
        assert_eq!(config.header, HeaderKind::None);
        assert!(!config.use_system_heap);
        assert!(!config.debug_checks);
    }

    #[test]
    #[should_panic]
    fn missing_object_size_panics() {
        drop(PagedPool::builder().build());
    }

    #[test]
    fn undersized_object_is_a_configuration_error() {
        let result = PagedPool::builder().object_size(1).build();

        assert!(matches!(
            result,
            Err(PoolError::ConfigurationInvalid { .. })
        ));
    }
}
