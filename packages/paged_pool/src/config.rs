use std::num::NonZero;

/// Per-block header bookkeeping variant.
///
/// The header occupies the first bytes of each slot, ahead of the pad band
/// and the user-visible block. Its size depends on the variant.
///
/// # Examples
///
/// ```
/// use paged_pool::{HeaderKind, PagedPool};
///
/// let pool = PagedPool::builder()
///     .object_size(16)
///     .header(HeaderKind::Basic)
///     .build()?;
///
/// assert_eq!(pool.config().header, HeaderKind::Basic);
/// # Ok::<(), paged_pool::PoolError>(())
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum HeaderKind {
    /// No per-block header. In-use status is derived from free-list
    /// membership. This is the default.
    #[default]
    None,

    /// A 4-byte allocation serial followed by a 1-byte in-use flag.
    Basic,

    /// A caller-defined opaque prefix, a 2-byte use counter that survives
    /// release, a 4-byte allocation serial, and a 1-byte in-use flag.
    Extended {
        /// Number of caller-defined bytes at the start of the header.
        /// The pool zeroes them at page creation and never touches them again.
        user_defined_bytes: usize,
    },

    /// A pointer to a separately heap-allocated [`BlockDescriptor`][crate::BlockDescriptor].
    /// The in-page header is just the pointer; the descriptor carries the
    /// bookkeeping.
    External,
}

impl HeaderKind {
    /// Number of bytes this header variant occupies inside each slot.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        match self {
            Self::None => 0,
            // Allocation serial + flag byte.
            Self::Basic => size_of::<u32>() + 1,
            // User prefix + use counter + allocation serial + flag byte.
            Self::Extended { user_defined_bytes } => user_defined_bytes
                .checked_add(size_of::<u16>() + size_of::<u32>() + 1)
                .expect("header size calculation cannot overflow for a representable configuration"),
            Self::External => size_of::<*mut u8>(),
        }
    }
}

/// Configuration of a [`PagedPool`][crate::PagedPool], decoded once at
/// construction.
///
/// Immutable for the lifetime of the pool, except for the `debug_checks`
/// toggle which can be flipped via
/// [`PagedPool::set_debug_checks()`][crate::PagedPool::set_debug_checks].
#[derive(Clone, Copy, Debug)]
#[non_exhaustive]
pub struct PoolConfig {
    /// Bytes per user-visible block. At least `size_of::<*mut u8>()`, because
    /// free blocks store the free-list link in their own first bytes.
    pub object_size: usize,

    /// Number of blocks each page houses.
    pub objects_per_page: NonZero<usize>,

    /// Cap on live pages; 0 means unbounded.
    pub max_pages: usize,

    /// Required alignment of each block within a page. A power of two;
    /// 0 or 1 disables alignment padding.
    pub alignment: usize,

    /// Pad bytes immediately before and after each block.
    pub pad_bytes: usize,

    /// Per-block header bookkeeping variant.
    pub header: HeaderKind,

    /// Bypass mode: every acquire/release forwards directly to the system
    /// heap. Counters still update; no page or free-list state is touched.
    pub use_system_heap: bool,

    /// Enables release-time verification (double-free, range, alignment,
    /// and pad checks).
    pub debug_checks: bool,
}
