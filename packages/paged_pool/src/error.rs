use thiserror::Error;

/// Errors that can occur when configuring or operating a [`PagedPool`][crate::PagedPool].
///
/// Every failure the pool can report is one of these kinds. Acquire and release
/// either fully succeed or return an error before any observable state has
/// changed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// The system heap refused a bulk allocation request.
    #[error("system heap refused a request for {requested} bytes")]
    OutOfMemory {
        /// Number of bytes that were requested from the system heap.
        requested: usize,
    },

    /// The free list is empty and the configured page limit has been reached,
    /// so no further blocks can be served.
    #[error("free list is empty and the limit of {max_pages} pages has been reached")]
    NoPages {
        /// The configured page limit that was hit.
        max_pages: usize,
    },

    /// The block being released is already on the free list.
    #[error("block at {address:#x} is already on the free list")]
    MultipleFree {
        /// Address of the block that was released twice.
        address: usize,
    },

    /// The address being released does not fall on a block boundary of any
    /// live page.
    #[error("address {address:#x} is not a block boundary of any live page")]
    BadBoundary {
        /// The offending address.
        address: usize,
    },

    /// The pad bytes bracketing the block no longer carry the pad signature;
    /// the caller wrote outside the block.
    #[error("pad bytes around the block at {address:#x} have been overwritten")]
    CorruptedBlock {
        /// Address of the block whose pad bands are damaged.
        address: usize,
    },

    /// The requested configuration cannot produce a valid page geometry.
    #[error("invalid pool configuration: {problem}")]
    ConfigurationInvalid {
        /// A human-readable description of the problem.
        problem: String,
    },
}

/// A specialized `Result` type for pool operations, returning the crate's
/// [`PoolError`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, PoolError>;
