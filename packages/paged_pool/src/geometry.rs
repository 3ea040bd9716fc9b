use std::alloc::Layout;

use crate::links::LINK_BYTES;
use crate::{PoolConfig, PoolError, Result};

/// Byte-exact geometry of a page, computed once at pool construction.
///
/// A page is laid out as:
///
/// ```text
/// [ next-page link | left-align | (slot)* ]
/// slot = [ header | pad | block(object_size) | pad | inter-align? ]
/// ```
///
/// The inter-align region is omitted after the last slot on a page.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct PageGeometry {
    /// Bytes each header variant occupies inside a slot.
    pub(crate) header_bytes: usize,

    /// Extra bytes after the page's next-link prefix that make the first
    /// block satisfy the configured alignment.
    pub(crate) left_align_bytes: usize,

    /// Extra bytes between adjacent slots that keep subsequent blocks aligned.
    pub(crate) inter_align_bytes: usize,

    /// Distance in bytes from one slot's start to the next.
    pub(crate) slot_stride: usize,

    /// Total byte count of one page.
    pub(crate) page_bytes: usize,

    /// Offset of the first slot (its header) from the page base.
    pub(crate) first_slot_offset: usize,

    /// Offset of the first block from the page base.
    pub(crate) first_user_offset: usize,

    /// Allocation layout of one page. The alignment is the stricter of the
    /// link alignment and the configured block alignment, so block addresses
    /// satisfy the configured alignment in absolute terms.
    pub(crate) page_layout: Layout,
}

/// Bytes needed to make `prefix` a multiple of `alignment`.
fn padding_to(alignment: usize, prefix: usize) -> usize {
    match prefix % alignment {
        0 => 0,
        // Cannot underflow: the remainder is less than the alignment.
        remainder => alignment.wrapping_sub(remainder),
    }
}

impl PageGeometry {
    /// Computes the geometry for the given configuration.
    ///
    /// Fails with [`PoolError::ConfigurationInvalid`] if the object size
    /// cannot hold a free-list link, the alignment is not a power of two,
    /// or the page byte count is not representable.
    pub(crate) fn for_config(config: &PoolConfig) -> Result<Self> {
        if config.object_size < LINK_BYTES {
            return Err(PoolError::ConfigurationInvalid {
                problem: format!(
                    "object size {} cannot hold a free-list link of {LINK_BYTES} bytes",
                    config.object_size
                ),
            });
        }

        if config.alignment > 1 && !config.alignment.is_power_of_two() {
            return Err(PoolError::ConfigurationInvalid {
                problem: format!("alignment {} is not a power of two", config.alignment),
            });
        }

        let header_bytes = config.header.size_bytes();

        fn overflow() -> PoolError {
            PoolError::ConfigurationInvalid {
                problem: "page byte count is not representable".to_string(),
            }
        }

        let (left_align_bytes, mut inter_align_bytes) = if config.alignment > 1 {
            let left_prefix = LINK_BYTES
                .checked_add(header_bytes)
                .and_then(|bytes| bytes.checked_add(config.pad_bytes))
                .ok_or_else(overflow)?;

            let inter_prefix = config
                .object_size
                .checked_add(header_bytes)
                .and_then(|bytes| bytes.checked_add(config.pad_bytes.checked_mul(2)?))
                .ok_or_else(overflow)?;

            (
                padding_to(config.alignment, left_prefix),
                padding_to(config.alignment, inter_prefix),
            )
        } else {
            (0, 0)
        };

        // A single-slot page has no adjacent slots to keep aligned.
        if config.objects_per_page.get() == 1 {
            inter_align_bytes = 0;
        }

        let slot_stride = header_bytes
            .checked_add(config.pad_bytes.checked_mul(2).ok_or_else(overflow)?)
            .and_then(|bytes| bytes.checked_add(config.object_size))
            .and_then(|bytes| bytes.checked_add(inter_align_bytes))
            .ok_or_else(overflow)?;

        // No trailing inter-alignment after the last slot.
        let page_bytes = slot_stride
            .checked_mul(config.objects_per_page.get())
            .and_then(|bytes| bytes.checked_add(LINK_BYTES))
            .and_then(|bytes| bytes.checked_add(left_align_bytes))
            .and_then(|bytes| bytes.checked_sub(inter_align_bytes))
            .ok_or_else(overflow)?;

        let page_alignment = align_of::<*mut u8>().max(config.alignment.max(1));

        let page_layout =
            Layout::from_size_align(page_bytes, page_alignment).map_err(|_| overflow())?;

        // Cannot overflow: both terms are bounded by page_bytes, which is
        // representable per the checks above.
        let first_slot_offset = LINK_BYTES.wrapping_add(left_align_bytes);
        let first_user_offset = first_slot_offset
            .wrapping_add(header_bytes)
            .wrapping_add(config.pad_bytes);

        Ok(Self {
            header_bytes,
            left_align_bytes,
            inter_align_bytes,
            slot_stride,
            page_bytes,
            first_slot_offset,
            first_user_offset,
            page_layout,
        })
    }

    /// Offset of slot `index`'s header from the page base.
    #[must_use]
    pub(crate) fn slot_offset(&self, index: usize) -> usize {
        // Cannot overflow: every slot lies within page_bytes.
        self.first_slot_offset
            .wrapping_add(index.wrapping_mul(self.slot_stride))
    }

    /// Offset of slot `index`'s block from the page base.
    #[must_use]
    pub(crate) fn user_offset(&self, index: usize) -> usize {
        // Cannot overflow: every block lies within page_bytes.
        self.first_user_offset
            .wrapping_add(index.wrapping_mul(self.slot_stride))
    }
}
