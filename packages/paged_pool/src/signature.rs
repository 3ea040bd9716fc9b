//! One-byte signatures painted into raw page memory to encode the lifecycle
//! state of each region.
//!
//! The values are part of the observable contract: tests and debugging tools
//! inspect raw memory and depend on them.

use std::ptr::NonNull;

/// Fresh page bytes that no block has ever occupied.
pub const UNALLOCATED: u8 = 0xAA;

/// A block's bytes immediately after it has been acquired.
pub const ALLOCATED: u8 = 0xBB;

/// A block's bytes immediately after it has been released.
pub const FREED: u8 = 0xCC;

/// Pad bytes bracketing each block, written at page creation.
pub const PAD: u8 = 0xDD;

/// Left-alignment and inter-alignment bytes, written at page creation.
pub const ALIGN: u8 = 0xEE;

/// Fills `len` bytes starting at `start` with the given signature.
///
/// # Safety
///
/// `start` must be valid for writes of `len` bytes.
pub(crate) unsafe fn paint(start: NonNull<u8>, len: usize, signature: u8) {
    // SAFETY: The caller guarantees the range is valid for writes.
    unsafe {
        start.as_ptr().write_bytes(signature, len);
    }
}

#[cfg(test)]
mod tests {
    use std::ptr::NonNull;

    use super::*;

    #[test]
    fn paint_fills_exactly_the_requested_range() {
        let mut buffer = [0_u8; 8];
        let start = NonNull::from(&mut buffer[2]);

        // SAFETY: The range [2, 6) lies within the buffer.
        unsafe {
            paint(start, 4, PAD);
        }

        assert_eq!(buffer, [0, 0, PAD, PAD, PAD, PAD, 0, 0]);
    }

    #[test]
    fn signature_values_are_distinct() {
        let all = [UNALLOCATED, ALLOCATED, FREED, PAD, ALIGN];

        for (i, a) in all.iter().enumerate() {
            for b in all.iter().skip(i.checked_add(1).expect("tiny index")) {
                assert_ne!(a, b);
            }
        }
    }
}
