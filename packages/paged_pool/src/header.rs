//! Per-slot header bookkeeping across the four header variants.
//!
//! Headers live inside the page, ahead of each block's pad band. Multi-byte
//! fields are written in native byte order at whatever offset the geometry
//! dictates, so all accesses are unaligned.
//!
//! Wire formats:
//!
//! ```text
//! Basic:    [ serial: u32 | flag: u8 ]
//! Extended: [ user bytes  | use_count: u16 | serial: u32 | flag: u8 ]
//! External: [ descriptor: *mut BlockDescriptor ]
//! ```

use std::ptr::NonNull;

use crate::HeaderKind;

/// Flag byte value for a block that is currently held by a caller.
const IN_USE: u8 = 1;

/// Heap-allocated bookkeeping record for a block under
/// [`HeaderKind::External`].
///
/// The descriptor is owned exclusively by its slot's header pointer while the
/// block is in use and is returned to the heap on release.
#[derive(Debug)]
pub struct BlockDescriptor {
    /// Whether the block is currently held by a caller.
    pub in_use: bool,

    /// Serial number of the acquisition that produced this descriptor.
    pub allocation_number: u32,

    /// Caller-supplied label, copied at acquisition; empty if none was given.
    pub label: Box<[u8]>,
}

/// Reads the `u32` field at `offset` bytes into the header.
///
/// # Safety
///
/// `header` must point at a header region that has the field at that offset.
unsafe fn read_u32(header: NonNull<u8>, offset: usize) -> u32 {
    // SAFETY: The caller guarantees the field location is readable.
    unsafe { header.as_ptr().add(offset).cast::<u32>().read_unaligned() }
}

/// Writes the `u32` field at `offset` bytes into the header.
///
/// # Safety
///
/// `header` must point at a header region that has the field at that offset.
unsafe fn write_u32(header: NonNull<u8>, offset: usize, value: u32) {
    // SAFETY: The caller guarantees the field location is writable.
    unsafe {
        header
            .as_ptr()
            .add(offset)
            .cast::<u32>()
            .write_unaligned(value);
    }
}

/// Marks the slot as acquired, recording the allocation serial and, for
/// [`HeaderKind::External`], allocating a descriptor carrying the label.
///
/// # Safety
///
/// `header` must point at a header region of `kind`'s size that was zeroed at
/// page creation and has only been updated by this module since.
pub(crate) unsafe fn mark_acquired(
    header: NonNull<u8>,
    kind: HeaderKind,
    serial: u32,
    label: Option<&[u8]>,
) {
    match kind {
        HeaderKind::None => {}
        HeaderKind::Basic => {
            // SAFETY: A basic header is a u32 serial followed by a flag byte.
            unsafe {
                write_u32(header, 0, serial);
                header.as_ptr().add(size_of::<u32>()).write(IN_USE);
            }
        }
        HeaderKind::Extended { user_defined_bytes } => {
            // SAFETY: An extended header carries the use counter, serial and
            // flag after the caller-defined prefix.
            unsafe {
                let use_count_ptr = header.as_ptr().add(user_defined_bytes).cast::<u16>();
                // The counter survives release; it wraps rather than sticks.
                let use_count = use_count_ptr.read_unaligned().wrapping_add(1);
                use_count_ptr.write_unaligned(use_count);

                write_u32(header, user_defined_bytes + size_of::<u16>(), serial);

                header
                    .as_ptr()
                    .add(user_defined_bytes + size_of::<u16>() + size_of::<u32>())
                    .write(IN_USE);
            }
        }
        HeaderKind::External => {
            let descriptor = Box::new(BlockDescriptor {
                in_use: true,
                allocation_number: serial,
                label: label.unwrap_or_default().into(),
            });

            // SAFETY: An external header is a single descriptor pointer.
            unsafe {
                header
                    .as_ptr()
                    .cast::<*mut BlockDescriptor>()
                    .write_unaligned(Box::into_raw(descriptor));
            }
        }
    }
}

/// Marks the slot as released.
///
/// `Basic` zeroes the serial and clears the flag. `Extended` does the same
/// while preserving the use counter. `External` clears the descriptor's
/// fields, returns it to the heap, and nulls the header pointer.
///
/// # Safety
///
/// Same contract as [`mark_acquired()`].
pub(crate) unsafe fn mark_released(header: NonNull<u8>, kind: HeaderKind) {
    match kind {
        HeaderKind::None => {}
        HeaderKind::Basic => {
            // SAFETY: A basic header is a u32 serial followed by a flag byte.
            unsafe {
                write_u32(header, 0, 0);
                header.as_ptr().add(size_of::<u32>()).write(0);
            }
        }
        HeaderKind::Extended { user_defined_bytes } => {
            // SAFETY: Field locations as in mark_acquired(); the use counter
            // at the prefix is deliberately left alone.
            unsafe {
                write_u32(header, user_defined_bytes + size_of::<u16>(), 0);

                header
                    .as_ptr()
                    .add(user_defined_bytes + size_of::<u16>() + size_of::<u32>())
                    .write(0);
            }
        }
        HeaderKind::External => {
            // SAFETY: An external header is a single descriptor pointer.
            let raw = unsafe {
                header
                    .as_ptr()
                    .cast::<*mut BlockDescriptor>()
                    .read_unaligned()
            };

            if !raw.is_null() {
                // SAFETY: The pointer was produced by Box::into_raw in
                // mark_acquired() and ownership returns here exactly once.
                let mut descriptor = unsafe { Box::from_raw(raw) };
                descriptor.in_use = false;
                descriptor.allocation_number = 0;
                drop(descriptor);

                // SAFETY: Same header region as the read above.
                unsafe {
                    header
                        .as_ptr()
                        .cast::<*mut BlockDescriptor>()
                        .write_unaligned(std::ptr::null_mut());
                }
            }
        }
    }
}

/// Reads the slot's in-use state, or `None` when the variant records none
/// and free-list membership is the source of truth.
///
/// # Safety
///
/// Same contract as [`mark_acquired()`].
#[must_use]
pub(crate) unsafe fn is_in_use(header: NonNull<u8>, kind: HeaderKind) -> Option<bool> {
    match kind {
        HeaderKind::None => None,
        HeaderKind::Basic => {
            // SAFETY: The flag byte sits after the u32 serial.
            let flag = unsafe { header.as_ptr().add(size_of::<u32>()).read() };
            Some(flag == IN_USE)
        }
        HeaderKind::Extended { user_defined_bytes } => {
            // SAFETY: The flag byte sits after the prefix, counter and serial.
            let flag = unsafe {
                header
                    .as_ptr()
                    .add(user_defined_bytes + size_of::<u16>() + size_of::<u32>())
                    .read()
            };
            Some(flag == IN_USE)
        }
        HeaderKind::External => {
            // SAFETY: An external header is a single descriptor pointer.
            let raw = unsafe {
                header
                    .as_ptr()
                    .cast::<*mut BlockDescriptor>()
                    .read_unaligned()
            };

            if raw.is_null() {
                Some(false)
            } else {
                // SAFETY: A non-null pointer is a live Box allocation owned
                // by this header.
                Some(unsafe { (*raw).in_use })
            }
        }
    }
}

/// Reads the allocation serial recorded in the header, if the variant has one.
///
/// # Safety
///
/// Same contract as [`mark_acquired()`].
#[cfg(test)]
#[must_use]
pub(crate) unsafe fn allocation_serial(header: NonNull<u8>, kind: HeaderKind) -> Option<u32> {
    match kind {
        HeaderKind::None => None,
        // SAFETY: The serial is the first header field.
        HeaderKind::Basic => Some(unsafe { read_u32(header, 0) }),
        HeaderKind::Extended { user_defined_bytes } => {
            // SAFETY: The serial follows the prefix and the use counter.
            Some(unsafe { read_u32(header, user_defined_bytes + size_of::<u16>()) })
        }
        HeaderKind::External => {
            // SAFETY: An external header is a single descriptor pointer.
            let raw = unsafe {
                header
                    .as_ptr()
                    .cast::<*mut BlockDescriptor>()
                    .read_unaligned()
            };

            if raw.is_null() {
                Some(0)
            } else {
                // SAFETY: A non-null pointer is a live Box allocation owned
                // by this header.
                Some(unsafe { (*raw).allocation_number })
            }
        }
    }
}
