//! Byte-exact memory layout shared by every process that maps the segment.
//!
//! Nothing in this module is generic over a thread-safety bound beyond what
//! the atomics themselves provide — the layout is a plain C-compatible byte
//! shape, not a Rust-owned data structure, since it is read and written by
//! unrelated processes that only agree on it through this crate's source.

use crate::error::{Geometry, QueueError};
use std::sync::atomic::{AtomicU8, AtomicUsize};

pub const CACHE_LINE_BYTES: usize = 64;
/// Arbitrary ceiling, a round number of cache lines, on how large a single
/// slot (flag plus payload) is allowed to get.
pub const MAX_MESSAGE_BLOCK_BYTES: usize = (1 << 10) * CACHE_LINE_BYTES;

const CURSOR_LINE_PAYLOAD_BYTES: usize = 3 * std::mem::size_of::<usize>();
const CURSOR_LINE_PAD_BYTES: usize = CACHE_LINE_BYTES - CURSOR_LINE_PAYLOAD_BYTES;

/// One endpoint's cursor plus the redundant geometry fields used to detect a
/// mismatched attach, padded out to exactly one `CACHE_LINE_BYTES` line.
///
/// `crossbeam_utils::CachePadded` would be the obvious off-the-shelf choice
/// for this kind of isolation, but it pads to 128 bytes on x86_64/aarch64
/// (to account for the adjacent-line prefetcher), which would break the
/// fixed 64-byte `CACHE_LINE_BYTES` this crate's on-disk layout is defined
/// against. A hand-rolled, exactly-sized pad keeps the cache-line constant
/// fixed instead.
#[repr(C, align(64))]
pub struct CursorLine {
    pub offset: AtomicUsize,
    pub user_region_bytes: AtomicUsize,
    pub slot_stride_bytes: AtomicUsize,
    _pad: [u8; CURSOR_LINE_PAD_BYTES],
}

impl CursorLine {
    const fn zeroed() -> Self {
        CursorLine {
            offset: AtomicUsize::new(0),
            user_region_bytes: AtomicUsize::new(0),
            slot_stride_bytes: AtomicUsize::new(0),
            _pad: [0; CURSOR_LINE_PAD_BYTES],
        }
    }
}

/// Layout placed at the start of the segment: a write-side cache line owned
/// by the sender and a read-side cache line owned by the receiver, so each
/// endpoint's hot path touches exactly one control-block line.
#[repr(C)]
pub struct ControlBlock {
    pub write_line: CursorLine,
    pub read_line: CursorLine,
}

impl ControlBlock {
    pub const SIZE: usize = std::mem::size_of::<ControlBlock>();

    /// Initializes a freshly-created control block in place. Only the
    /// segment creator calls this; an attaching peer only reads through it.
    ///
    /// # Safety
    /// `ptr` must point to at least `ControlBlock::SIZE` writable bytes,
    /// valid for the `'static` lifetime of the mapping.
    pub unsafe fn init(ptr: *mut ControlBlock, geometry: Geometry) {
        ptr.write(ControlBlock {
            write_line: CursorLine::zeroed(),
            read_line: CursorLine::zeroed(),
        });
        let cb = &*ptr;
        cb.write_line
            .user_region_bytes
            .store(geometry.user_region_bytes, std::sync::atomic::Ordering::Relaxed);
        cb.write_line
            .slot_stride_bytes
            .store(geometry.slot_stride_bytes, std::sync::atomic::Ordering::Relaxed);
        cb.read_line
            .user_region_bytes
            .store(geometry.user_region_bytes, std::sync::atomic::Ordering::Relaxed);
        cb.read_line
            .slot_stride_bytes
            .store(geometry.slot_stride_bytes, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn recorded_geometry(&self) -> Geometry {
        use std::sync::atomic::Ordering::Relaxed;
        Geometry {
            user_region_bytes: self.write_line.user_region_bytes.load(Relaxed),
            slot_stride_bytes: self.write_line.slot_stride_bytes.load(Relaxed),
        }
    }
}

/// Occupancy states for a slot's leading flag byte.
pub const FLAG_FREE: u8 = 0;
pub const FLAG_OCCUPIED: u8 = 1;

/// Smallest power-of-two multiple of [`CACHE_LINE_BYTES`] that holds the
/// occupancy flag plus `T`. Cache-line rounding alone would place each slot
/// on a cache-line boundary; rounding up to a power of two on top of that
/// also guarantees `user_region_bytes / stride` is a power of two, which the
/// ring-buffer's bitmask-based wrap arithmetic depends on.
pub const fn slot_stride_for<T>() -> usize {
    let needed = std::mem::size_of::<T>() + std::mem::size_of::<AtomicU8>();
    let floor = if needed < CACHE_LINE_BYTES {
        CACHE_LINE_BYTES
    } else {
        needed
    };
    floor.next_power_of_two()
}

/// Validates caller-supplied construction parameters before any shared
/// memory is touched. Returns the derived `(slot_stride, slot_count)` pair.
pub fn validate_geometry<T>(user_region_bytes: usize) -> Result<(usize, usize), QueueError> {
    if user_region_bytes == 0 || !user_region_bytes.is_power_of_two() {
        return Err(QueueError::ConfigurationInvalid(format!(
            "user_region_bytes ({user_region_bytes}) must be a non-zero power of two"
        )));
    }
    let stride = slot_stride_for::<T>();
    if user_region_bytes < stride {
        return Err(QueueError::ConfigurationInvalid(format!(
            "user_region_bytes ({user_region_bytes}) is smaller than one slot ({stride} bytes)"
        )));
    }
    let slot_count = user_region_bytes / stride;
    if slot_count == 0 || !slot_count.is_power_of_two() {
        return Err(QueueError::ConfigurationInvalid(format!(
            "user_region_bytes / slot_stride ({slot_count}) must be a power of two"
        )));
    }
    Ok((stride, slot_count))
}

/// Static-assertion helper for the message-size ceiling. Callers expose it
/// through an associated const on their own generic type (e.g.
/// `const ASSERT_MESSAGE_SIZE: () = assert_message_size::<T>();`), which is
/// itself generic over `T` and gets evaluated once per monomorphization —
/// unlike a `const` item nested directly inside a generic function body,
/// which cannot refer to that function's generic parameters at all. An
/// oversized `T` then fails to compile rather than failing at runtime.
pub const fn assert_message_size<T>() {
    assert!(
        slot_stride_for::<T>() <= MAX_MESSAGE_BLOCK_BYTES,
        "message type exceeds the maximum slot size"
    );
}
