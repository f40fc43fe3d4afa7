//! Queue core (C5): non-blocking `send`/`recv` plus read-only observers,
//! shared by [`crate::Sender`] and [`crate::Receiver`].
//!
//! Each cursor is owned by exactly one endpoint, so there is no CAS loop
//! here: a single-writer/single-reader flag protocol needs nothing beyond
//! an acquire-load to test occupancy and a release-store to publish it.

use crate::error::{Geometry, QueueError};
use crate::layout::{assert_message_size, slot_stride_for, ControlBlock, FLAG_FREE, FLAG_OCCUPIED};
use crate::segment::{self, SegmentOrigin, ShmSegment};
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicU8, Ordering};

/// Shared machinery behind both endpoint roles. Not exposed directly —
/// `Sender`/`Receiver` each wrap one and forward only the methods their role
/// is allowed to call, so that each endpoint's hot path only ever touches
/// its own control-block cache line.
pub(crate) struct QueueHandle<T> {
    segment: ShmSegment,
    user_region_bytes: usize,
    slot_stride_bytes: usize,
    slot_count: usize,
    name: String,
    _marker: PhantomData<T>,
}

// SAFETY: `QueueHandle` only exposes `T` through atomic-guarded byte copies
// (`ptr::read_unaligned`/`ptr::write_unaligned`), never a live reference
// into the mapping, so `T: Send` is the only bound that matters for moving
// a handle across threads.
unsafe impl<T: Send> Send for QueueHandle<T> {}
unsafe impl<T: Send> Sync for QueueHandle<T> {}

impl<T: Copy> QueueHandle<T> {
    /// Forces a compile error, not a runtime one, for an oversized `T`.
    /// An associated const (rather than a `const` item nested inside `new`)
    /// is what makes this evaluate per concrete `T`: a free-standing nested
    /// item can't refer to the enclosing function's generic parameters, but
    /// an associated const on `impl<T: Copy> QueueHandle<T>` is itself
    /// generic over `T` and gets monomorphized like any other associated
    /// item.
    const ASSERT_MESSAGE_SIZE: () = assert_message_size::<T>();

    pub(crate) fn new(name: &str, user_region_bytes: usize) -> Result<(Self, SegmentOrigin), QueueError> {
        let () = Self::ASSERT_MESSAGE_SIZE;

        let (slot_stride_bytes, slot_count) = crate::layout::validate_geometry::<T>(user_region_bytes)?;
        let total_bytes = ControlBlock::SIZE + user_region_bytes;

        let (segment, origin) = ShmSegment::acquire(name, total_bytes)?;
        let control_ptr = segment.as_ptr() as *mut ControlBlock;

        let expected = Geometry {
            user_region_bytes,
            slot_stride_bytes,
        };

        match origin {
            SegmentOrigin::Created => {
                // SAFETY: just-mapped memory of at least `ControlBlock::SIZE`
                // bytes, and we are the only initializer (exclusive create).
                unsafe { ControlBlock::init(control_ptr, expected) };
            }
            SegmentOrigin::Attached => {
                let found = unsafe { &*control_ptr }.recorded_geometry();
                if found != expected {
                    log::error!(
                        "segment {name} geometry mismatch: expected {expected:?}, found {found:?}"
                    );
                    return Err(QueueError::GeometryMismatch { expected, found });
                }
            }
        }

        Ok((
            QueueHandle {
                segment,
                user_region_bytes,
                slot_stride_bytes,
                slot_count,
                name: name.to_string(),
                _marker: PhantomData,
            },
            origin,
        ))
    }

    fn control(&self) -> &ControlBlock {
        // SAFETY: `segment` is mapped for its full lifetime and always at
        // least `ControlBlock::SIZE` bytes (checked in `validate_geometry`
        // via `total_bytes`).
        unsafe { &*(self.segment.as_ptr() as *const ControlBlock) }
    }

    fn user_region_ptr(&self) -> *mut u8 {
        unsafe { self.segment.as_ptr().add(ControlBlock::SIZE) }
    }

    fn slot_ptr(&self, offset: usize) -> *mut u8 {
        unsafe { self.user_region_ptr().add(offset) }
    }

    fn flag_at(&self, offset: usize) -> &AtomicU8 {
        // SAFETY: `offset` is always `< user_region_bytes` and slot-aligned,
        // and the flag is the first byte of every slot.
        unsafe { &*(self.slot_ptr(offset) as *const AtomicU8) }
    }

    fn advance(&self, offset: usize) -> usize {
        (offset + self.slot_stride_bytes) & (self.user_region_bytes - 1)
    }

    /// Producer side of the protocol: acquire-load the flag, bail on
    /// occupied, copy the payload, advance the cursor, then release-store
    /// the flag. The cursor store is `Relaxed` — only the flag's
    /// release/acquire pair carries the happens-before edge.
    pub(crate) fn send(&self, message: T) -> crate::error::SendStatus {
        let control = self.control();
        let offset = control.write_line.offset.load(Ordering::Relaxed);
        let flag = self.flag_at(offset);

        if flag.load(Ordering::Acquire) == FLAG_OCCUPIED {
            return crate::error::SendStatus::QueueFull;
        }

        let payload_ptr = unsafe { self.slot_ptr(offset).add(std::mem::size_of::<AtomicU8>()) };
        unsafe { ptr::write_unaligned(payload_ptr as *mut T, message) };

        let next = self.advance(offset);
        control.write_line.offset.store(next, Ordering::Relaxed);
        flag.store(FLAG_OCCUPIED, Ordering::Release);

        crate::error::SendStatus::Sent
    }

    /// Consumer side of the protocol: symmetric to `send`, bailing on
    /// a free slot (empty queue) instead of an occupied one.
    pub(crate) fn recv(&self) -> Option<T> {
        let control = self.control();
        let offset = control.read_line.offset.load(Ordering::Relaxed);
        let flag = self.flag_at(offset);

        if flag.load(Ordering::Acquire) == FLAG_FREE {
            return None;
        }

        let payload_ptr = unsafe { self.slot_ptr(offset).add(std::mem::size_of::<AtomicU8>()) };
        let message = unsafe { ptr::read_unaligned(payload_ptr as *const T) };

        let next = self.advance(offset);
        control.read_line.offset.store(next, Ordering::Relaxed);
        flag.store(FLAG_FREE, Ordering::Release);

        Some(message)
    }

    /// Full/empty are defined solely by the flags at each cursor, never by
    /// comparing the two cursors against each other — a full ring and an
    /// empty ring both have `write_offset == read_offset`; the flag at that
    /// shared slot disambiguates them.
    pub(crate) fn is_full(&self) -> bool {
        let control = self.control();
        let offset = control.write_line.offset.load(Ordering::Relaxed);
        self.flag_at(offset).load(Ordering::Acquire) == FLAG_OCCUPIED
    }

    pub(crate) fn is_empty(&self) -> bool {
        let control = self.control();
        let offset = control.read_line.offset.load(Ordering::Relaxed);
        self.flag_at(offset).load(Ordering::Acquire) == FLAG_FREE
    }

    /// Racy by nature: reads both cursors without any coordination between
    /// them and is meant only as an approximate, off-hot-path observer,
    /// never as a basis for a blocking decision.
    pub(crate) fn size(&self) -> usize {
        let control = self.control();
        let write = control.write_line.offset.load(Ordering::Relaxed);
        let read = control.read_line.offset.load(Ordering::Relaxed);
        let distance = write.wrapping_sub(read) & (self.user_region_bytes - 1);
        if distance == 0 && self.is_full() {
            self.slot_count
        } else {
            distance / self.slot_stride_bytes
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slot_count
    }

    pub(crate) fn user_region_size(&self) -> usize {
        self.user_region_bytes
    }

    pub(crate) fn message_block_size(&self) -> usize {
        self.slot_stride_bytes
    }

    pub(crate) fn remaining_bytes(&self) -> usize {
        self.user_region_bytes - self.size() * self.slot_stride_bytes
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn unlink(&self) -> std::io::Result<()> {
        segment::unlink(&self.name)
    }
}
