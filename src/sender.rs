use crate::error::{QueueError, SendStatus};
use crate::queue::QueueHandle;
use crate::segment::SegmentOrigin;

/// The write-side endpoint of a queue (C6).
///
/// Touches only the write-side control-block cache line on its `send` hot
/// path; `unlink` is exposed here (not on [`crate::Receiver`]) because
/// tearing down the segment is conventionally the creator/producer's
/// responsibility, and a dropped receiver must never be able to strand a
/// still-running sender by unlinking the name out from under it.
pub struct Sender<T: Copy> {
    handle: QueueHandle<T>,
}

impl<T: Copy> Sender<T> {
    /// Creates the named segment if absent, or attaches to it if a peer
    /// already created it. `user_region_bytes` must be a power of two large
    /// enough for at least one slot of `T`.
    pub fn new(name: &str, user_region_bytes: usize) -> Result<Self, QueueError> {
        let (handle, origin) = QueueHandle::new(name, user_region_bytes)?;
        match origin {
            SegmentOrigin::Created => log::debug!("sender created queue {name}"),
            SegmentOrigin::Attached => log::debug!("sender attached to existing queue {name}"),
        }
        Ok(Sender { handle })
    }

    /// Publishes `message` if the slot the write cursor points to is free.
    /// Never blocks: returns [`SendStatus::QueueFull`] instead of waiting.
    #[inline]
    pub fn send(&self, message: T) -> SendStatus {
        self.handle.send(message)
    }

    pub fn is_full(&self) -> bool {
        self.handle.is_full()
    }

    pub fn is_empty(&self) -> bool {
        self.handle.is_empty()
    }

    /// Approximate occupied-slot count. Racy by construction: the two
    /// cursors it reads are updated independently by two different
    /// endpoints with no coordination between the reads.
    pub fn size(&self) -> usize {
        self.handle.size()
    }

    pub fn capacity(&self) -> usize {
        self.handle.capacity()
    }

    pub fn user_region_size(&self) -> usize {
        self.handle.user_region_size()
    }

    pub fn message_block_size(&self) -> usize {
        self.handle.message_block_size()
    }

    pub fn remaining_bytes(&self) -> usize {
        self.handle.remaining_bytes()
    }

    /// Unlinks the segment's name from the shared-memory namespace. Does not
    /// affect any mapping a peer already holds open; it only prevents future
    /// `Sender`/`Receiver::new` calls from finding this name. Not called
    /// automatically on `Drop` — only the test-only [`crate::raii`] wrappers
    /// do that, as an opt-in for deterministic test cleanup.
    pub fn cleanup(&self) -> std::io::Result<()> {
        self.handle.unlink()
    }

    pub(crate) fn name(&self) -> &str {
        self.handle.name()
    }
}
