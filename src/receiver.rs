use crate::error::QueueError;
use crate::queue::QueueHandle;
use crate::segment::SegmentOrigin;

/// The read-side endpoint of a queue (C6).
///
/// Touches only the read-side control-block cache line on its `recv` hot
/// path. Never unlinks the segment — see [`crate::Sender::cleanup`].
pub struct Receiver<T: Copy> {
    handle: QueueHandle<T>,
}

impl<T: Copy> Receiver<T> {
    /// Creates the named segment if absent, or attaches to it if a peer
    /// already created it. Either endpoint may run first; both converge on
    /// the same layout because geometry is validated on attach.
    pub fn new(name: &str, user_region_bytes: usize) -> Result<Self, QueueError> {
        let (handle, origin) = QueueHandle::new(name, user_region_bytes)?;
        match origin {
            SegmentOrigin::Created => log::debug!("receiver created queue {name}"),
            SegmentOrigin::Attached => log::debug!("receiver attached to existing queue {name}"),
        }
        Ok(Receiver { handle })
    }

    /// Takes the next message if the slot the read cursor points to is
    /// occupied. Never blocks: returns `None` instead of waiting for a
    /// sender.
    #[inline]
    pub fn recv(&self) -> Option<T> {
        self.handle.recv()
    }

    pub fn is_full(&self) -> bool {
        self.handle.is_full()
    }

    pub fn is_empty(&self) -> bool {
        self.handle.is_empty()
    }

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

    pub(crate) fn name(&self) -> &str {
        self.handle.name()
    }

    pub(crate) fn unlink(&self) -> std::io::Result<()> {
        self.handle.unlink()
    }
}
