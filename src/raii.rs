//! RAII test helpers (C6) that unlink the segment's name on `Drop`.
//!
//! `Sender`/`Receiver` never unlink automatically (a long-lived queue can
//! outlive the handle that created it); these wrappers exist purely so
//! tests don't leak named shared memory between runs. They transparently
//! deref to the endpoint they wrap. Not intended for use outside this
//! crate's own tests and demos.

use crate::error::QueueError;
use crate::{Receiver, Sender};
use std::ops::{Deref, DerefMut};

/// Wraps a [`Sender`], unlinking its segment's name on `Drop`.
pub struct RaiiSender<T: Copy> {
    inner: Sender<T>,
}

impl<T: Copy> RaiiSender<T> {
    pub fn new(name: &str, user_region_bytes: usize) -> Result<Self, QueueError> {
        Ok(RaiiSender {
            inner: Sender::new(name, user_region_bytes)?,
        })
    }
}

impl<T: Copy> Deref for RaiiSender<T> {
    type Target = Sender<T>;
    fn deref(&self) -> &Sender<T> {
        &self.inner
    }
}

impl<T: Copy> DerefMut for RaiiSender<T> {
    fn deref_mut(&mut self) -> &mut Sender<T> {
        &mut self.inner
    }
}

impl<T: Copy> Drop for RaiiSender<T> {
    fn drop(&mut self) {
        if let Err(err) = self.inner.cleanup() {
            log::warn!("RaiiSender failed to unlink {}: {err}", self.inner.name());
        }
    }
}

/// Wraps a [`Receiver`], unlinking its segment's name on `Drop`.
///
/// In production a receiver never unlinks (that's the sender's job); this
/// wrapper exists only so a test that happens to construct the receiver
/// first still cleans up deterministically.
pub struct RaiiReceiver<T: Copy> {
    inner: Receiver<T>,
}

impl<T: Copy> RaiiReceiver<T> {
    pub fn new(name: &str, user_region_bytes: usize) -> Result<Self, QueueError> {
        Ok(RaiiReceiver {
            inner: Receiver::new(name, user_region_bytes)?,
        })
    }
}

impl<T: Copy> Deref for RaiiReceiver<T> {
    type Target = Receiver<T>;
    fn deref(&self) -> &Receiver<T> {
        &self.inner
    }
}

impl<T: Copy> DerefMut for RaiiReceiver<T> {
    fn deref_mut(&mut self) -> &mut Receiver<T> {
        &mut self.inner
    }
}

impl<T: Copy> Drop for RaiiReceiver<T> {
    fn drop(&mut self) {
        if let Err(err) = self.inner.unlink() {
            log::warn!("RaiiReceiver failed to unlink {}: {err}", self.inner.name());
        }
    }
}
