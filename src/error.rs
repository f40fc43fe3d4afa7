use std::fmt;
use std::io;

/// Geometry recorded in a control block's redundant fields, used to detect a
/// mismatch between what a caller requests on attach and what the segment's
/// creator actually laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub user_region_bytes: usize,
    pub slot_stride_bytes: usize,
}

/// Errors raised while creating, attaching to, or validating a queue.
///
/// `QueueFull`/`QueueEmpty` are not part of this type: they are ordinary,
/// expected outcomes of `send`/`recv` on a non-blocking queue, not failures.
/// See [`crate::SendStatus`].
#[derive(Debug)]
pub enum QueueError {
    /// A caller-supplied parameter is invalid before any shared memory is
    /// touched — a non-power-of-two `user_region_bytes`, a region smaller
    /// than the control block, or similar.
    ConfigurationInvalid(String),
    /// The segment already existed and its recorded geometry does not match
    /// what this call requested. The segment is left untouched.
    GeometryMismatch { expected: Geometry, found: Geometry },
    /// A POSIX shared-memory or mmap call failed.
    ResourceFailure(io::Error),
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::ConfigurationInvalid(msg) => {
                write!(f, "invalid queue configuration: {msg}")
            }
            QueueError::GeometryMismatch { expected, found } => write!(
                f,
                "segment geometry mismatch: expected {expected:?}, found {found:?}"
            ),
            QueueError::ResourceFailure(err) => write!(f, "shared memory resource failure: {err}"),
        }
    }
}

impl std::error::Error for QueueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueueError::ResourceFailure(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for QueueError {
    fn from(err: io::Error) -> Self {
        QueueError::ResourceFailure(err)
    }
}

/// Outcome of a non-blocking [`crate::Sender::send`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// The message was published.
    Sent,
    /// The slot the sender would write to is still occupied; the caller's
    /// message was not copied anywhere. Not an error — the queue is simply
    /// at capacity right now.
    QueueFull,
}
