//! Lock-free single-producer/single-consumer message queue over a named
//! POSIX shared-memory segment.
//!
//! Two processes (or threads) that agree on a name and a message type `T`
//! each construct one endpoint — a [`Sender<T>`] and a [`Receiver<T>`] — and
//! exchange fixed-size, [`Copy`] messages through it. The only
//! synchronization primitive is a per-slot atomic occupancy flag; there is
//! no kernel wait primitive, no cross-process mutex, and neither `send` nor
//! `recv` ever blocks.

pub mod error;
pub mod layout;
pub mod queue;
pub mod raii;
pub mod receiver;
pub mod segment;
pub mod sender;

pub use error::{Geometry, QueueError, SendStatus};
pub use raii::{RaiiReceiver, RaiiSender};
pub use receiver::Receiver;
pub use segment::{cleanup_stale_segments, SegmentOrigin};
pub use sender::Sender;
