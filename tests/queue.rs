//! In-process and cross-thread coverage of scenarios 1-3 and properties
//! P1-P10. Two `Queue` handles sharing one segment, running on separate
//! threads within this test binary, stand in for "two processes" — the same
//! proxy used here for exercising cross-thread behavior without needing a
//! second OS process.

use serial_test::serial;
use spsc_shm_queue::{RaiiReceiver, RaiiSender, SendStatus};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Point {
    x: i64,
    y: i64,
}

fn unique_name(tag: &str) -> String {
    format!("/spsc-shm-queue-test-{tag}-{}", fastrand::u64(..))
}

#[test]
#[serial]
fn scenario_1_single_send_recv() {
    let name = unique_name("single");
    let sender = RaiiSender::<Point>::new(&name, 4096).unwrap();
    let receiver = RaiiReceiver::<Point>::new(&name, 4096).unwrap();

    assert_eq!(sender.send(Point { x: 1, y: 2 }), SendStatus::Sent);
    assert_eq!(receiver.recv(), Some(Point { x: 1, y: 2 }));
    assert_eq!(receiver.recv(), None);
}

#[test]
#[serial]
fn scenario_2_fill_drain_wraps_around_multiple_times() {
    let name = unique_name("wrap");
    let sender = RaiiSender::<i32>::new(&name, 1024).unwrap();
    let receiver = RaiiReceiver::<i32>::new(&name, 1024).unwrap();
    let capacity = sender.capacity();

    for round in 0..5 {
        for i in 0..capacity {
            assert_eq!(sender.send((round * capacity + i) as i32), SendStatus::Sent);
        }
        assert_eq!(sender.send(999), SendStatus::QueueFull);
        for i in 0..capacity {
            assert_eq!(receiver.recv(), Some((round * capacity + i) as i32));
        }
        assert_eq!(receiver.recv(), None);
    }
}

#[test]
#[serial]
fn scenario_3_interleaved_send_recv_across_threads() {
    let name = unique_name("interleave");
    let sender = RaiiSender::<u64>::new(&name, 4096).unwrap();
    let receiver = RaiiReceiver::<u64>::new(&name, 4096).unwrap();

    const COUNT: u64 = 10_000;
    let producer = thread::spawn(move || {
        let mut sent = 0u64;
        while sent < COUNT {
            if sender.send(sent) == SendStatus::Sent {
                sent += 1;
            } else {
                thread::yield_now();
            }
        }
    });

    let mut received = Vec::with_capacity(COUNT as usize);
    while (received.len() as u64) < COUNT {
        match receiver.recv() {
            Some(v) => received.push(v),
            None => thread::yield_now(),
        }
    }
    producer.join().unwrap();

    let expected: Vec<u64> = (0..COUNT).collect();
    assert_eq!(received, expected);
}

/// P1: a received payload is byte-identical to the one that was sent.
#[test]
#[serial]
fn p1_byte_identical_round_trip() {
    let name = unique_name("p1-byte-identical");
    let sender = RaiiSender::<Point>::new(&name, 1024).unwrap();
    let receiver = RaiiReceiver::<Point>::new(&name, 1024).unwrap();

    let sent = Point { x: -7, y: 9001 };
    assert_eq!(sender.send(sent), SendStatus::Sent);
    assert_eq!(receiver.recv(), Some(sent));
}

/// P2: sequence preservation — sends `s1, s2, …, sk` succeed in that order,
/// receives `r1, r2, …, rk` succeed in that order, and `rᵢ == sᵢ` for all `i`.
#[test]
#[serial]
fn p2_sequence_preserved_across_many_sends() {
    let name = unique_name("p2-sequence");
    let sender = RaiiSender::<i32>::new(&name, 1024).unwrap();
    let receiver = RaiiReceiver::<i32>::new(&name, 1024).unwrap();

    for i in 0..sender.capacity() {
        sender.send(i as i32);
    }
    for i in 0..receiver.capacity() {
        assert_eq!(receiver.recv(), Some(i as i32));
    }
}

/// P3: no fabrication — the number of successful non-empty receives never
/// exceeds the number of successful sends.
#[test]
#[serial]
fn p3_no_fabrication_beyond_successful_sends() {
    let name = unique_name("p3-no-fabrication");
    let sender = RaiiSender::<u8>::new(&name, 1024).unwrap();
    let receiver = RaiiReceiver::<u8>::new(&name, 1024).unwrap();

    let sent_count = sender.capacity() / 2;
    for i in 0..sent_count {
        assert_eq!(sender.send(i as u8), SendStatus::Sent);
    }

    let mut received_count = 0;
    for _ in 0..sender.capacity() {
        if receiver.recv().is_some() {
            received_count += 1;
        }
    }
    assert_eq!(received_count, sent_count);
    assert_eq!(receiver.recv(), None);
}

/// P4: no loss under single-threaded alternation — `send; recv` repeated any
/// number of times on an initially empty queue ends empty.
#[test]
#[serial]
fn p4_alternation_leaves_queue_empty() {
    let name = unique_name("p4-alternation");
    let sender = RaiiSender::<u32>::new(&name, 1024).unwrap();
    let receiver = RaiiReceiver::<u32>::new(&name, 1024).unwrap();

    for i in 0..10 * sender.capacity() as u32 {
        assert_eq!(sender.send(i), SendStatus::Sent);
        assert_eq!(receiver.recv(), Some(i));
    }
    assert!(receiver.is_empty());
    assert_eq!(sender.size(), 0);
}

/// P5: boundary — after exactly `N` successful sends on an empty queue with
/// no intervening receives, the next `send` returns `QueueFull`,
/// `is_full() == true`, and `size() == N`.
#[test]
#[serial]
fn p5_boundary_full_after_exactly_capacity_sends() {
    let name = unique_name("p5-boundary");
    let sender = RaiiSender::<u8>::new(&name, 1024).unwrap();
    let receiver = RaiiReceiver::<u8>::new(&name, 1024).unwrap();

    for i in 0..sender.capacity() {
        assert_eq!(sender.send(i as u8), SendStatus::Sent);
    }
    assert!(sender.is_full());
    assert_eq!(sender.size(), sender.capacity());
    assert_eq!(sender.send(0xFF), SendStatus::QueueFull);

    assert_eq!(receiver.recv(), Some(0));
    assert!(!sender.is_full());
    assert_eq!(sender.send(0xFF), SendStatus::Sent);
}

/// P6: wrap — over `K > N` paired `send`/`recv` cycles, the queue remains
/// operational and keeps delivering in order, demonstrating ring-buffer
/// wrap-around.
#[test]
#[serial]
fn p6_wrap_delivers_in_order_past_capacity() {
    let name = unique_name("p6-wrap");
    let sender = RaiiSender::<i32>::new(&name, 1024).unwrap();
    let receiver = RaiiReceiver::<i32>::new(&name, 1024).unwrap();

    let cycles = 4 * sender.capacity();
    for i in 0..cycles {
        assert_eq!(sender.send(i as i32), SendStatus::Sent);
        assert_eq!(receiver.recv(), Some(i as i32));
    }
    assert_eq!(sender.size(), 0);
}

/// P7: non-power-of-two region sizes are rejected before any shared memory
/// is touched.
#[test]
#[serial]
fn p7_non_power_of_two_region_rejected() {
    let name = unique_name("p7-pow2");
    assert!(spsc_shm_queue::Sender::<u8>::new(&name, 1000).is_err());
    assert!(spsc_shm_queue::Sender::<u8>::new(&name, 64 * 6).is_err());
}

/// Region sizes smaller than one slot are rejected too — a distinct
/// construction-time `ConfigurationInvalid` case from P7's power-of-two
/// check, but checked at the same point, before any shared memory is
/// touched.
#[test]
#[serial]
fn region_smaller_than_one_slot_is_rejected() {
    let name = unique_name("region-too-small");
    assert!(spsc_shm_queue::Sender::<[u8; 200]>::new(&name, 64).is_err());
}

/// P8: attaching with geometry `(U2, S2)` that differs from an
/// already-initialized segment's recorded `(U1, S1)` is rejected, and the
/// existing segment is left untouched.
#[test]
#[serial]
fn p8_attach_geometry_mismatch_is_reported() {
    let name = unique_name("p8-mismatch");
    let sender = RaiiSender::<u32>::new(&name, 1024).unwrap();
    sender.send(42);

    let err = spsc_shm_queue::Receiver::<u32>::new(&name, 2048).unwrap_err();
    assert!(matches!(err, spsc_shm_queue::QueueError::GeometryMismatch { .. }));

    // The mismatch attempt must not have disturbed the existing segment.
    let receiver = RaiiReceiver::<u32>::new(&name, 1024).unwrap();
    assert_eq!(receiver.recv(), Some(42));
}

/// P8 (shrinking case): the mismatch check must happen before the segment is
/// ever resized. An attach whose locally-derived geometry is *smaller* than
/// the live segment's must not truncate it first and validate second — that
/// would destroy an already-operating sender's in-flight data before
/// `GeometryMismatch` is ever returned.
#[test]
#[serial]
fn p8_attach_geometry_mismatch_does_not_truncate_existing_data() {
    let name = unique_name("p8-mismatch-shrink");
    let sender = RaiiSender::<u32>::new(&name, 2048).unwrap();
    for i in 0..sender.capacity() {
        assert_eq!(sender.send(i as u32), SendStatus::Sent);
    }

    let err = spsc_shm_queue::Receiver::<u32>::new(&name, 1024).unwrap_err();
    assert!(matches!(err, spsc_shm_queue::QueueError::GeometryMismatch { .. }));

    let receiver = RaiiReceiver::<u32>::new(&name, 2048).unwrap();
    for i in 0..receiver.capacity() {
        assert_eq!(receiver.recv(), Some(i as u32));
    }
}

/// P9: the derived slot stride is the smallest power-of-two multiple of the
/// cache line size holding the flag and `T`.
#[test]
fn p9_slot_stride_rounds_up_correctly() {
    use spsc_shm_queue::layout::slot_stride_for;
    assert_eq!(slot_stride_for::<u8>(), 64);
    assert_eq!(slot_stride_for::<[u8; 63]>(), 128);
    assert_eq!(slot_stride_for::<[u8; 127]>(), 256);
}

/// P10: immediately after creation, before any `send`, the queue is empty
/// and every slot is free — `recv` returns `None` repeatedly without side
/// effects.
#[test]
#[serial]
fn p10_idle_queue_is_empty_with_every_slot_free() {
    let name = unique_name("p10-idle");
    let receiver = RaiiReceiver::<u8>::new(&name, 1024).unwrap();
    assert!(receiver.is_empty());
    assert!(!receiver.is_full());
    assert_eq!(receiver.size(), 0);
    assert_eq!(receiver.recv(), None);
    assert_eq!(receiver.recv(), None);
}

/// Supplementary coverage (not one of the numbered properties): `size`/
/// `remaining_bytes` track sends and receives consistently as the queue
/// fills and drains.
#[test]
#[serial]
fn size_and_remaining_bytes_track_occupancy() {
    let name = unique_name("size-tracking");
    let sender = RaiiSender::<u32>::new(&name, 1024).unwrap();
    let receiver = RaiiReceiver::<u32>::new(&name, 1024).unwrap();
    let slot_size = sender.message_block_size();

    assert_eq!(sender.size(), 0);
    assert_eq!(sender.remaining_bytes(), sender.user_region_size());

    sender.send(1);
    sender.send(2);
    assert_eq!(sender.size(), 2);
    assert_eq!(
        sender.remaining_bytes(),
        sender.user_region_size() - 2 * slot_size
    );

    receiver.recv();
    assert_eq!(sender.size(), 1);
}

/// Supplementary coverage (not one of the numbered properties): a full
/// queue's cursors coincide (`write_offset == read_offset`) yet
/// `is_full`/`is_empty` disagree — disambiguated solely by the flag, per the
/// full/empty definitions this queue relies on.
#[test]
#[serial]
fn full_and_empty_disambiguated_by_flag_not_cursor_equality() {
    let name = unique_name("full-empty-disambiguate");
    let sender = RaiiSender::<u16>::new(&name, 1024).unwrap();
    let receiver = RaiiReceiver::<u16>::new(&name, 1024).unwrap();

    assert!(sender.is_empty());
    assert!(!sender.is_full());

    for i in 0..sender.capacity() {
        sender.send(i as u16);
    }
    assert!(sender.is_full());
    assert!(!receiver.is_empty());

    for _ in 0..receiver.capacity() {
        receiver.recv();
    }
    assert!(receiver.is_empty());
    assert!(!sender.is_full());
}

/// Either peer may run `new` first; both converge on the same segment.
#[test]
#[serial]
fn either_endpoint_may_initialize_first() {
    let name = unique_name("either-first");
    let receiver = RaiiReceiver::<u8>::new(&name, 1024).unwrap();
    let sender = RaiiSender::<u8>::new(&name, 1024).unwrap();

    sender.send(7);
    assert_eq!(receiver.recv(), Some(7));
}

#[test]
#[serial]
fn cleanup_unlinks_and_a_fresh_name_starts_empty() {
    let name = unique_name("cleanup");
    {
        let sender = RaiiSender::<u8>::new(&name, 1024).unwrap();
        sender.send(1);
    }
    // RAII wrapper unlinked on drop; re-creating under the same name must
    // not see the old message.
    let receiver = RaiiReceiver::<u8>::new(&name, 1024).unwrap();
    assert_eq!(receiver.recv(), None);
}
