//! Cross-process demo collaborator (C12): attaches to a named queue and
//! drains exactly `message-count` messages, verifying FIFO order, then
//! exits. Paired with `sender_demo` by `tests/cross_process.rs` to exercise
//! the literal cross-process send/receive scenarios across two real OS
//! processes.
//!
//! Usage: receiver_demo <segment-name> <user-region-bytes> <message-count>

use spsc_shm_queue::Receiver;
use std::env;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
struct Message {
    sequence: u64,
    payload: u64,
}

fn main() {
    env_logger::init();
    let mut args = env::args().skip(1);
    let name = args
        .next()
        .expect("usage: receiver_demo <name> <region-bytes> <count>");
    let region_bytes: usize = args
        .next()
        .expect("missing <region-bytes>")
        .parse()
        .expect("<region-bytes> must be a number");
    let count: u64 = args
        .next()
        .expect("missing <count>")
        .parse()
        .expect("<count> must be a number");

    let receiver = Receiver::<Message>::new(&name, region_bytes).expect("failed to create/attach queue");

    let mut expected_sequence = 0u64;
    while expected_sequence < count {
        match receiver.recv() {
            Some(message) => {
                assert_eq!(
                    message.sequence, expected_sequence,
                    "received out-of-order message"
                );
                assert_eq!(message.payload, expected_sequence.wrapping_mul(31));
                expected_sequence += 1;
            }
            None => thread::sleep(Duration::from_micros(50)),
        }
    }

    log::info!("receiver_demo: received {expected_sequence} messages in order");
}
