//! Cross-process demo collaborator (C12): sends a fixed run of messages to a
//! named queue, then exits. Passing `--keep-alive` switches to a
//! long-running mode that waits for SIGINT before unlinking the segment,
//! demonstrating graceful teardown driven by `ctrlc` — useful for manual
//! two-terminal testing, not used by the automated cross-process suite.
//! CLI args are hand-parsed since the core crate has no other use for a
//! CLI-parsing dependency.
//!
//! Usage: sender_demo <segment-name> <user-region-bytes> <message-count> [--keep-alive]

use spsc_shm_queue::{SendStatus, Sender};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
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
        .expect("usage: sender_demo <name> <region-bytes> <count> [--keep-alive]");
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
    let keep_alive = args.next().as_deref() == Some("--keep-alive");

    let sender = Sender::<Message>::new(&name, region_bytes).expect("failed to create/attach queue");

    let mut sent = 0u64;
    while sent < count {
        let message = Message {
            sequence: sent,
            payload: sent.wrapping_mul(31),
        };
        match sender.send(message) {
            SendStatus::Sent => sent += 1,
            SendStatus::QueueFull => thread::sleep(Duration::from_micros(50)),
        }
    }
    log::info!("sender_demo: sent {sent} messages");

    if keep_alive {
        let running = Arc::new(AtomicBool::new(true));
        let handler_flag = running.clone();
        ctrlc::set_handler(move || handler_flag.store(false, Ordering::Relaxed))
            .expect("failed to install SIGINT handler");
        log::info!("sender_demo: waiting for SIGINT before unlinking");
        while running.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(50));
        }
        sender.cleanup().expect("failed to unlink segment");
    }
}
