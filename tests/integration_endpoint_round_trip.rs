//! End-to-end test exercising real POSIX message queues: two endpoints in
//! the same process exchange a connectionless message.
//!
//! Message queues require a mounted, writable `/dev/mqueue` (Linux-only, and
//! sometimes restricted in containers), so this test auto-skips rather than
//! failing when that is not available, the same opt-in pattern the upstream
//! benchmark suite uses for its own PMQ test.

#![cfg(target_os = "linux")]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Mutex;

use mcapi_core::{create_endpoint, delete_endpoint, finalize, get_endpoint, initialize, msg_recv, msg_send};

// `initialize`/`finalize` operate on a process-wide singleton, so tests in
// this binary that touch the node must not run concurrently.
static NODE_LOCK: Mutex<()> = Mutex::new(());

fn mqueue_usable() -> bool {
    let mq_dir = Path::new("/dev/mqueue");
    if !mq_dir.exists() || !mq_dir.is_dir() {
        eprintln!("skipping: /dev/mqueue not present");
        return false;
    }
    if let Ok(md) = fs::metadata(mq_dir) {
        let mode = md.permissions().mode();
        if (mode & 0o200) == 0 || (mode & 0o100) == 0 {
            eprintln!("skipping: /dev/mqueue not writable/executable by this user");
            return false;
        }
    }
    true
}

#[test]
fn connectionless_round_trip() {
    let _guard = NODE_LOCK.lock().unwrap();
    if !mqueue_usable() {
        return;
    }

    let domain = 1;
    let node = std::process::id();
    assert_eq!(initialize(domain, node), mcapi_core::Status::Success);

    let sender_port = 10;
    let receiver_port = 11;
    let receiver = create_endpoint(receiver_port).expect("create receive endpoint");
    let sender = create_endpoint(sender_port).expect("create send-side endpoint");

    let remote = get_endpoint(domain, node, receiver_port, Some(1_000))
        .expect("locate receiver endpoint");
    assert_eq!(msg_send(&remote, b"hello from integration test", Some(1_000)), mcapi_core::Status::Success);

    let mut buf = [0u8; 64];
    let size = msg_recv(&receiver, &mut buf, Some(1_000)).expect("receive message");
    assert_eq!(&buf[..size], b"hello from integration test");

    assert_eq!(delete_endpoint(receiver), mcapi_core::Status::Success);
    assert_eq!(delete_endpoint(sender), mcapi_core::Status::Success);
    assert_eq!(finalize(), mcapi_core::Status::Success);
}

#[test]
fn get_endpoint_times_out_when_nothing_is_listening() {
    let _guard = NODE_LOCK.lock().unwrap();
    if !mqueue_usable() {
        return;
    }

    assert_eq!(initialize(2, std::process::id()), mcapi_core::Status::Success);
    let result = get_endpoint(2, std::process::id(), 99, Some(20));
    assert_eq!(result.err(), Some(mcapi_core::Status::Timeout));
    assert_eq!(finalize(), mcapi_core::Status::Success);
}

#[test]
fn finalize_unlinks_a_queue_the_caller_forgot_to_delete() {
    let _guard = NODE_LOCK.lock().unwrap();
    if !mqueue_usable() {
        return;
    }

    let domain = 5;
    let node = std::process::id();
    assert_eq!(initialize(domain, node), mcapi_core::Status::Success);
    let _leaked = create_endpoint(42).expect("create endpoint");

    // no delete_endpoint call here — finalize must clean it up on its own
    assert_eq!(finalize(), mcapi_core::Status::Success);

    let queue_path = Path::new("/dev/mqueue").join(format!("mcapi_rx_{domain}_{node}_42"));
    assert!(!queue_path.exists(), "finalize left {:?} behind", queue_path);
}
