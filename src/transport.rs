//! POSIX message queue transport adapter.
//!
//! Every endpoint and channel operation funnels through this module, which
//! is the only place that talks to `mq_*` directly. Two timeout shapes are
//! supported: infinite, which blocks on the plain `mq_send`/`mq_receive`
//! syscalls, and finite, which converts a millisecond budget into an
//! absolute `CLOCK_REALTIME` deadline and uses `mq_timedsend`/
//! `mq_timedreceive`. There is no retry loop here — a finite timeout either
//! completes before its deadline or comes back as `Status::Timeout`.

use std::ffi::CString;

use nix::errno::Errno;
use nix::mqueue::{
    mq_close, mq_getattr, mq_open, mq_receive, mq_send, mq_timedreceive, mq_timedsend, mq_unlink,
    MQ_OFlag, MqAttr, MqdT,
};
use nix::sys::stat::Mode;
use nix::sys::time::TimeSpec;
use nix::time::{clock_gettime, ClockId};

use crate::error::{NixErrnoError, TransportError};

/// How long a send/receive/open should wait before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Block until the operation completes.
    Infinite,
    /// Give up after this many milliseconds.
    Millis(u64),
}

/// Converts a finite timeout into an absolute deadline against
/// `CLOCK_REALTIME`, carrying nanosecond overflow into the seconds field so
/// the resulting `timespec` is never denormal.
fn absolute_deadline(millis: u64) -> Result<TimeSpec, Errno> {
    let now = clock_gettime(ClockId::CLOCK_REALTIME)?;
    let add_secs = (millis / 1000) as i64;
    let add_nanos = ((millis % 1000) * 1_000_000) as i64;

    let mut secs = now.tv_sec() + add_secs;
    let mut nanos = now.tv_nsec() + add_nanos;
    if nanos >= 1_000_000_000 {
        secs += nanos / 1_000_000_000;
        nanos %= 1_000_000_000;
    }
    Ok(TimeSpec::new(secs, nanos))
}

/// Opens (creating if absent) a queue for connectionless use.
///
/// Mirrors `pmq_create_epd`: `O_CREAT | O_RDWR`, never `O_EXCL` — a
/// pre-existing queue from an earlier run of the same endpoint is fine as
/// long as its attributes match what we ask for.
pub fn create_queue(
    name: &str,
    max_msg_size: i64,
    max_msg_count: i64,
) -> Result<MqdT, TransportError> {
    open_queue(name, MQ_OFlag::O_CREAT | MQ_OFlag::O_RDWR, max_msg_size, max_msg_count)
}

/// Opens a fresh channel receive-side queue, failing if it already exists.
///
/// Mirrors `pmq_open_chan_recv`'s `O_CREAT | O_RDWR | O_EXCL`: a channel is
/// a point-to-point pipe and a stale queue from a previous, improperly torn
/// down channel must not be silently reused.
pub fn create_queue_exclusive(
    name: &str,
    max_msg_size: i64,
    max_msg_count: i64,
) -> Result<MqdT, TransportError> {
    open_queue(
        name,
        MQ_OFlag::O_CREAT | MQ_OFlag::O_RDWR | MQ_OFlag::O_EXCL,
        max_msg_size,
        max_msg_count,
    )
}

fn open_queue(
    name: &str,
    oflag: MQ_OFlag,
    max_msg_size: i64,
    max_msg_count: i64,
) -> Result<MqdT, TransportError> {
    let cname = to_cstring(name);
    let attr = MqAttr::new(0, max_msg_count, max_msg_size, 0);
    let mqd = mq_open(
        &cname,
        oflag,
        Mode::S_IRUSR | Mode::S_IWUSR,
        Some(&attr),
    )
    .map_err(|e| TransportError::Open {
        queue: name.to_string(),
        source: NixErrnoError::from(e),
    })?;

    let observed = mq_getattr(&mqd).map_err(|e| TransportError::GetAttr {
        queue: name.to_string(),
        source: NixErrnoError::from(e),
    })?;
    if observed.mq_maxmsg() != max_msg_count || observed.mq_msgsize() != max_msg_size {
        return Err(TransportError::AttributeMismatch {
            queue: name.to_string(),
        });
    }

    Ok(mqd)
}

/// Opens an already-existing queue for writing, without creating it.
///
/// Mirrors `pmq_open_chan_send`: `ENOENT` means the receiving side has not
/// created the channel yet and is reported as [`TransportError::PeerNotReady`]
/// rather than a hard failure, so callers can treat it as "not yet" instead
/// of "never".
pub fn open_existing_for_send(name: &str) -> Result<MqdT, TransportError> {
    let cname = to_cstring(name);
    mq_open(&cname, MQ_OFlag::O_RDWR, Mode::empty(), None).map_err(|e| {
        if e == Errno::ENOENT {
            TransportError::PeerNotReady {
                queue: name.to_string(),
            }
        } else {
            TransportError::Open {
                queue: name.to_string(),
                source: NixErrnoError::from(e),
            }
        }
    })
}

/// Polls for an existing endpoint receive queue, per `pmq_open_epd`.
///
/// The spec's redesign flag measures the timeout budget against wall-clock
/// time rather than a fixed tick counter, so the caller (`endpoint::open_epd`)
/// drives the retry loop itself and calls this once per attempt; this
/// function never sleeps or retries on its own.
pub fn try_open_existing_for_send(name: &str) -> Result<Option<MqdT>, TransportError> {
    match open_existing_for_send(name) {
        Ok(mqd) => Ok(Some(mqd)),
        Err(TransportError::PeerNotReady { .. }) => Ok(None),
        Err(other) => Err(other),
    }
}

/// Sends `payload` on `mqd`, blocking indefinitely or until `timeout` elapses.
pub fn send(mqd: &MqdT, queue_name: &str, payload: &[u8], timeout: Timeout) -> Result<(), TransportError> {
    match timeout {
        Timeout::Infinite => mq_send(mqd, payload, 0).map_err(|e| send_error(queue_name, e)),
        Timeout::Millis(millis) => {
            let deadline = absolute_deadline(millis).map_err(|e| send_error(queue_name, e))?;
            mq_timedsend(mqd, payload, 0, &deadline).map_err(|e| send_error(queue_name, e))
        }
    }
}

fn send_error(queue_name: &str, e: Errno) -> TransportError {
    if e == Errno::ETIMEDOUT {
        TransportError::TimedOut {
            queue: queue_name.to_string(),
        }
    } else {
        TransportError::Send {
            queue: queue_name.to_string(),
            source: NixErrnoError::from(e),
        }
    }
}

/// Receives into `buf` from `mqd`, blocking indefinitely or until `timeout`
/// elapses. Returns the number of bytes written into `buf`.
pub fn recv(mqd: &MqdT, queue_name: &str, buf: &mut [u8], timeout: Timeout) -> Result<usize, TransportError> {
    match timeout {
        Timeout::Infinite => mq_receive(mqd, buf, &mut 0).map_err(|e| recv_error(queue_name, e)),
        Timeout::Millis(millis) => {
            let deadline = absolute_deadline(millis).map_err(|e| recv_error(queue_name, e))?;
            mq_timedreceive(mqd, buf, &mut 0, &deadline).map_err(|e| recv_error(queue_name, e))
        }
    }
}

fn recv_error(queue_name: &str, e: Errno) -> TransportError {
    if e == Errno::ETIMEDOUT {
        TransportError::TimedOut {
            queue: queue_name.to_string(),
        }
    } else {
        TransportError::Receive {
            queue: queue_name.to_string(),
            source: NixErrnoError::from(e),
        }
    }
}

/// Drains `mqd` with a zero-duration timed receive until it reports empty,
/// the same pattern `pmq_delete_epd` uses before closing a queue it created.
pub fn drain(mqd: &MqdT, queue_name: &str) {
    let zero = TimeSpec::new(0, 0);
    let mut scratch = [0u8; crate::limits::MAX_PACKET_SIZE as usize];
    loop {
        match mq_timedreceive(mqd, &mut scratch, &mut 0, &zero) {
            Ok(_) => continue,
            Err(_) => break,
        }
    }
    let _ = queue_name;
}

/// Number of messages currently queued, per `pmq_avail`.
pub fn available(mqd: &MqdT, queue_name: &str) -> Result<i64, TransportError> {
    mq_getattr(mqd)
        .map(|attr| attr.mq_curmsgs())
        .map_err(|e| TransportError::GetAttr {
            queue: queue_name.to_string(),
            source: NixErrnoError::from(e),
        })
}

/// Closes the descriptor and, if this side created the queue, unlinks it.
pub fn close(mqd: MqdT, name: &str, unlink: bool) {
    let _ = mq_close(mqd);
    if unlink {
        let cname = to_cstring(name);
        let _ = mq_unlink(&cname);
    }
}

fn to_cstring(name: &str) -> CString {
    CString::new(name).expect("queue names never contain interior NULs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_deadline_carries_nanosecond_overflow() {
        let deadline = absolute_deadline(1500).unwrap();
        let now = clock_gettime(ClockId::CLOCK_REALTIME).unwrap();
        assert!(deadline.tv_sec() >= now.tv_sec() + 1);
        assert!(deadline.tv_nsec() < 1_000_000_000);
        assert!(deadline.tv_nsec() >= 0);
    }

    #[test]
    fn absolute_deadline_is_strictly_in_the_future() {
        let now = clock_gettime(ClockId::CLOCK_REALTIME).unwrap();
        let deadline = absolute_deadline(10).unwrap();
        let now_nanos = now.tv_sec() as i128 * 1_000_000_000 + now.tv_nsec() as i128;
        let deadline_nanos = deadline.tv_sec() as i128 * 1_000_000_000 + deadline.tv_nsec() as i128;
        assert!(deadline_nanos > now_nanos);
    }
}
