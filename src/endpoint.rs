//! Endpoint table: the set of connectionless receive endpoints this node
//! owns, plus the lookup used to address a (possibly remote) endpoint
//! before sending to it.
//!
//! A `LocalEndpoint` owns the POSIX message queue backing one of this
//! node's ports; it is created once via [`EndpointTable::create`] and torn
//! down via [`EndpointTable::delete`]. A `RemoteEndpoint` is a lighter
//! handle obtained via [`open`], used only to send — it never touches the
//! table, since the table describes what this node owns, not what it talks
//! to.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use nix::mqueue::MqdT;

use crate::config::ENDPOINT_OPEN_POLL_INTERVAL;
use crate::error::{Status, TransportError};
use crate::limits::{MAX_MESSAGE_SIZE, MAX_PORT, MAX_QUEUE_ELEMENTS};
use crate::naming::receive_queue_name;
use crate::transport::{self, Timeout};

/// A connectionless receive endpoint owned by this node.
///
/// Invariant: `queue_name` is always `receive_queue_name(domain, node, port)`
/// for the port this record is filed under, so the table and the queue
/// namespace never disagree about which port a queue belongs to.
pub struct LocalEndpoint {
    pub domain: u32,
    pub node: u32,
    pub port: u32,
    mqd: MqdT,
    queue_name: String,
}

impl LocalEndpoint {
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn mqd(&self) -> &MqdT {
        &self.mqd
    }

    pub fn recv(&self, buf: &mut [u8], timeout: Timeout) -> Result<usize, Status> {
        transport::recv(&self.mqd, &self.queue_name, buf, timeout).map_err(|e| e.status())
    }

    pub fn available(&self) -> Result<i64, Status> {
        transport::available(&self.mqd, &self.queue_name).map_err(|e| e.status())
    }
}

/// A handle to someone else's (or our own) receive endpoint, open for
/// sending only.
pub struct RemoteEndpoint {
    mqd: MqdT,
    queue_name: String,
}

impl RemoteEndpoint {
    pub fn mqd(&self) -> &MqdT {
        &self.mqd
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn send(&self, payload: &[u8], timeout: Timeout) -> Result<(), Status> {
        transport::send(&self.mqd, &self.queue_name, payload, timeout)
            .map_err(|e| e.status())
    }
}

/// Table of endpoints owned by this node, indexed by port number.
///
/// Guarded by a single mutex: endpoint creation/deletion is rare compared
/// to the traffic flowing through the queues themselves, so there is no
/// benefit to finer-grained locking here.
pub struct EndpointTable {
    slots: Mutex<Vec<Option<LocalEndpoint>>>,
}

impl EndpointTable {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_PORT);
        slots.resize_with(MAX_PORT, || None);
        EndpointTable {
            slots: Mutex::new(slots),
        }
    }

    /// Creates (or re-creates) the receive queue for `(domain, node, port)`.
    ///
    /// Uses `O_CREAT | O_RDWR` without `O_EXCL`, so a queue left behind by a
    /// previous run of this same endpoint is reused as long as its
    /// attributes match; a queue with different attributes is rejected.
    pub fn create(&self, domain: u32, node: u32, port: u32) -> Result<(), Status> {
        let port_index = port as usize;
        if port_index >= MAX_PORT {
            return Err(Status::ParameterError);
        }

        let mut slots = self.slots.lock().expect("endpoint table mutex poisoned");
        if slots[port_index].is_some() {
            return Err(Status::GeneralError);
        }

        let queue_name = receive_queue_name(domain, node, port);
        let mqd = transport::create_queue(&queue_name, MAX_MESSAGE_SIZE, MAX_QUEUE_ELEMENTS)
            .map_err(|e: TransportError| e.status())?;

        slots[port_index] = Some(LocalEndpoint {
            domain,
            node,
            port,
            mqd,
            queue_name,
        });
        Ok(())
    }

    /// Drains and closes the queue for `port`, unlinking it since this node
    /// created it.
    pub fn delete(&self, port: u32) -> Result<(), Status> {
        let port_index = port as usize;
        if port_index >= MAX_PORT {
            return Err(Status::ParameterError);
        }

        let mut slots = self.slots.lock().expect("endpoint table mutex poisoned");
        let endpoint = slots[port_index].take().ok_or(Status::ParameterError)?;
        transport::drain(&endpoint.mqd, &endpoint.queue_name);
        transport::close(endpoint.mqd, &endpoint.queue_name, true);
        Ok(())
    }

    /// Runs `f` against the local endpoint at `port`, if one is reserved.
    pub fn with<R>(&self, port: u32, f: impl FnOnce(&LocalEndpoint) -> R) -> Option<R> {
        let slots = self.slots.lock().expect("endpoint table mutex poisoned");
        slots.get(port as usize)?.as_ref().map(f)
    }

    pub fn exists(&self, port: u32) -> bool {
        self.with(port, |_| ()).is_some()
    }

    /// Drains, closes, and unlinks every still-reserved endpoint's queue.
    /// Called from [`crate::node::finalize`] so a caller that forgot to
    /// delete an endpoint does not leak its queue in `/dev/mqueue`.
    pub fn teardown_all(&self) {
        let mut slots = self.slots.lock().expect("endpoint table mutex poisoned");
        for slot in slots.iter_mut() {
            if let Some(endpoint) = slot.take() {
                transport::drain(&endpoint.mqd, &endpoint.queue_name);
                transport::close(endpoint.mqd, &endpoint.queue_name, true);
            }
        }
    }
}

impl Default for EndpointTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Opens a handle to `(domain, node, port)`'s receive queue for sending,
/// polling at [`ENDPOINT_OPEN_POLL_INTERVAL`] cadence until the queue exists
/// or `timeout` elapses.
///
/// The wall-clock deadline (an [`Instant`] computed once up front) replaces
/// the original's tick-count budget: ticks assumed a fixed polling period,
/// which made the timeout's real-world meaning depend on how busy the
/// system was.
pub fn open(domain: u32, node: u32, port: u32, timeout: Timeout) -> Result<RemoteEndpoint, Status> {
    let queue_name = receive_queue_name(domain, node, port);
    let deadline = match timeout {
        Timeout::Millis(millis) => Some(Instant::now() + Duration::from_millis(millis)),
        Timeout::Infinite => None,
    };

    loop {
        match transport::try_open_existing_for_send(&queue_name) {
            Ok(Some(mqd)) => {
                return Ok(RemoteEndpoint {
                    mqd,
                    queue_name,
                })
            }
            Ok(None) => {}
            Err(e) => return Err(e.status()),
        }

        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(Status::Timeout);
            }
        }
        std::thread::sleep(ENDPOINT_OPEN_POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_out_of_range_port() {
        let table = EndpointTable::new();
        assert_eq!(table.create(0, 0, MAX_PORT as u32), Err(Status::ParameterError));
    }

    #[test]
    fn delete_rejects_out_of_range_port() {
        let table = EndpointTable::new();
        assert_eq!(table.delete(MAX_PORT as u32), Err(Status::ParameterError));
    }

    #[test]
    fn delete_unreserved_port_is_an_error() {
        let table = EndpointTable::new();
        assert_eq!(table.delete(3), Err(Status::ParameterError));
    }

    #[test]
    fn exists_is_false_before_creation() {
        let table = EndpointTable::new();
        assert!(!table.exists(5));
    }

    #[test]
    fn teardown_all_on_an_empty_table_is_a_no_op() {
        let table = EndpointTable::new();
        table.teardown_all();
    }
}
