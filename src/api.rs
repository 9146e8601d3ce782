//! Public dispatcher: the entry points an embedding application calls.
//!
//! Every function here follows the same validation order before it touches
//! any shared state: node-initialization state first, then parameter
//! validity, then handle validity, and only then does it dispatch to
//! [`crate::endpoint`], [`crate::channel`], or [`crate::request`]. That
//! order is what makes the difference between `Status::NodeNotInitialized`
//! and `Status::ParameterError` meaningful to a caller that got two things
//! wrong at once.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::channel::ChannelType;
use crate::endpoint::{self, LocalEndpoint, RemoteEndpoint};
use crate::error::Status;
use crate::node::{self, Info};
use crate::request::{CompletionPredicate, RequestHandle};
use crate::transport::Timeout;

/// A port this node owns, created via [`create_endpoint`].
pub struct EndpointHandle(u32);

impl EndpointHandle {
    pub fn port(&self) -> u32 {
        self.0
    }
}

/// A handle to someone else's endpoint, opened for sending via
/// [`get_endpoint`].
pub struct RemoteEndpointHandle(RemoteEndpoint);

/// The receiving side of a channel, created via [`create_channel_recv`].
/// Backed by a port-keyed entry in the node's channel table, not owned
/// directly, so [`crate::node::finalize`] can close it even if the caller
/// never calls [`close_channel_recv`].
pub struct ChannelRecvHandle(u32);

/// The sending side of a channel, opened via [`open_channel_send`]. Backed
/// by a slot in the node's channel table for the same reason as
/// [`ChannelRecvHandle`].
pub struct ChannelSendHandle(usize);

fn require_initialized() -> Result<(), Status> {
    if node::is_initialized() {
        Ok(())
    } else {
        Err(Status::NodeNotInitialized)
    }
}

/// Brings up this process's node identity. Must be called exactly once
/// before any other entry point in this module.
pub fn initialize(domain: u32, node: u32) -> Status {
    node::initialize(domain, node)
}

/// Tears down this process's node identity.
pub fn finalize() -> Status {
    node::finalize()
}

/// Static capabilities of this implementation (table sizes, versions).
pub fn get_info() -> Result<Info, Status> {
    require_initialized()?;
    Ok(Info::default())
}

pub fn domain_id_get() -> Result<u32, Status> {
    node::domain_id_get().ok_or(Status::NodeNotInitialized)
}

pub fn node_id_get() -> Result<u32, Status> {
    node::node_id_get().ok_or(Status::NodeNotInitialized)
}

/// Renders a status message into `buf`. See [`crate::error::display_status`].
pub fn display_status(code: u32, buf: &mut [u8]) -> Option<()> {
    crate::error::display_status(code, buf)
}

/// Creates a receive endpoint on `port`, owned by this node.
pub fn create_endpoint(port: u32) -> Result<EndpointHandle, Status> {
    require_initialized()?;
    node::with_node(|n| n.endpoints.create(n.domain_id(), n.node_id(), port))
        .ok_or(Status::NodeNotInitialized)??;
    Ok(EndpointHandle(port))
}

/// Deletes a previously created endpoint, draining and unlinking its queue.
pub fn delete_endpoint(handle: EndpointHandle) -> Status {
    if let Err(status) = require_initialized() {
        return status;
    }
    match node::with_node(|n| n.endpoints.delete(handle.0)) {
        Some(Ok(())) => Status::Success,
        Some(Err(status)) => status,
        None => Status::NodeNotInitialized,
    }
}

/// Opens a handle to a (possibly remote) endpoint for sending, polling until
/// it exists or `timeout_millis` elapses (`None` blocks indefinitely).
pub fn get_endpoint(
    domain: u32,
    node_id: u32,
    port: u32,
    timeout_millis: Option<u64>,
) -> Result<RemoteEndpointHandle, Status> {
    require_initialized()?;
    let timeout = to_transport_timeout(timeout_millis);
    endpoint::open(domain, node_id, port, timeout).map(RemoteEndpointHandle)
}

/// Sends a connectionless message to `remote`.
pub fn msg_send(remote: &RemoteEndpointHandle, payload: &[u8], timeout_millis: Option<u64>) -> Status {
    if let Err(status) = require_initialized() {
        return status;
    }
    if payload.is_empty() {
        return Status::ParameterError;
    }
    match remote.0.send(payload, to_transport_timeout(timeout_millis)) {
        Ok(()) => Status::Success,
        Err(status) => status,
    }
}

/// Receives a connectionless message on `endpoint` into `buf`.
pub fn msg_recv(
    endpoint: &EndpointHandle,
    buf: &mut [u8],
    timeout_millis: Option<u64>,
) -> Result<usize, Status> {
    require_initialized()?;
    let timeout = to_transport_timeout(timeout_millis);
    node::with_node(|n| n.endpoints.with(endpoint.0, |ep: &LocalEndpoint| ep.recv(buf, timeout)))
        .flatten()
        .ok_or(Status::ParameterError)?
}

/// Number of messages currently queued on `endpoint`.
pub fn msg_available(endpoint: &EndpointHandle) -> Result<i64, Status> {
    require_initialized()?;
    node::with_node(|n| n.endpoints.with(endpoint.0, |ep: &LocalEndpoint| ep.available()))
        .flatten()
        .ok_or(Status::ParameterError)?
}

/// Creates the receiving side of a channel of `channel_type` on this node's
/// `port`. Filed in the node's channel table, so [`crate::node::finalize`]
/// can close it even if the caller never calls [`close_channel_recv`].
pub fn create_channel_recv(port: u32, channel_type: ChannelType) -> Result<ChannelRecvHandle, Status> {
    require_initialized()?;
    node::with_node(|n| n.channels.create_recv(n.domain_id(), n.node_id(), port, channel_type))
        .ok_or(Status::NodeNotInitialized)??;
    Ok(ChannelRecvHandle(port))
}

/// Opens the sending side of a channel at `(domain, node, port)`. Returns
/// `Ok(None)` if the receiving side has not created it yet. Filed in the
/// node's channel table for the same reason as [`create_channel_recv`].
pub fn open_channel_send(
    domain: u32,
    node_id: u32,
    port: u32,
) -> Result<Option<ChannelSendHandle>, Status> {
    require_initialized()?;
    node::with_node(|n| n.channels.open_send(domain, node_id, port))
        .ok_or(Status::NodeNotInitialized)?
        .map(|maybe| maybe.map(ChannelSendHandle))
}

/// Sends `payload` over an already-open channel.
pub fn channel_send(handle: &ChannelSendHandle, payload: &[u8], timeout_millis: Option<u64>) -> Status {
    if let Err(status) = require_initialized() {
        return status;
    }
    let timeout = to_transport_timeout(timeout_millis);
    match node::with_node(|n| n.channels.with_send(handle.0, |channel| channel.send(payload, timeout))) {
        Some(Some(Ok(()))) => Status::Success,
        Some(Some(Err(status))) => status,
        Some(None) => Status::ParameterError,
        None => Status::NodeNotInitialized,
    }
}

/// Receives into `buf` over an already-open channel.
pub fn channel_recv(
    handle: &ChannelRecvHandle,
    buf: &mut [u8],
    timeout_millis: Option<u64>,
) -> Result<usize, Status> {
    require_initialized()?;
    let timeout = to_transport_timeout(timeout_millis);
    node::with_node(|n| n.channels.with_recv(handle.0, |channel| channel.recv(buf, timeout)))
        .ok_or(Status::NodeNotInitialized)?
        .ok_or(Status::ParameterError)?
}

/// Closes the receiving side of a channel, unlinking its queue.
pub fn close_channel_recv(handle: ChannelRecvHandle) -> Status {
    match node::with_node(|n| n.channels.close_recv(handle.0)) {
        Some(Ok(())) => Status::Success,
        Some(Err(status)) => status,
        None => Status::NodeNotInitialized,
    }
}

/// Closes the sending side of a channel. `unlink` should be `true` only if
/// this side also created the queue out-of-band; ordinarily the receiving
/// side owns cleanup.
pub fn close_channel_send(handle: ChannelSendHandle, unlink: bool) -> Status {
    match node::with_node(|n| n.channels.close_send(handle.0, unlink)) {
        Some(Ok(())) => Status::Success,
        Some(Err(status)) => status,
        None => Status::NodeNotInitialized,
    }
}

fn to_transport_timeout(timeout_millis: Option<u64>) -> Timeout {
    match timeout_millis {
        Some(millis) => Timeout::Millis(millis),
        None => Timeout::Infinite,
    }
}

type Outcome = Arc<Mutex<Option<Result<usize, Status>>>>;

struct OutcomePredicate(Outcome);

impl CompletionPredicate for OutcomePredicate {
    fn evaluate(&mut self) -> bool {
        self.0.lock().expect("outcome mutex poisoned").is_some()
    }

    fn size_on_completion(&self) -> usize {
        match &*self.0.lock().expect("outcome mutex poisoned") {
            Some(Ok(size)) => *size,
            _ => 0,
        }
    }
}

fn spawn_async(f: impl FnOnce() -> Result<usize, Status> + Send + 'static) -> RequestHandle {
    let outcome: Outcome = Arc::new(Mutex::new(None));
    let outcome_for_thread = outcome.clone();
    std::thread::spawn(move || {
        let result = f();
        if let Err(status) = &result {
            tracing::warn!(?status, "asynchronous operation failed");
        }
        *outcome_for_thread.lock().expect("outcome mutex poisoned") = Some(result);
    });

    node::with_node(|n| n.requests.reserve(Some(Box::new(OutcomePredicate(outcome)))))
        .unwrap_or(RequestHandle::NULL)
}

/// Starts a connectionless send without blocking the caller, returning a
/// request handle to poll with [`wait`] or [`test`].
pub fn msg_send_async(remote: RemoteEndpointHandle, payload: Vec<u8>) -> Result<RequestHandle, Status> {
    require_initialized()?;
    Ok(spawn_async(move || {
        remote.0.send(&payload, Timeout::Infinite).map(|()| payload.len())
    }))
}

/// Polls `handle` once without blocking, matching `mcapi_test`.
pub fn test(handle: RequestHandle) -> (Status, usize) {
    node::with_node(|n| n.requests.test(handle)).unwrap_or((Status::NodeNotInitialized, 0))
}

/// Polls `handle` until it completes or `timeout_millis` elapses.
pub fn wait(handle: RequestHandle, timeout_millis: Option<u64>) -> (Status, usize) {
    let timeout = timeout_millis.map(Duration::from_millis);
    match node::with_node(|n| n.requests.wait(handle, timeout)) {
        Some(result) => result,
        None => (Status::NodeNotInitialized, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_before_initialize_report_not_initialized() {
        let _ = finalize();
        assert_eq!(create_endpoint(1).err(), Some(Status::NodeNotInitialized));
        assert_eq!(domain_id_get().err(), Some(Status::NodeNotInitialized));
    }

    #[test]
    fn empty_message_is_a_parameter_error() {
        let _ = finalize();
        assert_eq!(initialize(1, 1), Status::Success);
        let ep = create_endpoint(1).unwrap();
        let remote = get_endpoint(1, 1, 1, Some(50)).unwrap();
        assert_eq!(msg_send(&remote, &[], None), Status::ParameterError);
        assert_eq!(delete_endpoint(ep), Status::Success);
        let _ = finalize();
    }
}
