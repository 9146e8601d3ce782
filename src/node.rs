//! Node lifecycle and the process-wide singleton that anchors it.
//!
//! A process plays exactly one node, identified by a `(domain, node)` pair
//! fixed at `initialize` and cleared at `finalize`. Everything under it —
//! the endpoint table, the request pool — lives inside the same singleton,
//! so a call made before `initialize` or after `finalize` has nothing to
//! operate on and reports `Status::NodeNotInitialized` instead of reaching
//! for uninitialized state.

use std::sync::{Mutex, OnceLock};

use crate::channel::ChannelTable;
use crate::endpoint::EndpointTable;
use crate::error::Status;
use crate::limits::{
    IMPLEMENTATION_VERSION, MAX_DOMAIN, MAX_NODE, MAX_PORT, ORGANIZATION_ID, VERSION,
};
use crate::request::RequestPool;

/// Static information about this implementation, the same fields the
/// original test suite checks in `init_info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Info {
    pub mcapi_version: u32,
    pub organization_id: u32,
    pub implementation_version: u32,
    pub number_of_domains: u32,
    pub number_of_nodes: u32,
    pub number_of_ports: u32,
}

impl Default for Info {
    fn default() -> Self {
        Info {
            mcapi_version: VERSION,
            organization_id: ORGANIZATION_ID,
            implementation_version: IMPLEMENTATION_VERSION,
            number_of_domains: MAX_DOMAIN,
            number_of_nodes: MAX_NODE,
            number_of_ports: MAX_PORT as u32,
        }
    }
}

/// A running node: its identity plus the tables it owns.
pub struct Node {
    domain: u32,
    node: u32,
    pub endpoints: EndpointTable,
    pub channels: ChannelTable,
    pub requests: RequestPool,
}

impl Node {
    pub fn domain_id(&self) -> u32 {
        self.domain
    }

    pub fn node_id(&self) -> u32 {
        self.node
    }

    /// Closes out everything this node left open: drains and unlinks every
    /// endpoint and channel receive queue, closes every open channel
    /// send-side handle, and clears the request pool. Called once from
    /// [`finalize`], before the node singleton itself is dropped.
    fn teardown(&self) {
        self.endpoints.teardown_all();
        self.channels.teardown_all();
        self.requests.clear();
    }
}

fn slot() -> &'static Mutex<Option<Node>> {
    static NODE: OnceLock<Mutex<Option<Node>>> = OnceLock::new();
    NODE.get_or_init(|| Mutex::new(None))
}

/// Brings up the node singleton for `(domain, node)`.
///
/// Returns `Status::NodeInitialized` if a node is already running in this
/// process — MCAPI nodes are one-per-process, so re-initializing is always
/// a caller error, never a refresh.
pub fn initialize(domain: u32, node: u32) -> Status {
    let mut guard = slot().lock().expect("node mutex poisoned");
    if guard.is_some() {
        return Status::NodeInitialized;
    }
    *guard = Some(Node {
        domain,
        node,
        endpoints: EndpointTable::new(),
        channels: ChannelTable::new(),
        requests: RequestPool::new(),
    });
    tracing::debug!(domain, node, "node initialized");
    Status::Success
}

/// Tears down the node singleton.
///
/// Closes all open endpoints, drains and unlinks their receive queues,
/// closes channel queues, and clears the request pool before the node
/// identity itself is cleared — a caller that forgot to call
/// `delete_endpoint`/`close_channel_*` does not leak a named queue in
/// `/dev/mqueue`.
pub fn finalize() -> Status {
    let mut guard = slot().lock().expect("node mutex poisoned");
    match guard.as_ref() {
        Some(node) => {
            node.teardown();
            *guard = None;
            tracing::debug!("node finalized");
            Status::Success
        }
        None => Status::NodeNotInitialized,
    }
}

pub fn is_initialized() -> bool {
    slot().lock().expect("node mutex poisoned").is_some()
}

/// Runs `f` against the live node, returning `None` if no node is running.
pub fn with_node<R>(f: impl FnOnce(&Node) -> R) -> Option<R> {
    let guard = slot().lock().expect("node mutex poisoned");
    guard.as_ref().map(f)
}

pub fn domain_id_get() -> Option<u32> {
    with_node(|n| n.domain_id())
}

pub fn node_id_get() -> Option<u32> {
    with_node(|n| n.node_id())
}

#[cfg(test)]
mod tests {
    // The node singleton is process-wide, so every scenario that mutates it
    // runs as one test: `cargo test` can run tests on separate threads, and
    // two tests toggling the same `OnceLock` would race.
    use super::*;

    #[test]
    fn lifecycle() {
        let _ = finalize();

        assert_eq!(domain_id_get(), None);
        assert_eq!(node_id_get(), None);
        assert_eq!(finalize(), Status::NodeNotInitialized);

        assert_eq!(initialize(3, 7), Status::Success);
        assert_eq!(domain_id_get(), Some(3));
        assert_eq!(node_id_get(), Some(7));
        assert_eq!(initialize(1, 2), Status::NodeInitialized);

        assert_eq!(finalize(), Status::Success);
        assert_eq!(domain_id_get(), None);
        assert_eq!(finalize(), Status::NodeNotInitialized);
    }
}
