//! Ambient, process-wide tunables, the node identity builder, and test/dev
//! logging setup.
//!
//! The poll intervals and [`NodeConfig`] below are the only things in this
//! crate that vary per node; everything else the fixed-capacity tables are
//! built around is sized at compile time (see [`crate::limits`]) and has
//! nothing to reconfigure once a node is running.

use std::time::Duration;

use crate::error::Status;

/// Interval between predicate polls in [`crate::request::RequestPool::wait`].
pub const REQUEST_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Interval between retries in [`crate::endpoint::open`] while waiting for a
/// remote endpoint's queue to come into existence.
pub const ENDPOINT_OPEN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// In-process, typed configuration for bringing up a node — the `domain` and
/// `node` identity pair [`crate::node::initialize`] takes directly, wrapped
/// the way the teacher's `TransportConfig` wraps transport parameters. There
/// is no file or environment parsing here: a domain/node pair is assigned by
/// whatever out-of-band scheme the embedding application already uses to
/// divide up its processes, not discovered from config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeConfig {
    pub domain: u32,
    pub node: u32,
}

impl NodeConfig {
    pub fn new(domain: u32, node: u32) -> Self {
        NodeConfig { domain, node }
    }

    pub fn with_domain(mut self, domain: u32) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_node(mut self, node: u32) -> Self {
        self.node = node;
        self
    }

    /// Brings up the node singleton with this configuration. Equivalent to
    /// [`crate::api::initialize`], spelled as a method on the builder.
    pub fn initialize(self) -> Status {
        crate::node::initialize(self.domain, self.node)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig { domain: 0, node: 0 }
    }
}

/// Installs a `tracing` subscriber reading its filter from `RUST_LOG`,
/// falling back to `info` level. Intended for integration tests and any
/// future binary built on top of this crate; the library itself never
/// installs a subscriber on its own, since doing so from library code would
/// fight with whatever the embedding process already set up.
pub fn init_tracing_for_tests() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_methods_override_defaults() {
        let config = NodeConfig::default().with_domain(3).with_node(7);
        assert_eq!(config, NodeConfig::new(3, 7));
    }

    #[test]
    fn default_is_domain_zero_node_zero() {
        assert_eq!(NodeConfig::default(), NodeConfig::new(0, 0));
    }
}
