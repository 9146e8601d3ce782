//! Deterministic queue name derivation.
//!
//! Every endpoint and channel is addressed by a POSIX message queue name of
//! the form `/<prefix>_<domain>_<node>_<port>`. Two prefixes are in use:
//! `rx` for an endpoint's connectionless receive queue, `ch` for the queue
//! backing a channel between two endpoints. Keeping the two disjoint means a
//! connectionless send can never accidentally land in a channel's queue.

/// Builds the name of an endpoint's connectionless receive queue.
pub fn receive_queue_name(domain: u32, node: u32, port: u32) -> String {
    format!("/mcapi_rx_{domain}_{node}_{port}")
}

/// Builds the name of the channel queue bound to a port.
///
/// A channel has a single underlying queue shared by the connected pair: the
/// receiving endpoint creates it, the sending endpoint opens it.
pub fn channel_queue_name(domain: u32, node: u32, port: u32) -> String {
    format!("/mcapi_ch_{domain}_{node}_{port}")
}
