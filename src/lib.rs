//! # mcapi-core
//!
//! Core of a multi-core communication runtime: a single-process
//! implementation of an MCAPI-style messaging API (domains, nodes, ports,
//! endpoints, channels) built on POSIX message queues.
//!
//! A process plays one node. It calls [`api::initialize`] once, creates the
//! endpoints and channels it needs, exchanges messages, and calls
//! [`api::finalize`] before exiting. Every entry point is synchronous: there
//! are no threads spawned on a caller's behalf except for the optional
//! `_async` request-pool operations, whose completion is polled through
//! [`api::wait`] and [`api::test`].

pub mod api;
pub mod channel;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod limits;
pub mod naming;
pub mod node;
pub mod request;
pub mod transport;

pub use api::{
    channel_recv, channel_send, close_channel_recv, close_channel_send, create_channel_recv,
    create_endpoint, delete_endpoint, display_status, domain_id_get, finalize, get_endpoint,
    get_info, initialize, msg_available, msg_recv, msg_send, msg_send_async, node_id_get, test,
    wait, ChannelRecvHandle, ChannelSendHandle, EndpointHandle, RemoteEndpointHandle,
};
pub use channel::ChannelType;
pub use config::NodeConfig;
pub use error::{Status, TransportError};
pub use node::Info;
pub use request::RequestHandle;
pub use transport::Timeout;

/// The current version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
