//! Compile-time limits and version metadata.
//!
//! These mirror the constants a node's `Info` struct reports to callers and
//! the fixed capacities of the endpoint table and request pool. They are
//! compile-time constants rather than configuration because the tables they
//! size are fixed-capacity arrays allocated once, at node initialization.

/// Maximum number of domains the implementation is prepared to address.
pub const MAX_DOMAIN: u32 = 16;

/// Maximum number of nodes per domain.
pub const MAX_NODE: u32 = 64;

/// Maximum number of ports (and therefore endpoints) per node.
pub const MAX_PORT: usize = 64;

/// Maximum number of outstanding request handles per node.
pub const MAX_REQUESTS: usize = 64;

/// Maximum number of queued messages per queue (connectionless or channel).
pub const MAX_QUEUE_ELEMENTS: i64 = 10;

/// Maximum size in bytes of a connectionless message.
pub const MAX_MESSAGE_SIZE: i64 = 1024;

/// Maximum size in bytes of a packet-channel message (larger than a plain message).
pub const MAX_PACKET_SIZE: i64 = 4096;

/// Version of the messaging API implemented here.
pub const VERSION: u32 = 2013;

/// Organization id reported in `Info`. Distinguishes vendor implementations.
pub const ORGANIZATION_ID: u32 = 0;

/// Implementation version, independent of the API version above.
pub const IMPLEMENTATION_VERSION: u32 = 1;

/// Maximum length, including the terminating NUL, of a status message
/// produced by `display_status`.
pub const MAX_STATUS_MSG_LEN: usize = 64;
