//! Status codes and the low-level transport error type.
//!
//! The public dispatcher in [`crate::api`] never lets a Rust panic or an
//! `errno` escape to the caller: every failure mode funnels into a
//! [`Status`] value, the same discipline the original MCAPI C API enforces
//! through its `mcapi_status_t* status` out-parameter.

use crate::limits::MAX_STATUS_MSG_LEN;

/// Exhaustive status codes reported by every public entry point.
///
/// `StatusCodeEnd` is a sentinel one past the last valid code — it is itself
/// a valid code for `display_status` (it has a message), but
/// `StatusCodeEnd as u32 + 1` is out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Status {
    Success = 0,
    Pending = 1,
    Timeout = 2,
    ParameterError = 3,
    RequestInvalid = 4,
    NodeInitialized = 5,
    NodeNotInitialized = 6,
    TransmissionError = 7,
    GeneralError = 8,
    StatusCodeEnd = 9,
}

impl Status {
    /// Numeric code, stable across versions, used by `display_status`.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Reconstruct a `Status` from its numeric code, rejecting out-of-range
    /// values (including anything past `StatusCodeEnd`).
    pub fn from_code(code: u32) -> Option<Status> {
        Some(match code {
            0 => Status::Success,
            1 => Status::Pending,
            2 => Status::Timeout,
            3 => Status::ParameterError,
            4 => Status::RequestInvalid,
            5 => Status::NodeInitialized,
            6 => Status::NodeNotInitialized,
            7 => Status::TransmissionError,
            8 => Status::GeneralError,
            9 => Status::StatusCodeEnd,
            _ => return None,
        })
    }

    /// Human-readable message, the same text `display_status` copies out.
    pub fn message(self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Pending => "request is pending",
            Status::Timeout => "operation timed out",
            Status::ParameterError => "invalid parameter",
            Status::RequestInvalid => "invalid or stale request handle",
            Status::NodeInitialized => "node is already initialized",
            Status::NodeNotInitialized => "node is not initialized",
            Status::TransmissionError => "transmission error",
            Status::GeneralError => "general error",
            Status::StatusCodeEnd => "end of status code range",
        }
    }
}

/// Copies `status`'s message into `buf`, truncating and always writing a
/// terminating NUL within bounds, matching `mcapi_display_status`.
///
/// Returns `None` (analogous to the original's `NULL` return) when `code` is
/// out of range, or when `buf` is empty (there is nowhere to put the NUL).
pub fn display_status(code: u32, buf: &mut [u8]) -> Option<()> {
    let status = Status::from_code(code)?;
    if buf.is_empty() {
        return None;
    }

    let msg = status.message().as_bytes();
    let copy_len = msg.len().min(buf.len() - 1);
    buf[..copy_len].copy_from_slice(&msg[..copy_len]);
    buf[copy_len] = 0;
    Some(())
}

/// Render a status message into an owned, NUL-terminated buffer no longer
/// than [`MAX_STATUS_MSG_LEN`]. Convenience wrapper for callers that do not
/// want to manage their own buffer.
pub fn display_status_owned(code: u32) -> Option<Vec<u8>> {
    let mut buf = vec![0u8; MAX_STATUS_MSG_LEN];
    display_status(code, &mut buf)?;
    let nul = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    buf.truncate(nul + 1);
    Some(buf)
}

/// Failures surfaced by the transport adapter before they are folded into a
/// [`Status`] by the dispatcher. Kept separate from `Status` because the
/// transport layer has more to say (which syscall, which queue name) than
/// the coarse status taxonomy exposes to callers.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("deadline expired waiting on queue '{queue}'")]
    TimedOut { queue: String },

    #[error("failed to send on queue '{queue}': {source}")]
    Send {
        queue: String,
        #[source]
        source: NixErrnoError,
    },

    #[error("failed to receive from queue '{queue}': {source}")]
    Receive {
        queue: String,
        #[source]
        source: NixErrnoError,
    },

    #[error("failed to open queue '{queue}': {source}")]
    Open {
        queue: String,
        #[source]
        source: NixErrnoError,
    },

    #[error("queue '{queue}' attributes do not match requested configuration")]
    AttributeMismatch { queue: String },

    #[error("failed to query attributes of queue '{queue}': {source}")]
    GetAttr {
        queue: String,
        #[source]
        source: NixErrnoError,
    },

    #[error("peer queue '{queue}' is not ready yet")]
    PeerNotReady { queue: String },
}

impl TransportError {
    /// Folds a transport-level failure into the coarse [`Status`] taxonomy.
    pub fn status(&self) -> Status {
        match self {
            TransportError::TimedOut { .. } => Status::Timeout,
            TransportError::Send { .. } | TransportError::Receive { .. } => {
                Status::TransmissionError
            }
            TransportError::Open { .. }
            | TransportError::AttributeMismatch { .. }
            | TransportError::GetAttr { .. }
            | TransportError::PeerNotReady { .. } => Status::GeneralError,
        }
    }
}

/// Thin wrapper around `nix::errno::Errno` so `TransportError` does not need
/// to depend on `nix` on non-Linux targets where the transport is absent.
#[derive(Debug)]
pub struct NixErrnoError(pub String);

impl std::fmt::Display for NixErrnoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NixErrnoError {}

#[cfg(target_os = "linux")]
impl From<nix::errno::Errno> for NixErrnoError {
    fn from(e: nix::errno::Errno) -> Self {
        NixErrnoError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip() {
        for code in 0..=9u32 {
            let status = Status::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
    }

    #[test]
    fn out_of_range_code_rejected() {
        assert!(Status::from_code(10).is_none());
        assert!(Status::from_code(u32::MAX).is_none());
    }

    #[test]
    fn display_status_truncates_and_null_terminates() {
        let mut buf = [0xFFu8; 5];
        let code = Status::StatusCodeEnd.code();
        display_status(code, &mut buf).unwrap();
        assert_eq!(buf[4], 0);
    }

    #[test]
    fn display_status_null_terminates_with_ample_space() {
        let mut buf = vec![0xFFu8; MAX_STATUS_MSG_LEN + 1];
        let code = Status::StatusCodeEnd.code();
        display_status(code, &mut buf).unwrap();
        assert!(buf.contains(&0));
    }

    #[test]
    fn display_status_out_of_range_returns_none() {
        let mut buf = [0u8; 16];
        assert!(display_status(Status::StatusCodeEnd.code() + 1, &mut buf).is_none());
        assert!(display_status(10_000, &mut buf).is_none());
    }
}
