//! Channel endpoints: point-to-point queues connecting exactly two ports,
//! as opposed to the connectionless per-endpoint receive queues in
//! [`crate::endpoint`].
//!
//! A channel has one underlying queue. The receiving side creates it
//! exclusively (`open_recv`); the sending side opens the existing queue
//! without creating it (`open_send`), silently reporting "not ready yet"
//! rather than failing hard when the receiving side has not opened its end.

use std::sync::Mutex;

use nix::mqueue::MqdT;

use crate::error::Status;
use crate::limits::{MAX_MESSAGE_SIZE, MAX_PACKET_SIZE, MAX_PORT, MAX_QUEUE_ELEMENTS};
use crate::naming::channel_queue_name;
use crate::transport::{self, Timeout};

/// The three channel flavors the API distinguishes, each with a different
/// message size ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    /// Variable-length packets up to [`MAX_PACKET_SIZE`].
    Packet,
    /// Variable-length messages up to [`MAX_MESSAGE_SIZE`].
    Message,
    /// Fixed-size scalar values. Conventionally 1, 2, 4, or 8 bytes; other
    /// sizes are accepted but logged, matching the original implementation's
    /// non-fatal warning.
    Scalar(u8),
}

impl ChannelType {
    fn max_msg_size(self) -> i64 {
        match self {
            ChannelType::Packet => MAX_PACKET_SIZE,
            ChannelType::Message => MAX_MESSAGE_SIZE,
            ChannelType::Scalar(size) => {
                if ![1u8, 2, 4, 8].contains(&size) {
                    tracing::warn!(size, "scalar channel size is not a conventional power of two");
                }
                size as i64
            }
        }
    }
}

/// The receiving side of a channel: owns the queue, unlinks it on close.
pub struct Channel {
    mqd: MqdT,
    queue_name: String,
    channel_type: ChannelType,
}

impl Channel {
    pub fn channel_type(&self) -> ChannelType {
        self.channel_type
    }

    pub fn recv(&self, buf: &mut [u8], timeout: Timeout) -> Result<usize, Status> {
        transport::recv(&self.mqd, &self.queue_name, buf, timeout).map_err(|e| e.status())
    }

    pub fn available(&self) -> Result<i64, Status> {
        transport::available(&self.mqd, &self.queue_name).map_err(|e| e.status())
    }

    pub fn close(self) {
        transport::drain(&self.mqd, &self.queue_name);
        transport::close(self.mqd, &self.queue_name, true);
    }
}

/// The sending side of a channel: never creates or unlinks the queue.
pub struct RemoteChannel {
    mqd: MqdT,
    queue_name: String,
}

impl RemoteChannel {
    pub fn send(&self, payload: &[u8], timeout: Timeout) -> Result<(), Status> {
        transport::send(&self.mqd, &self.queue_name, payload, timeout).map_err(|e| e.status())
    }

    pub fn close(self, unlink: bool) {
        transport::close(self.mqd, &self.queue_name, unlink);
    }
}

/// Creates the receive side of a channel at `(domain, node, port)`.
///
/// Uses `O_CREAT | O_RDWR | O_EXCL`: unlike a connectionless endpoint, a
/// channel queue left over from a prior, improperly closed channel must not
/// be silently reused, since its contents would be delivered to the wrong
/// logical connection.
pub fn open_recv(
    domain: u32,
    node: u32,
    port: u32,
    channel_type: ChannelType,
) -> Result<Channel, Status> {
    let queue_name = channel_queue_name(domain, node, port);
    let mqd = transport::create_queue_exclusive(
        &queue_name,
        channel_type.max_msg_size(),
        MAX_QUEUE_ELEMENTS,
    )
    .map_err(|e| e.status())?;

    Ok(Channel {
        mqd,
        queue_name,
        channel_type,
    })
}

/// Opens the sending side of a channel at `(domain, node, port)`.
///
/// Returns `Ok(None)` rather than an error when the receiving side has not
/// created the queue yet, mirroring `pmq_open_chan_send`'s treatment of
/// `ENOENT` as "not ready", not "broken". Callers loop on `Ok(None)`
/// themselves if they want to wait; unlike endpoint lookup this call never
/// blocks on its own.
pub fn open_send(domain: u32, node: u32, port: u32) -> Result<Option<RemoteChannel>, Status> {
    let queue_name = channel_queue_name(domain, node, port);
    match transport::try_open_existing_for_send(&queue_name) {
        Ok(Some(mqd)) => Ok(Some(RemoteChannel { mqd, queue_name })),
        Ok(None) => Ok(None),
        Err(e) => Err(e.status()),
    }
}

/// Node-wide table of open channels, so [`crate::node::finalize`] has
/// something to walk when closing out channels a caller left open.
///
/// Receive-side channels are keyed by the local port that created them, the
/// same scheme [`crate::endpoint::EndpointTable`] uses. Send-side channels
/// are not addressed by a local port at all (they name a *remote*
/// `(domain, node, port)`), so they are kept in a separate, freely indexed
/// slot list.
pub struct ChannelTable {
    recv: Mutex<Vec<Option<Channel>>>,
    send: Mutex<Vec<Option<RemoteChannel>>>,
}

impl ChannelTable {
    pub fn new() -> Self {
        let mut recv = Vec::with_capacity(MAX_PORT);
        recv.resize_with(MAX_PORT, || None);
        ChannelTable {
            recv: Mutex::new(recv),
            send: Mutex::new(Vec::new()),
        }
    }

    /// Creates the receive side of a channel on `port` and files it in the
    /// table.
    pub fn create_recv(
        &self,
        domain: u32,
        node: u32,
        port: u32,
        channel_type: ChannelType,
    ) -> Result<(), Status> {
        let port_index = port as usize;
        if port_index >= MAX_PORT {
            return Err(Status::ParameterError);
        }
        let mut recv = self.recv.lock().expect("channel table mutex poisoned");
        if recv[port_index].is_some() {
            return Err(Status::GeneralError);
        }
        recv[port_index] = Some(open_recv(domain, node, port, channel_type)?);
        Ok(())
    }

    /// Opens the send side of a channel at `(domain, node, port)`, filing it
    /// under a freely allocated slot index. Returns `Ok(None)` if the
    /// receiving side is not ready yet.
    pub fn open_send(&self, domain: u32, node: u32, port: u32) -> Result<Option<usize>, Status> {
        let Some(channel) = open_send(domain, node, port)? else {
            return Ok(None);
        };
        let mut send = self.send.lock().expect("channel table mutex poisoned");
        for (index, slot) in send.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(channel);
                return Ok(Some(index));
            }
        }
        send.push(Some(channel));
        Ok(Some(send.len() - 1))
    }

    pub fn with_recv<R>(&self, port: u32, f: impl FnOnce(&Channel) -> R) -> Option<R> {
        let recv = self.recv.lock().expect("channel table mutex poisoned");
        recv.get(port as usize)?.as_ref().map(f)
    }

    pub fn with_send<R>(&self, index: usize, f: impl FnOnce(&RemoteChannel) -> R) -> Option<R> {
        let send = self.send.lock().expect("channel table mutex poisoned");
        send.get(index)?.as_ref().map(f)
    }

    /// Removes and closes the receive-side channel on `port`, unlinking its
    /// queue.
    pub fn close_recv(&self, port: u32) -> Result<(), Status> {
        let port_index = port as usize;
        if port_index >= MAX_PORT {
            return Err(Status::ParameterError);
        }
        let mut recv = self.recv.lock().expect("channel table mutex poisoned");
        let channel = recv[port_index].take().ok_or(Status::ParameterError)?;
        channel.close();
        Ok(())
    }

    /// Removes and closes the send-side channel at `index`.
    pub fn close_send(&self, index: usize, unlink: bool) -> Result<(), Status> {
        let mut send = self.send.lock().expect("channel table mutex poisoned");
        let channel = send.get_mut(index).and_then(Option::take).ok_or(Status::ParameterError)?;
        channel.close(unlink);
        Ok(())
    }

    /// Closes every still-open channel, unlinking the receive-side queues
    /// this node created. Called from [`crate::node::finalize`] so a caller
    /// that forgot to close a channel does not leak its queue.
    pub fn teardown_all(&self) {
        let mut recv = self.recv.lock().expect("channel table mutex poisoned");
        for slot in recv.iter_mut() {
            if let Some(channel) = slot.take() {
                channel.close();
            }
        }

        let mut send = self.send.lock().expect("channel table mutex poisoned");
        for slot in send.iter_mut() {
            if let Some(channel) = slot.take() {
                channel.close(false);
            }
        }
    }
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_channel_size_exceeds_message_channel_size() {
        assert!(ChannelType::Packet.max_msg_size() > ChannelType::Message.max_msg_size());
    }

    #[test]
    fn scalar_channel_size_matches_requested_width() {
        assert_eq!(ChannelType::Scalar(4).max_msg_size(), 4);
        assert_eq!(ChannelType::Scalar(8).max_msg_size(), 8);
    }

    #[test]
    fn odd_scalar_size_is_still_accepted() {
        assert_eq!(ChannelType::Scalar(3).max_msg_size(), 3);
    }

    #[test]
    fn close_recv_on_empty_port_is_an_error() {
        let table = ChannelTable::new();
        assert_eq!(table.close_recv(1), Err(Status::ParameterError));
    }

    #[test]
    fn close_send_on_empty_slot_is_an_error() {
        let table = ChannelTable::new();
        assert_eq!(table.close_send(0, false), Err(Status::ParameterError));
    }

    #[test]
    fn teardown_all_on_an_empty_table_is_a_no_op() {
        let table = ChannelTable::new();
        table.teardown_all();
    }
}
