//! Write side of an inbound connection.

use std::net::SocketAddr;

use crate::message::HttpResponse;
use crate::net::ConnectionId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,
    #[error("no pending exchange to answer")]
    NoPendingExchange,
}

/// Handle to the transport connection a session writes to.
///
/// Only the owning session calls these methods, always from the connection's
/// own task, so implementations need no synchronization.
pub trait Channel: Send {
    fn id(&self) -> ConnectionId;

    fn is_active(&self) -> bool;

    /// Write a response for the oldest unanswered request.
    fn write(&mut self, response: HttpResponse) -> Result<(), ChannelError>;

    /// Best-effort flush of an empty buffer, issued before closing on a
    /// transport error.
    fn write_empty(&mut self);

    /// Close the connection. Must be safe to call more than once.
    fn close(&mut self);

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}
