//! Events and commands processed by a session.

use bytes::Bytes;

use crate::message::{HttpResponse, RequestHead};
use crate::net::DownstreamPool;
use crate::session::correlator::ExchangeId;
use crate::session::SessionError;

/// Protocol events delivered by the transport, in arrival order.
#[derive(Debug)]
pub enum TransportEvent {
    /// Request line and headers; body chunks follow.
    Head(RequestHead),
    /// Head and complete body in one event.
    FullMessage(RequestHead, Bytes),
    BodyChunk(Bytes),
    /// Final chunk of the current request (may be empty).
    LastChunk(Bytes),
    IdleTimeout,
    TransportError(String),
    ConnectionClose,
}

impl TransportEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TransportEvent::Head(_) => "head",
            TransportEvent::FullMessage(..) => "full_message",
            TransportEvent::BodyChunk(_) => "body_chunk",
            TransportEvent::LastChunk(_) => "last_chunk",
            TransportEvent::IdleTimeout => "idle_timeout",
            TransportEvent::TransportError(_) => "transport_error",
            TransportEvent::ConnectionClose => "connection_close",
        }
    }
}

/// Everything that runs on a connection's task queue.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    Event(TransportEvent),
    Respond {
        exchange: ExchangeId,
        response: HttpResponse,
    },
    AttachPool {
        key: String,
        pool: Box<dyn DownstreamPool>,
    },
}

/// Why a session reached `Closed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer or the transport ended the connection.
    ConnectionClosed,
    IdleTimeout,
    /// The session closed itself after an error.
    Error(SessionError),
}

impl CloseReason {
    pub fn label(&self) -> &'static str {
        match self {
            CloseReason::ConnectionClosed => "connection_closed",
            CloseReason::IdleTimeout => "idle_timeout",
            CloseReason::Error(e) => e.kind(),
        }
    }
}
