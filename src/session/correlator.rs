//! Delivery of asynchronous processor results back to their connection.
//!
//! # Responsibilities
//! - Route every write through the connection's own command queue
//! - Allow at most one response per exchange
//! - Keep responses in request order on pipelined connections
//!
//! # Design Decisions
//! - `complete` consumes the correlator, so a second completion cannot compile
//! - A closed queue means a closed connection; completing is then a no-op
//! - Early responses are parked until every earlier exchange is answered

use std::collections::{HashMap, VecDeque};

use tokio::sync::mpsc;

use crate::message::HttpResponse;
use crate::net::{ConnectionId, DownstreamPool};
use crate::session::event::{SessionCommand, TransportEvent};

/// Position of an exchange on its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExchangeId(u64);

impl ExchangeId {
    pub(crate) fn new(seq: u64) -> Self {
        Self(seq)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ex-{}", self.0)
    }
}

/// Cloneable sender half of a connection's command queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl ConnectionHandle {
    pub(crate) fn new(id: ConnectionId, tx: mpsc::UnboundedSender<SessionCommand>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a transport event. Returns false once the session is gone.
    pub fn send(&self, event: TransportEvent) -> bool {
        self.tx.send(SessionCommand::Event(event)).is_ok()
    }

    /// Hand a downstream pool to the session so it is closed with the connection.
    ///
    /// If the session is already gone the pool is closed right here.
    pub fn attach_pool(&self, key: impl Into<String>, pool: Box<dyn DownstreamPool>) {
        let command = SessionCommand::AttachPool {
            key: key.into(),
            pool,
        };
        if let Err(mpsc::error::SendError(command)) = self.tx.send(command) {
            if let SessionCommand::AttachPool { key, mut pool } = command {
                tracing::debug!(connection_id = %self.id, pool = %key, "Session gone, closing pool");
                if let Err(e) = pool.close() {
                    tracing::error!(pool = %key, error = %e, "Couldn't close downstream pool");
                }
            }
        }
    }

    /// True once the session task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub(crate) fn respond(&self, exchange: ExchangeId, response: HttpResponse) -> bool {
        self.tx
            .send(SessionCommand::Respond { exchange, response })
            .is_ok()
    }
}

/// Reply path for one exchange. Safe to move to any thread.
#[derive(Debug)]
pub struct ResponseCorrelator {
    connection: ConnectionHandle,
    exchange: ExchangeId,
}

impl ResponseCorrelator {
    pub(crate) fn new(connection: ConnectionHandle, exchange: ExchangeId) -> Self {
        Self {
            connection,
            exchange,
        }
    }

    pub fn exchange(&self) -> ExchangeId {
        self.exchange
    }

    /// The connection this exchange belongs to.
    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    /// Deliver the response. Silently dropped if the connection has closed.
    pub fn complete(self, response: HttpResponse) {
        if !self.connection.respond(self.exchange, response) {
            tracing::trace!(
                connection_id = %self.connection.id(),
                exchange = %self.exchange,
                "Connection closed before response, dropping it"
            );
        }
    }
}

/// Orders writes by exchange.
#[derive(Debug, Default)]
pub(crate) struct ResponseSequencer {
    pending: VecDeque<ExchangeId>,
    ready: HashMap<ExchangeId, HttpResponse>,
}

impl ResponseSequencer {
    /// Register an exchange that will need a response.
    pub(crate) fn expect(&mut self, exchange: ExchangeId) {
        self.pending.push_back(exchange);
    }

    /// Accept a response and return every response that can now be written,
    /// in order. Unknown or repeated exchanges are ignored.
    pub(crate) fn complete(&mut self, exchange: ExchangeId, response: HttpResponse) -> Vec<HttpResponse> {
        if !self.pending.contains(&exchange) || self.ready.contains_key(&exchange) {
            tracing::warn!(exchange = %exchange, "Ignoring response for unknown or answered exchange");
            return Vec::new();
        }
        self.ready.insert(exchange, response);

        let mut writable = Vec::new();
        while let Some(front) = self.pending.front() {
            match self.ready.remove(front) {
                Some(response) => {
                    writable.push(response);
                    self.pending.pop_front();
                }
                None => break,
            }
        }
        writable
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    fn response(status: u16) -> HttpResponse {
        HttpResponse::new(StatusCode::from_u16(status).unwrap())
    }

    #[test]
    fn out_of_order_completions_are_written_in_order() {
        let mut seq = ResponseSequencer::default();
        let (a, b, c) = (ExchangeId::new(1), ExchangeId::new(2), ExchangeId::new(3));
        seq.expect(a);
        seq.expect(b);
        seq.expect(c);

        assert!(seq.complete(c, response(203)).is_empty());
        assert!(seq.complete(b, response(202)).is_empty());

        let written: Vec<_> = seq
            .complete(a, response(201))
            .into_iter()
            .map(|r| r.status.as_u16())
            .collect();
        assert_eq!(written, vec![201, 202, 203]);
        assert_eq!(seq.pending_len(), 0);
    }

    #[test]
    fn repeated_and_unknown_completions_are_ignored() {
        let mut seq = ResponseSequencer::default();
        let a = ExchangeId::new(1);
        seq.expect(a);

        assert_eq!(seq.complete(a, response(200)).len(), 1);
        assert!(seq.complete(a, response(500)).is_empty());
        assert!(seq.complete(ExchangeId::new(9), response(200)).is_empty());
    }

    #[test]
    fn complete_after_queue_closed_is_a_no_op() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle::new(ConnectionId::new(), tx);
        let correlator = ResponseCorrelator::new(handle.clone(), ExchangeId::new(1));

        drop(rx);
        assert!(handle.is_closed());
        correlator.complete(response(200));
    }
}
