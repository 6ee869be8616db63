//! Connection lifecycle observers.
//!
//! Hooks observe; they never change control flow. Every method defaults to a
//! no-op so implementors override only what they need.

use crate::message::HttpMessage;
use crate::net::{ConnectionId, ConnectionInfo};
use crate::session::{CloseReason, ExchangeRecord};

pub trait ConnectionHooks: Send + Sync {
    fn at_connection_open(&self, _info: &ConnectionInfo) {}

    fn at_request_received(&self, _connection: ConnectionId, _message: &HttpMessage) {}

    fn at_request_fully_received(&self, _connection: ConnectionId, _record: &ExchangeRecord) {}

    fn at_connection_close(&self, _connection: ConnectionId, _reason: &CloseReason) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl ConnectionHooks for NoopHooks {}

/// Emits a debug event at every lifecycle point.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHooks;

impl ConnectionHooks for TracingHooks {
    fn at_connection_open(&self, info: &ConnectionInfo) {
        tracing::debug!(
            connection_id = %info.id,
            listener = %info.listener_id,
            peer = ?info.peer_addr,
            "Connection opened"
        );
    }

    fn at_request_received(&self, connection: ConnectionId, message: &HttpMessage) {
        tracing::debug!(
            connection_id = %connection,
            method = %message.method(),
            uri = %message.uri(),
            "Request head received"
        );
    }

    fn at_request_fully_received(&self, connection: ConnectionId, record: &ExchangeRecord) {
        tracing::debug!(
            connection_id = %connection,
            exchange = %record.id,
            chunks = record.chunk_count,
            bytes = record.body_len,
            "Request fully received"
        );
    }

    fn at_connection_close(&self, connection: ConnectionId, reason: &CloseReason) {
        tracing::debug!(connection_id = %connection, reason = reason.label(), "Connection closed");
    }
}
