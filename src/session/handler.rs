//! Per-connection state machine.
//!
//! # Responsibilities
//! - Turn transport events into message models and hand them off
//! - Route upgrade requests to the upgrade handler
//! - Write processor responses back in request order
//! - Tear the connection down exactly once, whatever triggered it
//!
//! # States
//! ```text
//! Idle ──head──► HeadReceived ──last chunk──► Completed ──head──► HeadReceived
//!  │                                                        ...
//!  └──head (upgrade)──► Upgraded
//! any ──idle timeout / close / error──► Closed
//! ```
//!
//! # Design Decisions
//! - One task owns the session; every input arrives through its command queue
//! - `Completed` returns to `Idle` when the next head arrives
//! - Nothing escapes `handle_event`; the terminal cause is kept in
//!   `close_reason`

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::dispatch::Admission;
use crate::message::properties::{keys, PROTOCOL_NAME};
use crate::message::{version_str, HttpMessage, HttpResponse, Properties, RequestHead};
use crate::net::{ConnectionId, ConnectionInfo, PoolRegistry};
use crate::observability::metrics;
use crate::session::assembler::MessageAssembler;
use crate::session::correlator::{ConnectionHandle, ExchangeId, ResponseCorrelator, ResponseSequencer};
use crate::session::event::{CloseReason, SessionCommand, TransportEvent};
use crate::session::{Channel, SessionContext, SessionError};
use crate::upgrade::{UpgradeContext, UpgradeDecision};

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    HeadReceived,
    Completed,
    Upgraded,
    Closed,
}

/// Orchestrates one inbound connection.
pub struct Session<C: Channel> {
    id: ConnectionId,
    channel: C,
    context: Arc<SessionContext>,
    state: SessionState,
    assembler: MessageAssembler,
    sequencer: ResponseSequencer,
    pools: PoolRegistry,
    handle: ConnectionHandle,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    next_exchange: u64,
    close_reason: Option<CloseReason>,
}

impl<C: Channel> Session<C> {
    /// Open a session on an established connection.
    ///
    /// Registers the connection and fires the open hook. The returned handle
    /// feeds transport events into the session's queue.
    pub fn open(channel: C, context: Arc<SessionContext>) -> (Self, ConnectionHandle) {
        let id = channel.id();
        let (tx, commands) = mpsc::unbounded_channel();
        let handle = ConnectionHandle::new(id, tx);

        let info = ConnectionInfo::new(id, context.listener().id.clone())
            .with_addrs(channel.peer_addr(), channel.local_addr());
        context.connections().register(info.clone());
        context.hooks().at_connection_open(&info);
        metrics::record_connection_opened();

        let session = Self {
            id,
            channel,
            context,
            state: SessionState::Idle,
            assembler: MessageAssembler::new(),
            sequencer: ResponseSequencer::default(),
            pools: PoolRegistry::new(),
            handle: handle.clone(),
            commands,
            next_exchange: 0,
            close_reason: None,
        };
        (session, handle)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn close_reason(&self) -> Option<&CloseReason> {
        self.close_reason.as_ref()
    }

    pub fn pools(&self) -> &PoolRegistry {
        &self.pools
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn connection_handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    /// Exchanges dispatched but not yet written.
    pub fn pending_responses(&self) -> usize {
        self.sequencer.pending_len()
    }

    /// Process queued commands until the queue is empty or the session closes.
    /// Returns how many were processed.
    pub fn drain_queue(&mut self) -> usize {
        let mut processed = 0;
        while self.state != SessionState::Closed {
            match self.commands.try_recv() {
                Ok(command) => {
                    self.handle_command(command);
                    processed += 1;
                }
                Err(_) => break,
            }
        }
        processed
    }

    /// Drive the session until it closes.
    ///
    /// Any command resets the idle timer. `None` disables the timeout.
    pub async fn run(mut self, idle_timeout: Option<Duration>) -> CloseReason {
        while self.state != SessionState::Closed {
            let next = match idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, self.commands.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        self.handle_event(TransportEvent::IdleTimeout);
                        continue;
                    }
                },
                None => self.commands.recv().await,
            };

            match next {
                Some(command) => self.handle_command(command),
                None => self.close(CloseReason::ConnectionClosed),
            }
        }
        self.close_reason
            .clone()
            .unwrap_or(CloseReason::ConnectionClosed)
    }

    pub(crate) fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Event(event) => self.handle_event(event),
            SessionCommand::Respond { exchange, response } => self.respond(exchange, response),
            SessionCommand::AttachPool { key, pool } => {
                if let Err(mut pool) = self.pools.insert(key.clone(), pool) {
                    tracing::warn!(connection_id = %self.id, pool = %key, "Pool rejected, closing it");
                    if let Err(e) = pool.close() {
                        tracing::error!(pool = %key, error = %e, "Couldn't close downstream pool");
                    }
                }
            }
        }
    }

    /// Apply one transport event.
    pub fn handle_event(&mut self, event: TransportEvent) {
        if self.state == SessionState::Closed {
            tracing::trace!(connection_id = %self.id, event = event.name(), "Event after close ignored");
            return;
        }

        match event {
            TransportEvent::IdleTimeout => {
                tracing::debug!(connection_id = %self.id, "Idle timeout");
                self.close(CloseReason::IdleTimeout);
            }
            TransportEvent::ConnectionClose => self.close(CloseReason::ConnectionClosed),
            TransportEvent::TransportError(cause) => self.on_transport_error(cause),
            event if self.state == SessionState::Upgraded => {
                tracing::trace!(connection_id = %self.id, event = event.name(), "Upgraded, ignoring HTTP event");
            }
            TransportEvent::Head(head) => self.on_head(head),
            TransportEvent::FullMessage(head, body) => {
                self.on_head(head);
                if self.state == SessionState::HeadReceived {
                    self.on_last_chunk(body);
                }
            }
            TransportEvent::BodyChunk(chunk) => self.on_body_chunk(chunk),
            TransportEvent::LastChunk(chunk) => self.on_last_chunk(chunk),
        }
    }

    fn on_head(&mut self, head: RequestHead) {
        if self.state == SessionState::HeadReceived {
            return self.fail(SessionError::ProtocolSequence);
        }
        self.state = SessionState::Idle;

        if let UpgradeDecision::WebSocketUpgrade(upgrade) = self.context.negotiator().evaluate(&head) {
            // The switch response can't be ordered behind unanswered exchanges.
            if self.sequencer.pending_len() > 0 {
                tracing::warn!(
                    connection_id = %self.id,
                    pending = self.sequencer.pending_len(),
                    "Upgrade requested with responses outstanding"
                );
                return self.fail(SessionError::ProtocolSequence);
            }
            return self.upgrade(head, upgrade);
        }

        let exchange = self.next_exchange_id();
        let properties = self.message_properties(&head);
        let message = match self.assembler.on_head(&head, exchange, properties) {
            Ok(message) => message,
            Err(e) => return self.fail(e),
        };
        self.state = SessionState::HeadReceived;
        self.sequencer.expect(exchange);
        metrics::record_request(head.method.as_str());
        self.context.hooks().at_request_received(self.id, &message);

        let correlator = ResponseCorrelator::new(self.handle.clone(), exchange);
        let correlator = match self.context.gate() {
            Some(gate) => match gate.admit(&message, correlator) {
                Admission::Forward(correlator) => correlator,
                Admission::ShortCircuit => {
                    tracing::debug!(connection_id = %self.id, exchange = %exchange, "Short-circuited by dispatch gate");
                    metrics::record_short_circuit();
                    return;
                }
            },
            None => correlator,
        };

        self.dispatch(message, correlator);
    }

    fn upgrade(&mut self, head: RequestHead, upgrade: UpgradeContext) {
        let Some(handler) = self.context.upgrade_handler().cloned() else {
            tracing::warn!(connection_id = %self.id, uri = %head.uri, "Upgrade requested but no handler installed");
            return self.fail(SessionError::UpgradeUnavailable);
        };

        tracing::debug!(
            connection_id = %self.id,
            uri = %upgrade.target_uri,
            sub_protocol = ?upgrade.sub_protocol,
            "Upgrading connection to WebSocket"
        );
        self.state = SessionState::Upgraded;
        metrics::record_upgrade();
        handler.init_upgrade(head, upgrade, &mut self.channel);
    }

    fn dispatch(&mut self, message: HttpMessage, correlator: ResponseCorrelator) {
        let processor_id = &self.context.listener().message_processor_id;
        let Some(processor) = self.context.processors().get(processor_id) else {
            let err = SessionError::ProcessorUnavailable(processor_id.clone());
            tracing::error!(
                connection_id = %self.id,
                exchange = %correlator.exchange(),
                error = %err,
                "Dropping exchange"
            );
            metrics::record_processor_unavailable();
            return;
        };

        let exchange = correlator.exchange();
        if let Err(e) = processor.receive(message, correlator) {
            tracing::error!(
                connection_id = %self.id,
                exchange = %exchange,
                processor = %processor_id,
                error = %e,
                "Processor refused message, dropping exchange"
            );
        }
    }

    fn on_body_chunk(&mut self, chunk: Bytes) {
        if self.state != SessionState::HeadReceived {
            return self.fail(SessionError::NoActiveMessage);
        }
        if let Err(e) = self.assembler.on_body_chunk(chunk) {
            self.fail(e);
        }
    }

    fn on_last_chunk(&mut self, chunk: Bytes) {
        if self.state != SessionState::HeadReceived {
            return self.fail(SessionError::NoActiveMessage);
        }
        match self.assembler.on_last_chunk(chunk) {
            Ok(record) => {
                self.state = SessionState::Completed;
                metrics::record_request_completed(record.body_len);
                self.context.hooks().at_request_fully_received(self.id, &record);
            }
            Err(e) => self.fail(e),
        }
    }

    fn on_transport_error(&mut self, cause: String) {
        tracing::warn!(connection_id = %self.id, error = %cause, "Transport error, closing connection");
        if self.channel.is_active() {
            self.channel.write_empty();
        }
        self.close(CloseReason::Error(SessionError::Transport(cause)));
    }

    fn respond(&mut self, exchange: ExchangeId, response: HttpResponse) {
        match self.state {
            SessionState::Closed => {
                tracing::trace!(connection_id = %self.id, exchange = %exchange, "Closed, dropping response");
                return;
            }
            SessionState::Upgraded => {
                tracing::debug!(connection_id = %self.id, exchange = %exchange, "Upgraded, dropping HTTP response");
                return;
            }
            _ => {}
        }

        for response in self.sequencer.complete(exchange, response) {
            if let Err(e) = self.channel.write(response) {
                tracing::debug!(connection_id = %self.id, exchange = %exchange, error = %e, "Response write failed");
            }
        }
    }

    fn fail(&mut self, err: SessionError) {
        tracing::warn!(connection_id = %self.id, state = ?self.state, error = %err, "Closing connection");
        metrics::record_protocol_error(err.kind());
        self.close(CloseReason::Error(err));
    }

    /// Tear the connection down. Only the first call has any effect.
    pub fn close(&mut self, reason: CloseReason) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        self.commands.close();
        self.channel.close();

        if let Some(record) = self.assembler.abort() {
            tracing::debug!(connection_id = %self.id, exchange = %record.id, "Aborted open exchange");
        }
        self.context.hooks().at_connection_close(self.id, &reason);

        let report = self.pools.drain();
        self.discard_queued();
        metrics::record_pool_drain(report.closed, report.failed);

        self.context.connections().notify_connection_closed(self.id);
        metrics::record_connection_closed(reason.label());
        tracing::debug!(
            connection_id = %self.id,
            reason = reason.label(),
            pools_closed = report.closed,
            pools_failed = report.failed,
            "Session closed"
        );
        self.close_reason = Some(reason);
    }

    /// Close pools that were attached after teardown began and drop the rest.
    fn discard_queued(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            if let SessionCommand::AttachPool { key, mut pool } = command {
                if let Err(e) = pool.close() {
                    tracing::error!(pool = %key, error = %e, "Couldn't close downstream pool");
                }
            }
        }
    }

    fn next_exchange_id(&mut self) -> ExchangeId {
        self.next_exchange += 1;
        ExchangeId::new(self.next_exchange)
    }

    fn message_properties(&self, head: &RequestHead) -> Properties {
        let listener = self.context.listener();
        let request_id = head
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut properties = Properties::new();
        properties.insert(keys::CONNECTION_ID, self.id.to_string());
        properties.insert(keys::REQUEST_ID, request_id);
        properties.insert(keys::LISTENER_ID, listener.id.as_str());
        properties.insert(keys::SECURED, listener.is_secured());
        properties.insert(keys::PROTOCOL, PROTOCOL_NAME);
        properties.insert(keys::PROCESSOR_ID, listener.message_processor_id.as_str());
        properties.insert(keys::HTTP_VERSION, version_str(head.version));
        properties.insert(keys::HTTP_METHOD, head.method.as_str());
        properties.insert(keys::REQUEST_URL, head.uri.to_string());
        properties.insert(keys::TO, head.uri.to_string());
        if let Some(local) = self.channel.local_addr() {
            properties.insert(keys::LISTENER_PORT, local.port());
            properties.insert(keys::LOCAL_ADDRESS, local);
        }
        if let Some(peer) = self.channel.peer_addr() {
            properties.insert(keys::REMOTE_ADDRESS, peer);
        }
        properties
    }
}

impl<C: Channel> Drop for Session<C> {
    fn drop(&mut self) {
        if self.state != SessionState::Closed {
            self.close(CloseReason::ConnectionClosed);
        }
    }
}
