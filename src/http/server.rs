//! HTTP/1 transport driver.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Open a session per connection and run it on its own task
//! - Serve the socket with hyper, feeding requests to the session as events
//! - Stop accepting on shutdown
//!
//! # Design Decisions
//! - The session can abort the hyper connection (idle timeout, protocol
//!   error); the driver then reports nothing further
//! - hyper's connection error becomes `TransportError`, a clean end
//!   becomes `ConnectionClose`

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::config::TimeoutConfig;
use crate::http::channel::HyperChannel;
use crate::http::request::handle_request;
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::net::ConnectionId;
use crate::session::{Session, SessionContext, TransportEvent};

/// Error type for the server loop.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Inbound HTTP server for one listener.
pub struct HttpServer {
    context: Arc<SessionContext>,
    idle_timeout: Option<Duration>,
}

impl HttpServer {
    pub fn new(context: Arc<SessionContext>, timeouts: &TimeoutConfig) -> Self {
        let idle_timeout = match timeouts.idle_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        Self {
            context,
            idle_timeout,
        }
    }

    pub fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    /// Accept connections until shutdown is signalled.
    ///
    /// Connections already open keep running; callers wait for them through
    /// the connection registry.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            listener = %self.context.listener().id,
            "HTTP server starting"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let context = Arc::clone(&self.context);
                        let idle_timeout = self.idle_timeout;
                        tokio::spawn(serve_connection(stream, peer, permit, context, idle_timeout));
                    }
                    Err(ListenerError::Accept(e)) => {
                        tracing::error!(error = %e, "Error accepting connection");
                    }
                    Err(e) => return Err(e.into()),
                },
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, stopping accept loop");
                    break;
                }
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    permit: ConnectionPermit,
    context: Arc<SessionContext>,
    idle_timeout: Option<Duration>,
) {
    let id = ConnectionId::new();
    let local = stream.local_addr().ok();
    let (responder_tx, responder_rx) = mpsc::unbounded_channel();
    let (abort_tx, abort_rx) = oneshot::channel();

    let channel = HyperChannel::new(id, Some(peer), local, responder_rx, abort_tx);
    let (session, events) = Session::open(channel, context);
    let session_task = tokio::spawn(session.run(idle_timeout));

    let service_events = events.clone();
    let service = service_fn(move |request| {
        handle_request(request, service_events.clone(), responder_tx.clone())
    });

    let connection = http1::Builder::new()
        .timer(TokioTimer::new())
        .serve_connection(TokioIo::new(stream), service)
        .with_upgrades();

    tokio::select! {
        result = connection => match result {
            Ok(()) => {
                events.send(TransportEvent::ConnectionClose);
            }
            Err(e) => {
                events.send(TransportEvent::TransportError(e.to_string()));
            }
        },
        _ = abort_rx => {
            tracing::debug!(connection_id = %id, peer = %peer, "Connection aborted by session");
        }
    }

    match session_task.await {
        Ok(reason) => tracing::debug!(connection_id = %id, reason = reason.label(), "Connection finished"),
        Err(e) => tracing::error!(connection_id = %id, error = %e, "Session task failed"),
    }
    drop(permit);
}
