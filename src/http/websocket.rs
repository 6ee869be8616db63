//! WebSocket upgrade handler.
//!
//! # Responsibilities
//! - Complete the server side of the WebSocket handshake
//! - Take over the upgraded socket and echo text and binary frames
//!
//! # Data Flow
//! ```text
//! Session (Upgraded) → init_upgrade → 101 Switching Protocols
//!     → hyper hands the socket over (OnUpgrade)
//!     → tokio-tungstenite server stream, echo loop
//! ```
//!
//! # Design Decisions
//! - The session ends when hyper releases the socket; the echo task owns it
//!   from then on
//! - Ping/pong is answered by tungstenite itself

use futures_util::{SinkExt, StreamExt};
use http::header::SEC_WEBSOCKET_KEY;
use http::StatusCode;
use hyper::upgrade::{OnUpgrade, Upgraded};
use hyper_util::rt::TokioIo;
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::message::{HttpResponse, RequestHead};
use crate::net::ConnectionId;
use crate::session::Channel;
use crate::upgrade::{UpgradeContext, UpgradeHandler};

#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketEcho;

impl WebSocketEcho {
    pub fn new() -> Self {
        Self
    }
}

impl UpgradeHandler for WebSocketEcho {
    fn init_upgrade(&self, mut head: RequestHead, context: UpgradeContext, channel: &mut dyn Channel) {
        let connection = channel.id();

        let Some(key) = head.headers.get(SEC_WEBSOCKET_KEY) else {
            tracing::debug!(connection_id = %connection, "WebSocket upgrade without key");
            write(channel, HttpResponse::text(StatusCode::BAD_REQUEST, "Missing Sec-WebSocket-Key"));
            return;
        };
        let accept = derive_accept_key(key.as_bytes());

        let Some(on_upgrade) = head.extensions.remove::<OnUpgrade>() else {
            tracing::warn!(connection_id = %connection, "Transport cannot hand over the socket");
            write(channel, HttpResponse::text(StatusCode::INTERNAL_SERVER_ERROR, "Upgrade not supported"));
            return;
        };

        let mut response = HttpResponse::new(StatusCode::SWITCHING_PROTOCOLS)
            .with_header("connection", "upgrade")
            .with_header("upgrade", "websocket")
            .with_header("sec-websocket-accept", accept);
        if let Some(protocol) = &context.sub_protocol {
            response = response.with_header("sec-websocket-protocol", protocol.as_str());
        }
        if !write(channel, response) {
            return;
        }

        tokio::spawn(async move {
            match on_upgrade.await {
                Ok(upgraded) => echo(connection, upgraded).await,
                Err(e) => tracing::warn!(connection_id = %connection, error = %e, "WebSocket upgrade failed"),
            }
        });
    }
}

fn write(channel: &mut dyn Channel, response: HttpResponse) -> bool {
    match channel.write(response) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(connection_id = %channel.id(), error = %e, "Couldn't write upgrade response");
            false
        }
    }
}

async fn echo(connection: ConnectionId, upgraded: Upgraded) {
    let mut ws = WebSocketStream::from_raw_socket(TokioIo::new(upgraded), Role::Server, None).await;
    tracing::debug!(connection_id = %connection, "WebSocket established");

    while let Some(message) = ws.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(connection_id = %connection, error = %e, "WebSocket read failed");
                break;
            }
        };

        match message {
            Message::Text(_) | Message::Binary(_) => {
                if let Err(e) = ws.send(message).await {
                    tracing::debug!(connection_id = %connection, error = %e, "WebSocket write failed");
                    break;
                }
            }
            Message::Close(frame) => {
                let _ = ws.send(Message::Close(frame)).await;
                break;
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    }
    tracing::debug!(connection_id = %connection, "WebSocket closed");
}
