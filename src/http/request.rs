//! Translation of hyper requests into transport events.
//!
//! # Responsibilities
//! - Queue the request's responder before the session sees its head
//! - Emit `FullMessage` for bodiless requests
//! - Emit `Head`, `BodyChunk`*, `LastChunk` for streamed bodies
//!
//! # Design Decisions
//! - The body is pumped inside the service future, so the last chunk of one
//!   request is always queued before the next request's head
//! - Trailers are not forwarded

use std::convert::Infallible;

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Incoming};
use tokio::sync::{mpsc, oneshot};

use crate::http::channel::Responder;
use crate::http::response;
use crate::message::HttpResponse;
use crate::session::{ConnectionHandle, TransportEvent};

/// hyper service body for one request.
pub(crate) async fn handle_request(
    request: Request<Incoming>,
    events: ConnectionHandle,
    responders: mpsc::UnboundedSender<Responder>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (responder, reply) = oneshot::channel();
    if responders.send(responder).is_err() {
        return Ok(response::unavailable());
    }

    let (parts, body) = request.into_parts();
    if body.is_end_stream() {
        events.send(TransportEvent::FullMessage(parts, Bytes::new()));
        return Ok(await_reply(reply).await);
    }

    if !events.send(TransportEvent::Head(parts)) {
        return Ok(response::unavailable());
    }
    let ((), reply) = tokio::join!(pump_body(body, &events), await_reply(reply));
    Ok(reply)
}

async fn pump_body(mut body: Incoming, events: &ConnectionHandle) {
    while let Some(frame) = body.frame().await {
        match frame {
            Ok(frame) => {
                if let Ok(data) = frame.into_data() {
                    if !events.send(TransportEvent::BodyChunk(data)) {
                        return;
                    }
                }
            }
            Err(e) => {
                events.send(TransportEvent::TransportError(e.to_string()));
                return;
            }
        }
    }
    events.send(TransportEvent::LastChunk(Bytes::new()));
}

async fn await_reply(reply: oneshot::Receiver<HttpResponse>) -> Response<Full<Bytes>> {
    match reply.await {
        Ok(reply) => response::into_hyper(reply),
        Err(_) => response::unavailable(),
    }
}
