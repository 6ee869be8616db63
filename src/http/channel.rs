//! `Channel` implementation over a hyper HTTP/1 connection.
//!
//! hyper answers a request by resolving the service future, so every request
//! queues a oneshot responder before its events reach the session. Writes pop
//! responders in the same order, which is request order on HTTP/1.

use std::net::SocketAddr;

use tokio::sync::{mpsc, oneshot};

use crate::message::HttpResponse;
use crate::net::ConnectionId;
use crate::session::{Channel, ChannelError};

pub(crate) type Responder = oneshot::Sender<HttpResponse>;

pub struct HyperChannel {
    id: ConnectionId,
    peer: Option<SocketAddr>,
    local: Option<SocketAddr>,
    responders: mpsc::UnboundedReceiver<Responder>,
    /// Fired (or dropped) to abort the hyper connection.
    abort: Option<oneshot::Sender<()>>,
}

impl HyperChannel {
    pub(crate) fn new(
        id: ConnectionId,
        peer: Option<SocketAddr>,
        local: Option<SocketAddr>,
        responders: mpsc::UnboundedReceiver<Responder>,
        abort: oneshot::Sender<()>,
    ) -> Self {
        Self {
            id,
            peer,
            local,
            responders,
            abort: Some(abort),
        }
    }
}

impl Channel for HyperChannel {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.abort.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    fn write(&mut self, response: HttpResponse) -> Result<(), ChannelError> {
        match self.responders.try_recv() {
            Ok(responder) => responder.send(response).map_err(|_| ChannelError::Closed),
            Err(mpsc::error::TryRecvError::Empty) => Err(ChannelError::NoPendingExchange),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(ChannelError::Closed),
        }
    }

    /// hyper owns the write buffer, so there is nothing to flush here. The
    /// session follows this with `close()`, whose abort makes hyper flush
    /// and shut the socket.
    fn write_empty(&mut self) {
        tracing::trace!(connection_id = %self.id, "Empty write");
    }

    fn close(&mut self) {
        if let Some(abort) = self.abort.take() {
            let _ = abort.send(());
        }
        // Pending service futures see their responder dropped.
        self.responders.close();
        while self.responders.try_recv().is_ok() {}
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    fn channel() -> (HyperChannel, mpsc::UnboundedSender<Responder>, oneshot::Receiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (abort_tx, abort_rx) = oneshot::channel();
        (HyperChannel::new(ConnectionId::new(), None, None, rx, abort_tx), tx, abort_rx)
    }

    #[tokio::test]
    async fn writes_resolve_responders_in_order() {
        let (mut channel, responders, _abort) = channel();
        let (first_tx, first_rx) = oneshot::channel();
        let (second_tx, second_rx) = oneshot::channel();
        responders.send(first_tx).unwrap();
        responders.send(second_tx).unwrap();

        channel.write(HttpResponse::new(StatusCode::OK)).unwrap();
        channel.write(HttpResponse::new(StatusCode::ACCEPTED)).unwrap();

        assert_eq!(first_rx.await.unwrap().status, StatusCode::OK);
        assert_eq!(second_rx.await.unwrap().status, StatusCode::ACCEPTED);
        assert_eq!(
            channel.write(HttpResponse::ok()).unwrap_err(),
            ChannelError::NoPendingExchange
        );
    }

    #[tokio::test]
    async fn close_aborts_connection_and_drops_responders() {
        let (mut channel, responders, abort) = channel();
        let (pending_tx, pending_rx) = oneshot::channel();
        responders.send(pending_tx).unwrap();
        assert!(channel.is_active());

        channel.close();
        channel.close();

        assert!(abort.await.is_ok());
        assert!(pending_rx.await.is_err());
        assert!(!channel.is_active());
        assert_eq!(channel.write(HttpResponse::ok()).unwrap_err(), ChannelError::Closed);
    }
}
