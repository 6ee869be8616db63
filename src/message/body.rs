//! Streamed message body.
//!
//! # Responsibilities
//! - Carry body chunks from the session to the processor in arrival order
//! - Expose the end-of-message flag on the processor side
//! - Report an aborted body when the connection goes away mid-stream

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum BodyError {
    /// The connection closed before the last chunk arrived.
    #[error("message body aborted before end of message")]
    Aborted,
}

#[derive(Debug)]
pub(crate) enum BodyFrame {
    Data(Bytes),
    End,
}

/// Session-side half of a body stream.
#[derive(Debug)]
pub(crate) struct BodySender {
    tx: mpsc::UnboundedSender<BodyFrame>,
}

impl BodySender {
    /// Returns false if the processor already dropped the body.
    pub(crate) fn send_chunk(&self, chunk: Bytes) -> bool {
        self.tx.send(BodyFrame::Data(chunk)).is_ok()
    }

    /// Send the terminal frame. Consumes the sender so it happens once.
    pub(crate) fn finish(self) -> bool {
        self.tx.send(BodyFrame::End).is_ok()
    }
}

/// Processor-side view of a request body.
///
/// Chunks are buffered as they are received. `is_end_of_message` only turns
/// true after the terminal frame, which the session sends after the last chunk.
#[derive(Debug)]
pub struct MessageBody {
    rx: mpsc::UnboundedReceiver<BodyFrame>,
    chunks: Vec<Bytes>,
    received: usize,
    end_of_message: bool,
}

impl MessageBody {
    pub(crate) fn channel() -> (BodySender, MessageBody) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            BodySender { tx },
            MessageBody {
                rx,
                chunks: Vec::new(),
                received: 0,
                end_of_message: false,
            },
        )
    }

    pub fn is_end_of_message(&self) -> bool {
        self.end_of_message
    }

    /// Chunks received so far.
    pub fn chunks(&self) -> &[Bytes] {
        &self.chunks
    }

    /// Number of body bytes received so far.
    pub fn received_len(&self) -> usize {
        self.received
    }

    /// Take every frame that is already queued, without waiting.
    /// Returns the number of frames consumed.
    pub fn poll_available(&mut self) -> usize {
        let mut consumed = 0;
        while !self.end_of_message {
            match self.rx.try_recv() {
                Ok(frame) => {
                    self.accept(frame);
                    consumed += 1;
                }
                Err(_) => break,
            }
        }
        consumed
    }

    /// Wait until the last chunk has arrived.
    pub async fn wait_complete(&mut self) -> Result<(), BodyError> {
        while !self.end_of_message {
            match self.rx.recv().await {
                Some(frame) => self.accept(frame),
                None => return Err(BodyError::Aborted),
            }
        }
        Ok(())
    }

    /// Wait for the whole body and return it as one buffer.
    pub async fn collect(mut self) -> Result<Bytes, BodyError> {
        self.wait_complete().await?;
        Ok(self.to_bytes())
    }

    /// Concatenation of the chunks received so far.
    pub fn to_bytes(&self) -> Bytes {
        match self.chunks.as_slice() {
            [] => Bytes::new(),
            [only] => only.clone(),
            many => {
                let mut buf = BytesMut::with_capacity(self.received);
                for chunk in many {
                    buf.extend_from_slice(chunk);
                }
                buf.freeze()
            }
        }
    }

    fn accept(&mut self, frame: BodyFrame) {
        match frame {
            BodyFrame::Data(chunk) => {
                self.received += chunk.len();
                self.chunks.push(chunk);
            }
            BodyFrame::End => self.end_of_message = true,
        }
    }
}
