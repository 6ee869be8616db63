//! Builds message models from framing events.
//!
//! # Responsibilities
//! - Create a model when a request head is observed
//! - Stream body chunks into the open model
//! - Close the model on the last chunk, setting end-of-message once
//!
//! # Design Decisions
//! - At most one open model; a second head is a protocol sequence error
//! - Zero-length chunks are not recorded
//! - A full-message event is replayed by the session as head + last chunk,
//!   so nothing downstream special-cases it

use std::sync::Arc;

use bytes::Bytes;

use crate::message::body::BodySender;
use crate::message::{HttpMessage, MessageBody, MessageHead, Properties, RequestHead};
use crate::session::correlator::ExchangeId;
use crate::session::SessionError;

/// Session-side record of an exchange's request.
#[derive(Debug, Clone)]
pub struct ExchangeRecord {
    pub id: ExchangeId,
    pub head: Arc<MessageHead>,
    pub chunk_count: usize,
    pub body_len: usize,
    pub end_of_message: bool,
}

#[derive(Debug)]
struct OpenExchange {
    record: ExchangeRecord,
    body: BodySender,
}

impl OpenExchange {
    fn append(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.record.chunk_count += 1;
        self.record.body_len += chunk.len();
        if !self.body.send_chunk(chunk) {
            tracing::trace!(exchange = %self.record.id, "Processor dropped the body, discarding chunk");
        }
    }
}

#[derive(Debug, Default)]
pub struct MessageAssembler {
    open: Option<OpenExchange>,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new model from a request head.
    pub fn on_head(
        &mut self,
        head: &RequestHead,
        id: ExchangeId,
        properties: Properties,
    ) -> Result<HttpMessage, SessionError> {
        if self.open.is_some() {
            return Err(SessionError::ProtocolSequence);
        }

        let head = Arc::new(MessageHead::from_request_head(head));
        let (sender, body) = MessageBody::channel();
        self.open = Some(OpenExchange {
            record: ExchangeRecord {
                id,
                head: Arc::clone(&head),
                chunk_count: 0,
                body_len: 0,
                end_of_message: false,
            },
            body: sender,
        });

        Ok(HttpMessage::new(head, properties, body))
    }

    /// Append a chunk to the open model.
    pub fn on_body_chunk(&mut self, chunk: Bytes) -> Result<(), SessionError> {
        let open = self.open.as_mut().ok_or(SessionError::NoActiveMessage)?;
        open.append(chunk);
        Ok(())
    }

    /// Append the final chunk, set end-of-message and close the model.
    pub fn on_last_chunk(&mut self, chunk: Bytes) -> Result<ExchangeRecord, SessionError> {
        let mut open = self.open.take().ok_or(SessionError::NoActiveMessage)?;
        open.append(chunk);
        open.record.end_of_message = true;
        open.body.finish();
        Ok(open.record)
    }

    pub fn has_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn open_exchange(&self) -> Option<&ExchangeRecord> {
        self.open.as_ref().map(|open| &open.record)
    }

    /// Drop the open model without finishing it; the processor's body
    /// reports an abort.
    pub fn abort(&mut self) -> Option<ExchangeRecord> {
        self.open.take().map(|open| open.record)
    }
}
