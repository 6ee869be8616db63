//! Canonical request/response representation.
//!
//! # Data Flow
//! ```text
//! RequestHead (from codec)
//!     → MessageHead (method, uri, version, ordered headers)
//!     → HttpMessage { head, properties, body }
//!         body: streamed chunks, end-of-message flag
//!     → handed to the processor while the session keeps the sending half
//!
//! HttpResponse (from processor)
//!     → response correlator → connection write
//! ```
//!
//! # Design Decisions
//! - Head is immutable once observed and shared via `Arc`
//! - Body chunks travel over a single-producer/single-consumer channel,
//!   so the session never shares mutable state with the processor
//! - End-of-message flips exactly once, after the last chunk

pub mod body;
pub mod headers;
pub mod properties;
pub mod response;

use std::sync::Arc;

use http::{Method, Uri, Version};

pub use body::{BodyError, MessageBody};
pub use headers::Headers;
pub use properties::{Properties, PropertyValue};
pub use response::HttpResponse;

/// Request line plus headers, as delivered by the codec.
pub type RequestHead = http::request::Parts;

/// Immutable head of an inbound request.
#[derive(Debug, Clone)]
pub struct MessageHead {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: Headers,
}

impl MessageHead {
    /// Record the head fields of a request.
    pub fn from_request_head(head: &RequestHead) -> Self {
        Self {
            method: head.method.clone(),
            uri: head.uri.clone(),
            version: head.version,
            headers: Headers::from(&head.headers),
        }
    }

    /// Protocol version as it appears on the request line.
    pub fn version_str(&self) -> &'static str {
        version_str(self.version)
    }
}

pub(crate) fn version_str(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

/// An inbound request as seen by a processor.
///
/// The body may still be streaming when the processor receives the message;
/// see [`MessageBody`].
#[derive(Debug)]
pub struct HttpMessage {
    head: Arc<MessageHead>,
    properties: Properties,
    body: MessageBody,
}

impl HttpMessage {
    pub(crate) fn new(head: Arc<MessageHead>, properties: Properties, body: MessageBody) -> Self {
        Self {
            head,
            properties,
            body,
        }
    }

    pub fn head(&self) -> &MessageHead {
        &self.head
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    pub fn version(&self) -> Version {
        self.head.version
    }

    pub fn headers(&self) -> &Headers {
        &self.head.headers
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    /// Shorthand for `properties().get(key)`.
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut MessageBody {
        &mut self.body
    }

    /// True once the terminal body frame has been observed.
    ///
    /// Frames already sent by the session are picked up first, without waiting.
    pub fn is_end_of_message(&mut self) -> bool {
        self.body.poll_available();
        self.body.is_end_of_message()
    }

    /// Split into head, properties and body.
    pub fn into_parts(self) -> (Arc<MessageHead>, Properties, MessageBody) {
        (self.head, self.properties, self.body)
    }
}
