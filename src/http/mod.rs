//! hyper-based transport for sessions.
//!
//! # Data Flow
//! ```text
//! TCP connection (bounded listener)
//!     → server.rs (hyper http1, one session per connection)
//!     → request.rs (request → Head / BodyChunk / LastChunk events)
//!     → session
//!     → channel.rs (responses to the waiting hyper service futures)
//!     → response.rs (HttpResponse → hyper response)
//!
//! Upgrade requests:
//!     → websocket.rs (101 + tokio-tungstenite echo on the released socket)
//! ```

pub mod channel;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use channel::HyperChannel;
pub use server::{HttpServer, ServerError};
pub use websocket::WebSocketEcho;
