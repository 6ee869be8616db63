//! Inbound HTTP connection handling.
//!
//! Turns transport events into request models, negotiates WebSocket
//! upgrades, dispatches to pluggable processors and tears each connection
//! down deterministically, including any downstream pools opened on its
//! behalf.

pub mod admin;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod lifecycle;
pub mod message;
pub mod net;
pub mod observability;
pub mod processor;
pub mod security;
pub mod session;
pub mod upgrade;

pub use config::schema::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use session::{Session, SessionContext};
