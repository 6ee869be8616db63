//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (connection id, process-wide registry)
//!     → Hand off to the HTTP layer (one session per connection)
//!
//! Downstream pools opened for a connection:
//!     → pool.rs (per-session registry, drained exactly once on close)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - The connection registry is the only structure shared between connections
//! - Pool registries are connection-local and never locked

pub mod connection;
pub mod listener;
pub mod pool;

pub use connection::{ConnectionId, ConnectionInfo, ConnectionRegistry};
pub use pool::{DownstreamPool, PoolError, PoolRegistry};
