//! Inbound connection sessions.
//!
//! # Data Flow
//! ```text
//! Transport (hyper driver, tests)
//!     → ConnectionHandle::send(TransportEvent)
//!     → command queue (one per connection)
//!     → Session task
//!         → UpgradeNegotiator → UpgradeHandler        (upgrade requests)
//!         → MessageAssembler → DispatchGate → MessageProcessor
//!
//! MessageProcessor (any task)
//!     → ResponseCorrelator::complete
//!     → command queue → ResponseSequencer → Channel::write
//! ```
//!
//! # Design Decisions
//! - The session is the only owner of its channel, assembler and pools;
//!   nothing per-connection is locked
//! - Closing drains the pool registry and notifies the connection registry
//!   exactly once, whichever event triggered it

pub mod assembler;
pub mod channel;
pub mod context;
pub mod correlator;
pub mod error;
pub mod event;
pub mod handler;

pub use assembler::{ExchangeRecord, MessageAssembler};
pub use channel::{Channel, ChannelError};
pub use context::SessionContext;
pub use correlator::{ConnectionHandle, ExchangeId, ResponseCorrelator};
pub use error::SessionError;
pub use event::{CloseReason, TransportEvent};
pub use handler::{Session, SessionState};
