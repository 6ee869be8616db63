//! Protocol upgrade detection and hand-off.
//!
//! The negotiator only decides. Taking over the connection is the job of
//! an [`UpgradeHandler`], installed on the session context; without one an
//! upgrade request closes the connection.

pub mod negotiator;

pub use negotiator::{is_connection_upgrade, UpgradeContext, UpgradeDecision, UpgradeNegotiator};

use crate::message::RequestHead;
use crate::session::Channel;

/// Takes over a connection once a WebSocket upgrade has been negotiated.
///
/// Called on the connection's task, once, before any further event is
/// processed. The session ignores HTTP framing from then on.
pub trait UpgradeHandler: Send + Sync {
    fn init_upgrade(&self, head: RequestHead, context: UpgradeContext, channel: &mut dyn Channel);
}
