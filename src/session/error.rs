//! Session error categories.
//!
//! None of these escape a session; each resolves to "close the connection"
//! or "drop the exchange and log".

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// A new head arrived while the previous exchange was still open.
    #[error("request head received while another exchange is open")]
    ProtocolSequence,

    /// A body chunk arrived with no open exchange.
    #[error("body chunk received with no active message")]
    NoActiveMessage,

    /// I/O failure reported by the transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// No processor is registered under the listener's processor id.
    #[error("no message processor registered under '{0}'")]
    ProcessorUnavailable(String),

    /// Upgrade was negotiated but no upgrade handler is installed.
    #[error("upgrade requested but no upgrade handler is registered")]
    UpgradeUnavailable,
}

impl SessionError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::ProtocolSequence => "protocol_sequence",
            SessionError::NoActiveMessage => "no_active_message",
            SessionError::Transport(_) => "transport",
            SessionError::ProcessorUnavailable(_) => "processor_unavailable",
            SessionError::UpgradeUnavailable => "upgrade_unavailable",
        }
    }
}
