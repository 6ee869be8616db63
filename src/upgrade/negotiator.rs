//! WebSocket upgrade negotiation.
//!
//! # Responsibilities
//! - Detect `Connection: upgrade` + `Upgrade: websocket` on a request head
//! - Build the upgrade context (sub-protocol, target, security, listener)
//!
//! # Design Decisions
//! - Clients may send several `Connection` tokens ("keep-alive, Upgrade");
//!   every token of every `Connection` header is checked
//! - Token comparison is ASCII case-insensitive and ignores surrounding whitespace
//! - Runs on the head only, once per exchange

use http::header::{HeaderMap, CONNECTION, SEC_WEBSOCKET_PROTOCOL, UPGRADE};

use crate::config::{ListenerConfig, WebSocketConfig};
use crate::message::RequestHead;

const UPGRADE_TOKEN: &str = "upgrade";
const WEBSOCKET_TOKEN: &str = "websocket";

/// Everything the upgrade subsystem needs to take over a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeContext {
    pub sub_protocol: Option<String>,
    pub target_uri: String,
    pub secured: bool,
    pub listener_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeDecision {
    NoUpgrade,
    WebSocketUpgrade(UpgradeContext),
}

/// Decides, per request head, whether the connection switches protocol.
#[derive(Debug, Clone)]
pub struct UpgradeNegotiator {
    listener_id: String,
    secured: bool,
    sub_protocols: Vec<String>,
}

impl UpgradeNegotiator {
    pub fn new(listener: &ListenerConfig) -> Self {
        Self {
            listener_id: listener.id.clone(),
            secured: listener.is_secured(),
            sub_protocols: Vec::new(),
        }
    }

    pub fn from_config(listener: &ListenerConfig, websocket: &WebSocketConfig) -> Self {
        Self::new(listener).with_sub_protocols(websocket.sub_protocols.clone())
    }

    /// Acceptable sub-protocols. Empty accepts whatever the client offers first.
    pub fn with_sub_protocols(mut self, sub_protocols: Vec<String>) -> Self {
        self.sub_protocols = sub_protocols;
        self
    }

    pub fn evaluate(&self, head: &RequestHead) -> UpgradeDecision {
        if !is_connection_upgrade(&head.headers) || !is_websocket_upgrade(&head.headers) {
            return UpgradeDecision::NoUpgrade;
        }

        UpgradeDecision::WebSocketUpgrade(UpgradeContext {
            sub_protocol: self.select_sub_protocol(&head.headers),
            target_uri: head.uri.to_string(),
            secured: self.secured,
            listener_id: self.listener_id.clone(),
        })
    }

    fn select_sub_protocol(&self, headers: &HeaderMap) -> Option<String> {
        let mut offered = tokens(headers, SEC_WEBSOCKET_PROTOCOL.as_str());
        if self.sub_protocols.is_empty() {
            return offered.next().map(str::to_string);
        }
        offered
            .find(|p| self.sub_protocols.iter().any(|s| s == p))
            .map(str::to_string)
    }
}

/// True if any `Connection` header carries the `upgrade` token.
pub fn is_connection_upgrade(headers: &HeaderMap) -> bool {
    tokens(headers, CONNECTION.as_str()).any(|t| t.eq_ignore_ascii_case(UPGRADE_TOKEN))
}

fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    tokens(headers, UPGRADE.as_str()).any(|t| t.eq_ignore_ascii_case(WEBSOCKET_TOKEN))
}

/// Comma-separated tokens across every value of `name`.
fn tokens<'a>(headers: &'a HeaderMap, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsConfig;
    use http::Request;

    fn head(headers: &[(&str, &str)]) -> RequestHead {
        let mut builder = Request::builder().uri("/chat?room=1");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn negotiator() -> UpgradeNegotiator {
        UpgradeNegotiator::new(&ListenerConfig::default())
    }

    #[test]
    fn keep_alive_upgrade_with_websocket_any_casing() {
        let decision = negotiator().evaluate(&head(&[
            ("Connection", "keep-alive,   UPGRADE "),
            ("Upgrade", "  WebSocket"),
        ]));

        match decision {
            UpgradeDecision::WebSocketUpgrade(ctx) => {
                assert_eq!(ctx.target_uri, "/chat?room=1");
                assert_eq!(ctx.listener_id, "default");
                assert!(!ctx.secured);
                assert_eq!(ctx.sub_protocol, None);
            }
            UpgradeDecision::NoUpgrade => panic!("expected websocket upgrade"),
        }
    }

    #[test]
    fn non_websocket_upgrade_is_ignored() {
        let decision = negotiator().evaluate(&head(&[("Connection", "Upgrade"), ("Upgrade", "h2c")]));
        assert_eq!(decision, UpgradeDecision::NoUpgrade);
    }

    #[test]
    fn missing_connection_header_means_no_upgrade() {
        let decision = negotiator().evaluate(&head(&[("Upgrade", "websocket")]));
        assert_eq!(decision, UpgradeDecision::NoUpgrade);
    }

    #[test]
    fn connection_without_upgrade_token() {
        let decision = negotiator().evaluate(&head(&[
            ("Connection", "keep-alive, upgrade-insecure"),
            ("Upgrade", "websocket"),
        ]));
        assert_eq!(decision, UpgradeDecision::NoUpgrade);
    }

    #[test]
    fn tokens_split_across_repeated_headers() {
        let decision = negotiator().evaluate(&head(&[
            ("Connection", "keep-alive"),
            ("Connection", "Upgrade"),
            ("Upgrade", "websocket"),
        ]));
        assert!(matches!(decision, UpgradeDecision::WebSocketUpgrade(_)));
    }

    #[test]
    fn secured_iff_listener_has_tls_material() {
        let mut listener = ListenerConfig::default();
        listener.tls = Some(TlsConfig {
            cert_path: "cert.pem".into(),
            key_path: "key.pem".into(),
        });
        let decision = UpgradeNegotiator::new(&listener)
            .evaluate(&head(&[("Connection", "upgrade"), ("Upgrade", "websocket")]));

        match decision {
            UpgradeDecision::WebSocketUpgrade(ctx) => assert!(ctx.secured),
            UpgradeDecision::NoUpgrade => panic!("expected websocket upgrade"),
        }
    }

    #[test]
    fn sub_protocol_selection() {
        let headers = [
            ("Connection", "Upgrade"),
            ("Upgrade", "websocket"),
            ("Sec-WebSocket-Protocol", "chat.v2, chat.v1"),
        ];

        let any = negotiator().evaluate(&head(&headers));
        assert!(matches!(any, UpgradeDecision::WebSocketUpgrade(ref ctx) if ctx.sub_protocol.as_deref() == Some("chat.v2")));

        let restricted = negotiator()
            .with_sub_protocols(vec!["chat.v1".into()])
            .evaluate(&head(&headers));
        assert!(matches!(restricted, UpgradeDecision::WebSocketUpgrade(ref ctx) if ctx.sub_protocol.as_deref() == Some("chat.v1")));

        let none = negotiator()
            .with_sub_protocols(vec!["mqtt".into()])
            .evaluate(&head(&headers));
        assert!(matches!(none, UpgradeDecision::WebSocketUpgrade(ref ctx) if ctx.sub_protocol.is_none()));
    }
}
