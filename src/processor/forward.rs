//! Reverse-proxy processor.
//!
//! # Responsibilities
//! - Pick a backend by longest path-prefix match
//! - Keep one pooled upstream client per (inbound connection, backend)
//! - Attach each client to the inbound session so its downstream
//!   connections close together with the inbound connection
//! - Map upstream failures to gateway status codes
//!
//! # Design Decisions
//! - Request bodies are buffered before forwarding
//! - The client map entry is the only long-lived clone of a client; closing
//!   the pool removes it, which drops the idle upstream connections

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use http::header::{HeaderMap, HeaderName};
use http::{Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;

use crate::config::{BackendConfig, TimeoutConfig};
use crate::message::properties::keys;
use crate::message::{Headers, HttpMessage, HttpResponse, MessageHead};
use crate::net::{ConnectionId, DownstreamPool, PoolError};
use crate::processor::{spawn, MessageProcessor, ProcessorError};
use crate::session::ResponseCorrelator;

type UpstreamClient = Client<HttpConnector, Full<Bytes>>;

/// Headers that describe the hop, not the message.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
    "content-length",
];

#[derive(Debug, Clone)]
struct Route {
    backend: String,
    address: String,
    prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    connection: ConnectionId,
    backend: String,
}

pub struct ForwardProcessor {
    /// Longest prefix first.
    routes: Vec<Route>,
    clients: Arc<DashMap<PoolKey, UpstreamClient>>,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl ForwardProcessor {
    pub fn new(backends: &[BackendConfig], timeouts: &TimeoutConfig) -> Self {
        let mut routes: Vec<Route> = backends
            .iter()
            .map(|b| Route {
                backend: b.name.clone(),
                address: b.address.clone(),
                prefix: b.path_prefix.clone(),
            })
            .collect();
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

        Self {
            routes,
            clients: Arc::new(DashMap::new()),
            connect_timeout: Duration::from_secs(timeouts.connect_secs),
            request_timeout: Duration::from_secs(timeouts.request_secs),
        }
    }

    /// Number of live upstream clients across all connections.
    pub fn active_clients(&self) -> usize {
        self.clients.len()
    }

    fn route(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|r| path.starts_with(&r.prefix))
    }

    /// Client for this connection and backend, created and attached to the
    /// connection on first use.
    fn client_for(&self, route: &Route, correlator: &ResponseCorrelator) -> UpstreamClient {
        let connection = correlator.connection();
        let key = PoolKey {
            connection: connection.id(),
            backend: route.backend.clone(),
        };

        if let Some(client) = self.clients.get(&key) {
            return client.clone();
        }

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(self.connect_timeout));
        let client: UpstreamClient = Client::builder(TokioExecutor::new()).build(connector);
        self.clients.insert(key.clone(), client.clone());

        tracing::debug!(
            connection_id = %key.connection,
            backend = %route.backend,
            "Opened upstream pool"
        );
        connection.attach_pool(
            route.backend.clone(),
            Box::new(UpstreamPool {
                key,
                clients: Arc::clone(&self.clients),
                closed: false,
            }),
        );
        client
    }
}

impl MessageProcessor for ForwardProcessor {
    fn receive(&self, message: HttpMessage, correlator: ResponseCorrelator) -> Result<(), ProcessorError> {
        let Some(route) = self.route(message.uri().path()).cloned() else {
            tracing::warn!(path = %message.uri().path(), "No backend matched");
            correlator.complete(HttpResponse::text(StatusCode::NOT_FOUND, "No matching backend"));
            return Ok(());
        };

        let client = self.client_for(&route, &correlator);
        let request_timeout = self.request_timeout;
        let (head, properties, body) = message.into_parts();
        let request_id = properties.get_str(keys::REQUEST_ID).map(str::to_string);

        spawn(async move {
            let body = match body.collect().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!(exchange = %correlator.exchange(), error = %e, "Request body incomplete, not forwarding");
                    return;
                }
            };

            let request = match upstream_request(&head, &route, request_id.as_deref(), body) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!(backend = %route.backend, error = %e, "Couldn't build upstream request");
                    correlator.complete(HttpResponse::text(StatusCode::BAD_GATEWAY, "Invalid upstream request"));
                    return;
                }
            };

            let response = match tokio::time::timeout(request_timeout, forward(&client, request)).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    tracing::error!(backend = %route.backend, error = %e, "Upstream error");
                    HttpResponse::text(StatusCode::BAD_GATEWAY, "Upstream request failed")
                }
                Err(_) => {
                    tracing::warn!(backend = %route.backend, timeout = ?request_timeout, "Upstream timed out");
                    HttpResponse::text(StatusCode::GATEWAY_TIMEOUT, "Upstream request timed out")
                }
            };
            correlator.complete(response);
        })
    }
}

fn upstream_request(
    head: &MessageHead,
    route: &Route,
    request_id: Option<&str>,
    body: Bytes,
) -> Result<Request<Full<Bytes>>, http::Error> {
    let path = head.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let uri: Uri = format!("http://{}{}", route.address, path).parse()?;

    let mut builder = Request::builder().method(head.method.clone()).uri(uri);
    if let Some(headers) = builder.headers_mut() {
        *headers = strip_hop_by_hop(head.headers.to_header_map());
        if let Some(id) = request_id {
            if let Ok(value) = id.parse() {
                headers.insert("x-request-id", value);
            }
        }
    }
    builder.body(Full::new(body))
}

async fn forward(
    client: &UpstreamClient,
    request: Request<Full<Bytes>>,
) -> Result<HttpResponse, Box<dyn std::error::Error + Send + Sync>> {
    let response = client.request(request).await?;
    let (parts, body) = response.into_parts();
    let body = body.collect().await?.to_bytes();

    Ok(HttpResponse {
        status: parts.status,
        headers: Headers::from(&strip_hop_by_hop(parts.headers)),
        body,
    })
}

fn strip_hop_by_hop(mut headers: HeaderMap) -> HeaderMap {
    for name in HOP_BY_HOP {
        headers.remove(HeaderName::from_static(name));
    }
    headers
}

/// Upstream client registered with one inbound session.
#[derive(Debug)]
struct UpstreamPool {
    key: PoolKey,
    clients: Arc<DashMap<PoolKey, UpstreamClient>>,
    closed: bool,
}

impl DownstreamPool for UpstreamPool {
    fn close(&mut self) -> Result<(), PoolError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.clients.remove(&self.key).is_some() {
            tracing::debug!(
                connection_id = %self.key.connection,
                backend = %self.key.backend,
                "Closed upstream pool"
            );
        }
        Ok(())
    }
}
