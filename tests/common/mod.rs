//! Shared utilities for session and server tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::Request;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use inbound_transport::config::{ListenerConfig, ServerConfig};
use inbound_transport::dispatch::ConnectionHooks;
use inbound_transport::http::HttpServer;
use inbound_transport::lifecycle::{startup, Shutdown};
use inbound_transport::message::{HttpMessage, HttpResponse, RequestHead};
use inbound_transport::net::listener::Listener;
use inbound_transport::net::{ConnectionId, ConnectionInfo, ConnectionRegistry, DownstreamPool, PoolError};
use inbound_transport::processor::{MessageProcessor, ProcessorError, ProcessorRegistry};
use inbound_transport::session::{
    Channel, ChannelError, CloseReason, ExchangeRecord, ResponseCorrelator, SessionContext,
};

/// What a `RecordingChannel` saw, shared with the test.
#[derive(Debug, Default)]
pub struct ChannelLog {
    pub written: Mutex<Vec<HttpResponse>>,
    pub empty_writes: AtomicUsize,
    pub closes: AtomicUsize,
}

impl ChannelLog {
    pub fn statuses(&self) -> Vec<u16> {
        self.written
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.status.as_u16())
            .collect()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// In-memory channel that records everything written to it.
pub struct RecordingChannel {
    id: ConnectionId,
    active: bool,
    log: Arc<ChannelLog>,
}

impl RecordingChannel {
    pub fn new() -> (Self, Arc<ChannelLog>) {
        let log = Arc::new(ChannelLog::default());
        (
            Self {
                id: ConnectionId::new(),
                active: true,
                log: Arc::clone(&log),
            },
            log,
        )
    }
}

impl Channel for RecordingChannel {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn write(&mut self, response: HttpResponse) -> Result<(), ChannelError> {
        if !self.active {
            return Err(ChannelError::Closed);
        }
        self.log.written.lock().unwrap().push(response);
        Ok(())
    }

    fn write_empty(&mut self) {
        self.log.empty_writes.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&mut self) {
        self.active = false;
        self.log.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Some("192.0.2.10:40000".parse().unwrap())
    }
}

/// Pool that counts close calls.
#[derive(Debug)]
pub struct CountingPool {
    closes: Arc<AtomicUsize>,
    fail: bool,
}

impl CountingPool {
    pub fn boxed(closes: &Arc<AtomicUsize>) -> Box<dyn DownstreamPool> {
        Box::new(Self {
            closes: Arc::clone(closes),
            fail: false,
        })
    }

    pub fn failing(closes: &Arc<AtomicUsize>) -> Box<dyn DownstreamPool> {
        Box::new(Self {
            closes: Arc::clone(closes),
            fail: true,
        })
    }
}

impl DownstreamPool for CountingPool {
    fn close(&mut self) -> Result<(), PoolError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(PoolError::Close("refused".into()))
        } else {
            Ok(())
        }
    }
}

/// Processor that hands every message to the test.
pub struct RecordingProcessor {
    tx: mpsc::UnboundedSender<(HttpMessage, ResponseCorrelator)>,
    received: AtomicUsize,
}

impl RecordingProcessor {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(HttpMessage, ResponseCorrelator)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                tx,
                received: AtomicUsize::new(0),
            }),
            rx,
        )
    }

    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }
}

impl MessageProcessor for RecordingProcessor {
    fn receive(&self, message: HttpMessage, correlator: ResponseCorrelator) -> Result<(), ProcessorError> {
        self.received.fetch_add(1, Ordering::SeqCst);
        let _ = self.tx.send((message, correlator));
        Ok(())
    }
}

/// Hooks that count each lifecycle point.
#[derive(Debug, Default)]
pub struct CountingHooks {
    pub opened: AtomicUsize,
    pub received: AtomicUsize,
    pub fully_received: AtomicUsize,
    pub closed: AtomicUsize,
}

impl ConnectionHooks for CountingHooks {
    fn at_connection_open(&self, _info: &ConnectionInfo) {
        self.opened.fetch_add(1, Ordering::SeqCst);
    }

    fn at_request_received(&self, _connection: ConnectionId, _message: &HttpMessage) {
        self.received.fetch_add(1, Ordering::SeqCst);
    }

    fn at_request_fully_received(&self, _connection: ConnectionId, _record: &ExchangeRecord) {
        self.fully_received.fetch_add(1, Ordering::SeqCst);
    }

    fn at_connection_close(&self, _connection: ConnectionId, _reason: &CloseReason) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn head(method: &str, uri: &str, headers: &[(&str, &str)]) -> RequestHead {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(()).unwrap().into_parts().0
}

/// Context with one recording processor registered under "default".
pub fn recording_context() -> (
    SessionContext,
    Arc<RecordingProcessor>,
    mpsc::UnboundedReceiver<(HttpMessage, ResponseCorrelator)>,
    ConnectionRegistry,
) {
    let (processor, rx) = RecordingProcessor::new();
    let processors = ProcessorRegistry::new();
    processors.register("default", processor.clone());
    let connections = ConnectionRegistry::new();
    let context = SessionContext::new(ListenerConfig::default(), processors, connections.clone());
    (context, processor, rx, connections)
}

/// Running transport bound to an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub connections: ConnectionRegistry,
    pub processors: ProcessorRegistry,
}

pub async fn start_server(config: ServerConfig) -> TestServer {
    let processors = startup::build_processors(&config);
    start_server_with(config, processors).await
}

/// Like `start_server`, with a caller-built processor registry.
pub async fn start_server_with(mut config: ServerConfig, processors: ProcessorRegistry) -> TestServer {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    config.listener.bind_address = addr.to_string();

    let connections = ConnectionRegistry::new();
    let context = Arc::new(startup::build_context(&config, processors.clone(), connections.clone()));
    let shutdown = Shutdown::new();

    let listener = Listener::from_tcp(tcp, config.listener.max_connections);
    let server = HttpServer::new(context, &config.timeouts);
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestServer {
        addr,
        shutdown,
        connections,
        processors,
    }
}

/// Start a mock backend that answers every request with `200` and a body
/// naming the request line it saw.
pub async fn start_mock_backend(name: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = Vec::new();
                        let mut chunk = [0u8; 1024];
                        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                            match socket.read(&mut chunk).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                            }
                        }
                        let request = String::from_utf8_lossy(&buf);
                        let request_line = request.lines().next().unwrap_or_default().to_string();
                        let body = format!("{name}: {request_line}");

                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Poll `check` until it holds or the deadline passes.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
