//! Inbound HTTP transport.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────────────────┐
//!                    │                    INBOUND TRANSPORT                      │
//!                    │                                                           │
//!   Client Request   │  ┌──────────┐   ┌──────────┐   ┌─────────────────────┐    │
//!   ─────────────────┼─▶│   net    │──▶│   http   │──▶│       session       │    │
//!                    │  │ listener │   │  driver  │   │ assembler, upgrade, │    │
//!                    │  └──────────┘   └──────────┘   │  gate, correlator   │    │
//!                    │                                └──────────┬──────────┘    │
//!                    │                                           ▼               │
//!   Client Response  │  ┌──────────┐   ┌──────────┐   ┌─────────────────────┐    │
//!   ◀────────────────┼──│   http   │◀──│ sequencer│◀──│      processor      │◀───┼── Backend
//!                    │  │ channel  │   │          │   │   echo / forward    │    │
//!                    │  └──────────┘   └──────────┘   └─────────────────────┘    │
//!                    │                                                           │
//!                    │  config · observability · security · admin · lifecycle    │
//!                    └───────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use inbound_transport::admin::{self, AdminState};
use inbound_transport::config::loader::load_config;
use inbound_transport::config::ServerConfig;
use inbound_transport::http::HttpServer;
use inbound_transport::lifecycle::{signals, startup, Shutdown};
use inbound_transport::net::listener::Listener;
use inbound_transport::net::ConnectionRegistry;
use inbound_transport::observability::{logging, metrics};

const DRAIN_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "inbound-transport")]
#[command(about = "Inbound HTTP/1 transport with WebSocket upgrade", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "inbound-transport starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        processor = ?config.processor.kind,
        idle_timeout_secs = config.timeouts.idle_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let connections = ConnectionRegistry::new();
    let processors = startup::build_processors(&config);
    let context = Arc::new(startup::build_context(&config, processors.clone(), connections.clone()));
    let shutdown = Shutdown::new();

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState {
            listener_id: config.listener.id.clone(),
            api_key: config.admin.api_key.clone(),
            connections: connections.clone(),
            processors,
        };
        let admin_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            if let Err(e) = admin::serve_admin(listener, state, admin_shutdown).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let listener = Listener::bind(&config.listener).await?;
    let server = HttpServer::new(context, &config.timeouts);
    let mut server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        _ = signals::wait_for_shutdown_signal() => {}
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => tracing::warn!("Server stopped unexpectedly"),
                Ok(Err(e)) => tracing::error!(error = %e, "Server failed"),
                Err(e) => tracing::error!(error = %e, "Server task panicked"),
            }
            return Ok(());
        }
    }

    shutdown.trigger();
    if let Err(e) = server_task.await {
        tracing::error!(error = %e, "Server task panicked");
    }
    shutdown.drain(&connections, DRAIN_DEADLINE).await;

    tracing::info!("Shutdown complete");
    Ok(())
}
