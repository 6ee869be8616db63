use std::time::{SystemTime, UNIX_EPOCH};

use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::net::ConnectionId;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub listener_id: String,
    pub active_connections: u64,
    pub opened_connections: u64,
    pub closed_connections: u64,
}

#[derive(Debug, Serialize)]
pub struct ConnectionStatus {
    pub id: ConnectionId,
    pub listener_id: String,
    pub peer_addr: Option<String>,
    pub age_secs: u64,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        listener_id: state.listener_id.clone(),
        active_connections: state.connections.active_count(),
        opened_connections: state.connections.opened_total(),
        closed_connections: state.connections.closed_total(),
    })
}

pub async fn get_connections(State(state): State<AdminState>) -> Json<Vec<ConnectionStatus>> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let connections = state
        .connections
        .snapshot()
        .into_iter()
        .map(|info| ConnectionStatus {
            id: info.id,
            listener_id: info.listener_id,
            peer_addr: info.peer_addr.map(|a| a.to_string()),
            age_secs: now.saturating_sub(info.opened_at),
        })
        .collect();

    Json(connections)
}

pub async fn get_processors(State(state): State<AdminState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "processors": state.processors.ids(),
    }))
}
