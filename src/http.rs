//! HTTP sidecar for liveness and server info.
//!
//! Runs on a separate tokio task and serves `GET /healthz` and `GET /info`.

use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;

/// Static server info shared with the handlers.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub name: String,
    pub network: String,
}

async fn healthz_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn info_handler(State(info): State<Arc<ServerInfo>>) -> Json<Value> {
    Json(json!({
        "name": info.name,
        "network": info.network,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Run the HTTP sidecar.
///
/// Binds to `addr` and serves until the process exits. This is a long-running
/// task that should be spawned in the background.
pub async fn run_http_server(addr: SocketAddr, info: ServerInfo) {
    let app = Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/info", get(info_handler))
        .with_state(Arc::new(info));

    tracing::info!(%addr, "HTTP sidecar listening");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind HTTP sidecar");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "HTTP sidecar error");
    }
}
