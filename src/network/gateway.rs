//! Gateway - TCP listener that accepts incoming WebSocket connections.
//!
//! The Gateway binds one socket and spawns a Connection task per accepted
//! client. The WebSocket handshake validates the Origin header against the
//! configured allowlist (empty list = allow all, for native clients and
//! tests).

use crate::network::Connection;
use crate::state::Hub;
use crate::telemetry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_hdr_async;
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

/// The Gateway accepts incoming connections and spawns handlers.
pub struct Gateway {
    listener: TcpListener,
    hub: Arc<Hub>,
    allow_origins: Vec<String>,
}

impl Gateway {
    /// Bind the gateway to the specified address.
    pub async fn bind(
        addr: SocketAddr,
        allow_origins: Vec<String>,
        hub: Arc<Hub>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(address = %listener.local_addr()?, "WebSocket listener bound");
        Ok(Self {
            listener,
            hub,
            allow_origins,
        })
    }

    /// The bound address. Useful when binding port 0 in tests.
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the gateway, accepting connections forever.
    pub async fn run(self) -> anyhow::Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let hub = Arc::clone(&self.hub);
                    let allowed = self.allow_origins.clone();
                    let conn_id = Uuid::new_v4();
                    let span = telemetry::spans::connection(conn_id, &addr);

                    tokio::spawn(async move {
                        // Origin validation callback for the WebSocket handshake.
                        let origin_callback =
                            |req: &http::Request<()>, response: http::Response<()>| {
                                if allowed.is_empty() {
                                    return Ok(response);
                                }

                                if let Some(origin) =
                                    req.headers().get("Origin").and_then(|o| o.to_str().ok())
                                {
                                    if allowed.iter().any(|a| a == origin || a == "*") {
                                        return Ok(response);
                                    }
                                    warn!(%addr, origin = %origin, "WebSocket origin rejected");
                                }

                                Err(http::Response::builder()
                                    .status(http::StatusCode::FORBIDDEN)
                                    .body(Some("origin not allowed".to_string()))
                                    .unwrap_or_default())
                            };

                        match accept_hdr_async(stream, origin_callback).await {
                            Ok(ws_stream) => {
                                info!(%conn_id, %addr, "Connection accepted");
                                let connection =
                                    Connection::new(conn_id, ws_stream, addr, hub);
                                if let Err(e) = connection.run().await {
                                    error!(%conn_id, %addr, error = %e, "Connection error");
                                }
                                info!(%conn_id, %addr, "Connection closed");
                            }
                            Err(e) => {
                                warn!(%addr, error = %e, "WebSocket handshake failed");
                            }
                        }
                    }.instrument(span));
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}
