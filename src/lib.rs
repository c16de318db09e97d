//! chatterd - room-scoped real-time messaging daemon.
//!
//! Participants authenticate over a WebSocket, occupy exactly one room at a
//! time, broadcast messages to their room, and page through durable history.
//! The library exposes the full server so binaries and integration tests can
//! assemble and run it in-process.

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod network;
pub mod protocol;
pub mod session;
pub mod state;
pub mod telemetry;

use crate::config::Config;
use crate::db::Database;
use crate::network::Gateway;
use crate::state::Hub;
use std::net::SocketAddr;
use std::sync::Arc;

/// A fully wired server, ready to run.
pub struct Server {
    gateway: Gateway,
}

impl Server {
    /// Open the store, build the shared state, and bind the gateway.
    ///
    /// Everything stateful is constructed here and injected; there are no
    /// process-global registries.
    pub async fn bind(config: &Config) -> anyhow::Result<Self> {
        let db = Database::new(&config.database.path).await?;
        let hub = Arc::new(Hub::new(db, config.history.page_size));

        let gateway = Gateway::bind(
            config.listen.address,
            config.listen.allow_origins.clone(),
            hub,
        )
        .await?;

        Ok(Self { gateway })
    }

    /// The bound WebSocket address.
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.gateway.local_addr()
    }

    /// Accept connections forever.
    pub async fn run(self) -> anyhow::Result<()> {
        self.gateway.run().await
    }
}
