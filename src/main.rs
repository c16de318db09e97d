//! chatterd - room-scoped real-time messaging daemon.

use chatterd::Server;
use chatterd::config::Config;
use chatterd::http::{self, ServerInfo};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chatterd::telemetry::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        server = %config.server.name,
        network = %config.server.network,
        "Starting chatterd"
    );

    let server = Server::bind(&config).await?;

    if let Some(http_config) = &config.http {
        let addr = http_config.address;
        let info = ServerInfo {
            name: config.server.name.clone(),
            network: config.server.network.clone(),
        };
        tokio::spawn(async move {
            http::run_http_server(addr, info).await;
        });
    } else {
        info!("HTTP sidecar disabled");
    }

    server.run().await
}
