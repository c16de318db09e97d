//! Test server management.
//!
//! Spawns in-process chatterd instances on an ephemeral port with a
//! temporary database.

use chatterd::Server;
use chatterd::config::Config;
use chatterd::db::Database;
use std::net::SocketAddr;
use tempfile::TempDir;

/// A test server instance.
pub struct TestServer {
    addr: SocketAddr,
    db_path: String,
    // Held so the database directory outlives the test.
    _data_dir: TempDir,
}

impl TestServer {
    /// Spawn a server with defaults: ephemeral port, temp database.
    pub async fn spawn() -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let db_path = data_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .into_owned();

        let config_toml = format!(
            r#"
[server]
name = "test.server"
network = "TestNet"

[listen]
address = "127.0.0.1:0"

[database]
path = "{db_path}"
"#
        );
        let config: Config = toml::from_str(&config_toml)?;

        let server = Server::bind(&config).await?;
        let addr = server.local_addr()?;

        tokio::spawn(async move {
            let _ = server.run().await;
        });

        Ok(Self {
            addr,
            db_path,
            _data_dir: data_dir,
        })
    }

    /// WebSocket URL clients should connect to.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Open a second handle onto the server's database for direct
    /// ledger/directory assertions.
    pub async fn db(&self) -> anyhow::Result<Database> {
        Ok(Database::new(&self.db_path).await?)
    }
}
