//! Configuration loading and management.
//!
//! Configuration is a single TOML file loaded at startup. Every section has
//! serde defaults so a minimal file (or none at all for tests) still yields a
//! runnable server.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid history page_size {0}: must be one of 50, 100, 200, 500")]
    InvalidPageSize(u32),
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server identity.
    #[serde(default)]
    pub server: ServerConfig,
    /// WebSocket listener.
    #[serde(default)]
    pub listen: ListenConfig,
    /// Optional HTTP sidecar for liveness/info. Disabled when absent.
    pub http: Option<HttpConfig>,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Message history configuration.
    #[serde(default)]
    pub history: HistoryConfig,
    /// Seed configuration (used by `chatterd-seed`).
    #[serde(default)]
    pub seed: SeedConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !crate::protocol::ALLOWED_PAGE_SIZES.contains(&self.history.page_size) {
            return Err(ConfigError::InvalidPageSize(self.history.page_size));
        }
        Ok(())
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name (e.g., "chat.straylight.net").
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Network name shown in /info.
    #[serde(default = "default_network")]
    pub network: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            network: default_network(),
        }
    }
}

/// WebSocket listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address the WebSocket gateway binds to.
    #[serde(default = "default_listen_address")]
    pub address: SocketAddr,
    /// Origins allowed in the WebSocket handshake. Empty = allow all
    /// (native clients and tests send no Origin header).
    #[serde(default)]
    pub allow_origins: Vec<String>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: default_listen_address(),
            allow_origins: Vec::new(),
        }
    }
}

/// HTTP sidecar configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Address the health/info endpoints bind to.
    pub address: SocketAddr,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path, or ":memory:" for an ephemeral store.
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Message history configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Page size used for the history page sent on join.
    /// Must be one of the protocol page sizes (50, 100, 200, 500).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

/// Seed configuration for `chatterd-seed`.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    /// Rooms provisioned by the seed binary.
    #[serde(default = "default_seed_rooms")]
    pub rooms: Vec<String>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            rooms: default_seed_rooms(),
        }
    }
}

fn default_server_name() -> String {
    "chatterd.local".to_string()
}

fn default_network() -> String {
    "Chatter".to_string()
}

fn default_listen_address() -> SocketAddr {
    "127.0.0.1:7600".parse().expect("static address")
}

fn default_database_path() -> String {
    "chatterd.db".to_string()
}

fn default_page_size() -> u32 {
    50
}

fn default_seed_rooms() -> Vec<String> {
    vec!["general".to_string(), "random".to_string()]
}
