//! Telemetry: tracing initialization and span constructors.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Respects `RUST_LOG`; defaults to `info`. Safe to call once per process;
/// tests that race on initialization should use `try_init` semantics, which
/// this wraps.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .try_init();
}

/// Standardized span constructors for connection observability.
pub mod spans {
    use tracing::{Span, info_span};
    use uuid::Uuid;

    /// Span for a client connection's lifetime.
    pub fn connection(conn_id: Uuid, addr: &std::net::SocketAddr) -> Span {
        info_span!("connection", conn_id = %conn_id, addr = %addr)
    }
}
