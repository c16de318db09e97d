//! Integration test common infrastructure.
//!
//! Provides utilities for spawning in-process test servers, creating
//! WebSocket test clients, and asserting on event flows.

mod client;
mod server;

#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use server::TestServer;
