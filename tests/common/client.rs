//! Test WebSocket client.
//!
//! Sends raw JSON events and asserts on received server events, decoded as
//! loose `serde_json::Value`s so tests can assert on exact wire shapes.

use anyhow::{Context, bail};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A test client.
pub struct TestClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    /// Connect to a test server.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let (stream, _) = connect_async(url).await?;
        Ok(Self { stream })
    }

    /// Send one event as a JSON text frame.
    pub async fn send(&mut self, event: Value) -> anyhow::Result<()> {
        self.stream
            .send(WsMessage::Text(event.to_string()))
            .await?;
        Ok(())
    }

    /// Receive a single event.
    pub async fn recv(&mut self) -> anyhow::Result<Value> {
        self.recv_timeout(RECV_TIMEOUT).await
    }

    /// Receive an event with a timeout.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<Value> {
        let frame = timeout(dur, self.stream.next())
            .await
            .context("timed out waiting for event")?
            .context("connection closed")??;
        match frame {
            WsMessage::Text(text) => Ok(serde_json::from_str(&text)?),
            other => bail!("unexpected frame: {other:?}"),
        }
    }

    /// Read events until one has the given `type`, discarding the rest.
    pub async fn recv_until(&mut self, event_type: &str) -> anyhow::Result<Value> {
        for _ in 0..32 {
            let event = self.recv().await?;
            if event["type"] == event_type {
                return Ok(event);
            }
        }
        bail!("no {event_type} event within 32 events")
    }

    /// Assert that no event arrives within a short window.
    pub async fn expect_silence(&mut self) -> anyhow::Result<()> {
        match self.recv_timeout(Duration::from_millis(200)).await {
            Ok(event) => bail!("expected silence, got {event}"),
            Err(_) => Ok(()),
        }
    }

    /// Authenticate and return the `authenticated` event.
    pub async fn authenticate(&mut self, handle: &str) -> anyhow::Result<Value> {
        self.send(json!({"type": "authenticate", "handle": handle}))
            .await?;
        self.recv().await
    }

    /// Join a room and return the `room_joined` event.
    pub async fn join(&mut self, room: &str) -> anyhow::Result<Value> {
        self.send(json!({"type": "join_room", "roomName": room}))
            .await?;
        self.recv_until("room_joined").await
    }

    /// Send a message with an explicit logical timestamp and return the
    /// `message_sent` confirmation.
    pub async fn send_message(&mut self, content: &str, ts: i64) -> anyhow::Result<Value> {
        self.send(json!({"type": "send_message", "content": content, "timestamp": ts}))
            .await?;
        self.recv_until("message_sent").await
    }

    /// Load a history page and return the `messages_loaded` event.
    pub async fn load_messages(&mut self, page: u32, page_size: u32) -> anyhow::Result<Value> {
        self.send(json!({"type": "load_messages", "page": page, "pageSize": page_size}))
            .await?;
        self.recv_until("messages_loaded").await
    }

    /// Close the connection.
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}
