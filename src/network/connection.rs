//! Per-connection task: reads client events, writes server events.
//!
//! Inbound events are handled strictly in order: the read loop awaits each
//! handler before pulling the next frame, which is what gives the session
//! state machine its serialized, non-reentrant handling guarantee. Outbound
//! events flow through a bounded queue drained by a writer task, so broadcast
//! fan-out from other connections never blocks on this socket.

use crate::protocol::{ClientEvent, ServerEvent};
use crate::session::Session;
use crate::state::Hub;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};
use uuid::Uuid;

/// Outbound queue depth per connection. A queue that stays full means the
/// client is not draining its socket; pushes to it start failing and the
/// fan-out treats the member as unreachable.
const OUTBOUND_QUEUE: usize = 64;

/// A single client connection.
pub struct Connection {
    conn_id: Uuid,
    stream: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    hub: Arc<Hub>,
}

impl Connection {
    pub fn new(
        conn_id: Uuid,
        stream: WebSocketStream<TcpStream>,
        addr: SocketAddr,
        hub: Arc<Hub>,
    ) -> Self {
        Self {
            conn_id,
            stream,
            addr,
            hub,
        }
    }

    /// Drive the connection until the peer disconnects, then tear down.
    pub async fn run(self) -> anyhow::Result<()> {
        let (mut ws_sink, mut ws_stream) = self.stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerEvent>(OUTBOUND_QUEUE);

        let mut session = Session::new(self.conn_id, Arc::clone(&self.hub), outbound_tx.clone());

        let conn_id = self.conn_id;
        let writer = tokio::spawn(async move {
            while let Some(event) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(%conn_id, error = %e, "Failed to encode event");
                        continue;
                    }
                };
                if ws_sink.send(WsMessage::Text(text)).await.is_err() {
                    break;
                }
            }
        });

        while let Some(frame) = ws_stream.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => session.handle_event(event).await,
                    Err(e) => {
                        debug!(conn_id = %self.conn_id, error = %e, "Malformed client event");
                        let _ = outbound_tx
                            .send(ServerEvent::Error {
                                message: "malformed event".to_string(),
                            })
                            .await;
                    }
                },
                Ok(WsMessage::Close(_)) => break,
                Ok(WsMessage::Binary(_)) => {
                    let _ = outbound_tx
                        .send(ServerEvent::Error {
                            message: "binary frames are not supported".to_string(),
                        })
                        .await;
                }
                // Ping/pong are handled by the protocol layer underneath.
                Ok(_) => {}
                Err(e) => {
                    debug!(conn_id = %self.conn_id, addr = %self.addr, error = %e, "Read error");
                    break;
                }
            }
        }

        session.disconnect().await;

        // All sender clones (hub registration, session, ours) must go before
        // the writer sees end-of-queue and exits.
        drop(session);
        drop(outbound_tx);
        let _ = writer.await;

        Ok(())
    }
}
