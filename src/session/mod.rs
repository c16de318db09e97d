//! Session protocol - the per-connection state machine.
//!
//! A connection moves `Unauthenticated -> Authenticated`; "in a room" is not
//! stored here but derived from the presence tracker, which keeps a single
//! source of truth for membership and makes forcible eviction (room deletion)
//! take effect on every bound connection at once.
//!
//! Events are dispatched strictly one at a time per connection: the network
//! read loop awaits each handler before reading the next frame, so handlers
//! never race against themselves.

mod auth;
mod messaging;
mod rooms;

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::{ClientEvent, ServerEvent};
use crate::state::Hub;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

/// Authenticated identity bound to a connection.
#[derive(Debug, Clone)]
pub struct AuthCtx {
    pub participant_id: i64,
    /// Case-normalized handle.
    pub handle: String,
}

/// Per-connection protocol state and event handlers.
pub struct Session {
    conn_id: Uuid,
    hub: Arc<Hub>,
    outbound: mpsc::Sender<ServerEvent>,
    auth: Option<AuthCtx>,
}

impl Session {
    /// Create a session for a fresh connection and register its outbound
    /// queue with the hub.
    pub fn new(conn_id: Uuid, hub: Arc<Hub>, outbound: mpsc::Sender<ServerEvent>) -> Self {
        hub.register_sender(conn_id, outbound.clone());
        Self {
            conn_id,
            hub,
            outbound,
            auth: None,
        }
    }

    /// Handle one client event to completion.
    ///
    /// Every rejection is converted to a structured event for this connection
    /// only; handlers never leave partial state behind on failure.
    pub async fn handle_event(&mut self, event: ClientEvent) {
        let auth_phase = matches!(event, ClientEvent::Authenticate { .. });

        if let Err(err) = self.dispatch(event).await {
            match &err {
                ProtocolError::Storage(cause) => {
                    error!(conn_id = %self.conn_id, error = %cause, "Storage failure");
                }
                other => {
                    debug!(conn_id = %self.conn_id, code = other.error_code(), "Rejected event");
                }
            }
            self.emit(err.to_event(auth_phase)).await;
        }
    }

    async fn dispatch(&mut self, event: ClientEvent) -> ProtocolResult<()> {
        match event {
            ClientEvent::Authenticate { handle } => self.authenticate(&handle).await,
            ClientEvent::JoinRoom { room_name } => self.join_room(&room_name).await,
            ClientEvent::LeaveRoom => self.leave_room().await,
            ClientEvent::CreateRoom { room_name } => self.create_room(&room_name).await,
            ClientEvent::DeleteRoom { room_id } => self.delete_room(room_id).await,
            ClientEvent::SendMessage { content, timestamp } => {
                self.send_message(&content, timestamp).await
            }
            ClientEvent::LoadMessages { page, page_size } => {
                self.load_messages(page, page_size).await
            }
        }
    }

    /// Full teardown: implicit leave, handle release, sender removal.
    pub async fn disconnect(&mut self) {
        if let Some(auth) = self.auth.take() {
            if let Some(room_id) = self.hub.presence.current_room_of(&auth.handle) {
                self.hub.presence.leave(room_id, &auth.handle);
                match self.hub.db.rooms().find_by_id(room_id).await {
                    Ok(Some(room)) => {
                        self.hub
                            .broadcast_to_room(
                                room_id,
                                ServerEvent::UserLeft {
                                    handle: auth.handle.clone(),
                                    room_name: room.name,
                                },
                                None,
                            )
                            .await;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!(conn_id = %self.conn_id, error = %e, "Departure broadcast lookup failed");
                    }
                }
            }
            self.hub.sessions.release(&auth.handle, self.conn_id);
        }
        self.hub.unregister_sender(self.conn_id);
    }

    /// Push an event to this connection. A failed push means the connection
    /// is going away; the disconnect path will clean up.
    async fn emit(&self, event: ServerEvent) {
        if self.outbound.send(event).await.is_err() {
            debug!(conn_id = %self.conn_id, "Outbound queue closed");
        }
    }

    fn require_auth(&self) -> ProtocolResult<AuthCtx> {
        self.auth.clone().ok_or(ProtocolError::NotAuthenticated)
    }

    /// The authenticated identity plus the room it currently occupies.
    fn require_room(&self) -> ProtocolResult<(AuthCtx, i64)> {
        let auth = self.require_auth()?;
        let room_id = self
            .hub
            .presence
            .current_room_of(&auth.handle)
            .ok_or(ProtocolError::NotInRoom)?;
        Ok((auth, room_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    pub(crate) struct TestConn {
        pub session: Session,
        pub rx: mpsc::Receiver<ServerEvent>,
    }

    pub(crate) async fn test_hub() -> Arc<Hub> {
        let db = Database::new(":memory:").await.expect("open");
        Arc::new(Hub::new(db, 50))
    }

    pub(crate) fn connect(hub: &Arc<Hub>) -> TestConn {
        let (tx, rx) = mpsc::channel(64);
        let session = Session::new(Uuid::new_v4(), Arc::clone(hub), tx);
        TestConn { session, rx }
    }

    impl TestConn {
        pub async fn auth(&mut self, handle: &str) {
            self.session
                .handle_event(ClientEvent::Authenticate {
                    handle: handle.to_string(),
                })
                .await;
        }

        pub async fn join(&mut self, room: &str) {
            self.session
                .handle_event(ClientEvent::JoinRoom {
                    room_name: room.to_string(),
                })
                .await;
        }

        pub fn next(&mut self) -> ServerEvent {
            self.rx.try_recv().expect("expected a queued event")
        }

        pub fn drain(&mut self) {
            while self.rx.try_recv().is_ok() {}
        }
    }

    #[tokio::test]
    async fn unauthenticated_operations_are_gated() {
        let hub = test_hub().await;
        let mut conn = connect(&hub);

        conn.session
            .handle_event(ClientEvent::JoinRoom {
                room_name: "general".to_string(),
            })
            .await;

        assert!(matches!(conn.next(), ServerEvent::Error { .. }));
    }

    #[tokio::test]
    async fn room_operations_require_membership() {
        let hub = test_hub().await;
        let mut conn = connect(&hub);
        conn.auth("alice").await;
        conn.drain();

        conn.session
            .handle_event(ClientEvent::SendMessage {
                content: "hi".to_string(),
                timestamp: None,
            })
            .await;
        assert!(matches!(conn.next(), ServerEvent::Error { .. }));

        conn.session.handle_event(ClientEvent::LeaveRoom).await;
        assert!(matches!(conn.next(), ServerEvent::Error { .. }));
    }

    #[tokio::test]
    async fn disconnect_releases_handle_and_broadcasts_departure() {
        let hub = test_hub().await;
        let mut alice = connect(&hub);
        let mut bob = connect(&hub);

        alice.auth("alice").await;
        bob.auth("bob").await;
        alice.join("general").await;
        bob.join("general").await;
        alice.drain();
        bob.drain();

        alice.session.disconnect().await;

        assert!(matches!(
            bob.next(),
            ServerEvent::UserLeft { handle, room_name }
                if handle == "alice" && room_name == "general"
        ));

        // Handle is free again for a new connection.
        let mut alice2 = connect(&hub);
        alice2.auth("alice").await;
        assert!(matches!(alice2.next(), ServerEvent::Authenticated { .. }));
    }
}
