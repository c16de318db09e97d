//! Room lifecycle handlers: join, leave, create, delete.

use super::{AuthCtx, Session};
use crate::db::{DbError, Room};
use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::{MessagePayload, ServerEvent, validate_room_name};
use tracing::info;

impl Session {
    /// Join a room, creating it implicitly when the name is unknown.
    ///
    /// A connection already in another room is moved: the old room gets a
    /// departure notice and the caller a leave confirmation before the join
    /// confirmation. Tombstoned rooms cannot be joined.
    pub(super) async fn join_room(&mut self, room_name: &str) -> ProtocolResult<()> {
        let auth = self.require_auth()?;
        validate_room_name(room_name)?;

        let room = match self.hub.db.rooms().find_by_name(room_name).await? {
            Some(room) if room.is_deleted() => {
                return Err(ProtocolError::RoomGone(room.name));
            }
            Some(room) => room,
            None => self.implicit_create(room_name, &auth).await?,
        };

        // Implicit leave of the current room, if any. Unconditional and
        // silent to the switching user apart from the leave confirmation.
        let previous = self.hub.presence.current_room_of(&auth.handle);
        let rejoin = previous == Some(room.id);
        if let Some(previous) = previous
            && !rejoin
        {
            self.depart_room(previous, &auth).await?;
        }

        self.hub.presence.join(room.id, &auth.handle);

        let page = self
            .hub
            .db
            .messages()
            .page(room.id, self.hub.history_page_size, 0)
            .await?;
        let members = self.hub.presence.members_of(room.id);

        info!(conn_id = %self.conn_id, handle = %auth.handle, room = %room.name, "Joined room");

        self.emit(ServerEvent::RoomJoined {
            room_id: room.id,
            room_name: room.name.clone(),
            members,
            messages: page
                .messages
                .into_iter()
                .map(|m| MessagePayload {
                    message_id: m.id,
                    content: m.content,
                    handle: m.handle,
                    timestamp: m.client_ts,
                })
                .collect(),
        })
        .await;

        // Rejoining the current room refreshes the caller's view without
        // spamming the room with a join notice.
        if !rejoin {
            self.hub
                .broadcast_to_room(
                    room.id,
                    ServerEvent::UserJoined {
                        handle: auth.handle.clone(),
                        room_name: room.name,
                    },
                    Some(&auth.handle),
                )
                .await;
        }

        Ok(())
    }

    /// Leave the current room.
    pub(super) async fn leave_room(&mut self) -> ProtocolResult<()> {
        let (auth, room_id) = self.require_room()?;
        self.depart_room(room_id, &auth).await
    }

    /// Create a room without joining it.
    pub(super) async fn create_room(&mut self, room_name: &str) -> ProtocolResult<()> {
        let auth = self.require_auth()?;

        let room = self
            .hub
            .db
            .rooms()
            .create(room_name, auth.participant_id)
            .await?;

        info!(conn_id = %self.conn_id, handle = %auth.handle, room = %room.name, "Created room");

        self.emit(ServerEvent::RoomCreated {
            room_id: room.id,
            room_name: room.name,
            creator: auth.handle,
        })
        .await;
        Ok(())
    }

    /// Soft-delete a room. Creator-only.
    ///
    /// Every present member is notified and forcibly evicted: their room
    /// state is cleared, their authentication is not.
    pub(super) async fn delete_room(&mut self, room_id: i64) -> ProtocolResult<()> {
        let auth = self.require_auth()?;

        let room = self
            .hub
            .db
            .rooms()
            .find_by_id(room_id)
            .await?
            .ok_or(ProtocolError::RoomNotFound)?;

        if !self
            .hub
            .db
            .rooms()
            .soft_delete(room_id, auth.participant_id)
            .await?
        {
            return Err(ProtocolError::RoomNotFound);
        }

        let evicted = self.hub.presence.clear_room(room_id);

        info!(
            conn_id = %self.conn_id,
            handle = %auth.handle,
            room = %room.name,
            evicted = evicted.len(),
            "Deleted room"
        );

        let notice = ServerEvent::RoomDeleted {
            room_id,
            room_name: room.name,
        };
        for handle in &evicted {
            self.hub.send_to_handle(handle, notice.clone()).await;
        }
        // Confirmation for a creator deleting from outside the room.
        if !evicted.contains(&auth.handle) {
            self.emit(notice).await;
        }

        Ok(())
    }

    /// Implicit room creation on first join of an unknown name. A concurrent
    /// join can win the insert race; fall back to the winner's row.
    async fn implicit_create(&self, room_name: &str, auth: &AuthCtx) -> ProtocolResult<Room> {
        match self
            .hub
            .db
            .rooms()
            .create(room_name, auth.participant_id)
            .await
        {
            Ok(room) => Ok(room),
            Err(DbError::RoomExists(_)) => {
                let room = self
                    .hub
                    .db
                    .rooms()
                    .find_by_name(room_name)
                    .await?
                    .ok_or(ProtocolError::RoomNotFound)?;
                if room.is_deleted() {
                    return Err(ProtocolError::RoomGone(room.name));
                }
                Ok(room)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Shared departure path for explicit leave and room switches: presence
    /// removal, leave confirmation to the caller, notice to the room.
    async fn depart_room(&mut self, room_id: i64, auth: &AuthCtx) -> ProtocolResult<()> {
        let room = self
            .hub
            .db
            .rooms()
            .find_by_id(room_id)
            .await?
            .ok_or(ProtocolError::RoomNotFound)?;

        self.hub.presence.leave(room_id, &auth.handle);

        self.emit(ServerEvent::RoomLeft {
            room_name: room.name.clone(),
        })
        .await;
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
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::{ClientEvent, ServerEvent};
    use crate::session::tests::{connect, test_hub};

    #[tokio::test]
    async fn join_creates_room_implicitly_and_returns_history() {
        let hub = test_hub().await;
        let mut conn = connect(&hub);
        conn.auth("alice").await;
        conn.drain();

        conn.join("general").await;

        match conn.next() {
            ServerEvent::RoomJoined {
                room_name,
                members,
                messages,
                ..
            } => {
                assert_eq!(room_name, "general");
                assert_eq!(members, vec!["alice"]);
                assert!(messages.is_empty());
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let room = hub
            .db
            .rooms()
            .find_by_name("general")
            .await
            .expect("query")
            .expect("created");
        assert!(!room.is_deleted());
    }

    #[tokio::test]
    async fn join_notifies_existing_members_only() {
        let hub = test_hub().await;
        let mut alice = connect(&hub);
        let mut bob = connect(&hub);
        alice.auth("alice").await;
        bob.auth("bob").await;
        alice.join("general").await;
        alice.drain();
        bob.drain();

        bob.join("general").await;

        assert!(matches!(
            alice.next(),
            ServerEvent::UserJoined { handle, .. } if handle == "bob"
        ));
        // Bob himself only sees the join confirmation.
        match bob.next() {
            ServerEvent::RoomJoined { members, .. } => {
                assert_eq!(members, vec!["alice", "bob"]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(bob.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn switching_rooms_emits_leave_before_join() {
        let hub = test_hub().await;
        let mut alice = connect(&hub);
        let mut bob = connect(&hub);
        alice.auth("alice").await;
        bob.auth("bob").await;
        alice.join("general").await;
        bob.join("general").await;
        alice.drain();
        bob.drain();

        bob.join("random").await;

        // Caller: leave confirmation strictly before join confirmation.
        assert!(matches!(
            bob.next(),
            ServerEvent::RoomLeft { room_name } if room_name == "general"
        ));
        assert!(matches!(
            bob.next(),
            ServerEvent::RoomJoined { room_name, .. } if room_name == "random"
        ));

        // Old room: departure notice.
        assert!(matches!(
            alice.next(),
            ServerEvent::UserLeft { handle, room_name }
                if handle == "bob" && room_name == "general"
        ));

        // Single-room invariant after the switch.
        let random = hub.db.rooms().find_by_name("random").await.expect("q").expect("r");
        assert_eq!(hub.presence.current_room_of("bob"), Some(random.id));
    }

    #[tokio::test]
    async fn tombstoned_room_cannot_be_joined() {
        let hub = test_hub().await;
        let mut alice = connect(&hub);
        alice.auth("alice").await;
        alice.join("doomed").await;
        alice.drain();

        let room = hub.db.rooms().find_by_name("doomed").await.expect("q").expect("r");
        alice
            .session
            .handle_event(ClientEvent::DeleteRoom { room_id: room.id })
            .await;
        alice.drain();

        let mut bob = connect(&hub);
        bob.auth("bob").await;
        bob.drain();
        bob.join("doomed").await;

        match bob.next() {
            ServerEvent::Error { message } => {
                assert!(message.contains("deleted"), "got: {message}");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_room_rejects_duplicates_and_does_not_join() {
        let hub = test_hub().await;
        let mut conn = connect(&hub);
        conn.auth("alice").await;
        conn.drain();

        conn.session
            .handle_event(ClientEvent::CreateRoom {
                room_name: "general".to_string(),
            })
            .await;
        assert!(matches!(
            conn.next(),
            ServerEvent::RoomCreated { room_name, creator, .. }
                if room_name == "general" && creator == "alice"
        ));
        assert_eq!(hub.presence.current_room_of("alice"), None);

        conn.session
            .handle_event(ClientEvent::CreateRoom {
                room_name: "general".to_string(),
            })
            .await;
        assert!(matches!(conn.next(), ServerEvent::Error { .. }));
    }

    #[tokio::test]
    async fn delete_room_is_creator_only() {
        let hub = test_hub().await;
        let mut alice = connect(&hub);
        let mut bob = connect(&hub);
        alice.auth("alice").await;
        bob.auth("bob").await;
        alice.join("general").await;
        alice.drain();
        bob.drain();

        let room = hub.db.rooms().find_by_name("general").await.expect("q").expect("r");

        bob.session
            .handle_event(ClientEvent::DeleteRoom { room_id: room.id })
            .await;
        assert!(matches!(bob.next(), ServerEvent::Error { .. }));

        let room = hub.db.rooms().find_by_id(room.id).await.expect("q").expect("r");
        assert!(!room.is_deleted(), "rejected delete must not apply");
    }

    #[tokio::test]
    async fn delete_room_evicts_and_notifies_members() {
        let hub = test_hub().await;
        let mut alice = connect(&hub);
        let mut bob = connect(&hub);
        alice.auth("alice").await;
        bob.auth("bob").await;
        alice.join("general").await;
        bob.join("general").await;
        alice.drain();
        bob.drain();

        let room = hub.db.rooms().find_by_name("general").await.expect("q").expect("r");
        alice
            .session
            .handle_event(ClientEvent::DeleteRoom { room_id: room.id })
            .await;

        for conn in [&mut alice, &mut bob] {
            assert!(matches!(
                conn.next(),
                ServerEvent::RoomDeleted { room_name, .. } if room_name == "general"
            ));
        }

        // Evicted back to Authenticated: no room, but still able to act.
        assert_eq!(hub.presence.current_room_of("alice"), None);
        assert_eq!(hub.presence.current_room_of("bob"), None);
        bob.join("random").await;
        assert!(matches!(bob.next(), ServerEvent::RoomJoined { .. }));
    }

    #[tokio::test]
    async fn delete_unknown_room_is_not_found() {
        let hub = test_hub().await;
        let mut conn = connect(&hub);
        conn.auth("alice").await;
        conn.drain();

        conn.session
            .handle_event(ClientEvent::DeleteRoom { room_id: 404 })
            .await;
        assert!(matches!(conn.next(), ServerEvent::Error { .. }));
    }
}
