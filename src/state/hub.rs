//! The Hub - central shared state for the chat server.
//!
//! The Hub owns the presence tracker, the session registry, the per-connection
//! outbound senders, and the database handle. It is constructed once in main
//! and passed by `Arc` to every connection task; nothing here is ambient or
//! static.

use crate::db::Database;
use crate::protocol::ServerEvent;
use crate::state::{PresenceTracker, SessionRegistry};
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Outcome of a room fan-out. Fan-out is best-effort: a failed push to one
/// member rolls nothing back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanoutOutcome {
    /// Members the event was addressed to (excluding the excluded handle).
    pub recipients: usize,
    /// Pushes that were accepted by a live connection queue.
    pub delivered: usize,
}

/// Central shared state container.
pub struct Hub {
    /// Durable store.
    pub db: Database,
    /// Room occupancy.
    pub presence: PresenceTracker,
    /// Handle -> live connection bindings.
    pub sessions: SessionRegistry,
    /// Outbound event queues, indexed by connection id.
    senders: DashMap<Uuid, mpsc::Sender<ServerEvent>>,
    /// Page size for the history page sent on join.
    pub history_page_size: u32,
}

impl Hub {
    pub fn new(db: Database, history_page_size: u32) -> Self {
        Self {
            db,
            presence: PresenceTracker::new(),
            sessions: SessionRegistry::new(),
            senders: DashMap::new(),
            history_page_size,
        }
    }

    /// Register a connection's outbound queue.
    pub fn register_sender(&self, conn_id: Uuid, sender: mpsc::Sender<ServerEvent>) {
        self.senders.insert(conn_id, sender);
    }

    /// Drop a connection's outbound queue.
    pub fn unregister_sender(&self, conn_id: Uuid) {
        self.senders.remove(&conn_id);
    }

    /// Push an event to a specific connection. Returns whether the push was
    /// accepted.
    pub async fn send_to_conn(&self, conn_id: Uuid, event: ServerEvent) -> bool {
        let sender = self.senders.get(&conn_id).map(|s| s.value().clone());
        match sender {
            Some(sender) => sender.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Push an event to whichever connection currently holds a handle.
    pub async fn send_to_handle(&self, handle: &str, event: ServerEvent) -> bool {
        match self.sessions.conn_of(handle) {
            Some(conn_id) => self.send_to_conn(conn_id, event).await,
            None => false,
        }
    }

    /// Fan an event out to every member of a room, optionally excluding one
    /// handle (usually the originator).
    pub async fn broadcast_to_room(
        &self,
        room_id: i64,
        event: ServerEvent,
        exclude: Option<&str>,
    ) -> FanoutOutcome {
        let mut outcome = FanoutOutcome {
            recipients: 0,
            delivered: 0,
        };

        for handle in self.presence.members_of(room_id) {
            if exclude.is_some_and(|e| e == handle) {
                continue;
            }
            outcome.recipients += 1;
            if self.send_to_handle(&handle, event.clone()).await {
                outcome.delivered += 1;
            } else {
                tracing::warn!(room_id, handle = %handle, "Broadcast push failed");
            }
        }

        outcome
    }
}
