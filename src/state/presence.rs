//! Presence tracking.
//!
//! A bidirectional map of room occupancy, guarded by one mutex so the
//! single-active-room invariant holds under concurrent joins: moving a handle
//! between rooms is a single atomic check-and-set, never a window where the
//! handle is in two rooms or none.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
struct PresenceInner {
    /// room id -> occupant handles
    rooms: HashMap<i64, HashSet<String>>,
    /// handle -> room id
    by_handle: HashMap<String, i64>,
}

/// Ephemeral room occupancy. Constructed once per process and injected;
/// purely in-memory, no failure modes beyond no-ops on absent state.
#[derive(Default)]
pub struct PresenceTracker {
    inner: Mutex<PresenceInner>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `handle` in `room_id`, vacating any other room first.
    ///
    /// Returns the vacated room id so the caller can broadcast a departure,
    /// or `None` when this is the handle's first join. Re-joining the current
    /// room is a no-op returning `None`.
    pub fn join(&self, room_id: i64, handle: &str) -> Option<i64> {
        let mut inner = self.inner.lock();

        let previous = match inner.by_handle.insert(handle.to_string(), room_id) {
            Some(prev) if prev != room_id => {
                if let Some(occupants) = inner.rooms.get_mut(&prev) {
                    occupants.remove(handle);
                    if occupants.is_empty() {
                        inner.rooms.remove(&prev);
                    }
                }
                Some(prev)
            }
            _ => None,
        };

        inner
            .rooms
            .entry(room_id)
            .or_default()
            .insert(handle.to_string());

        previous
    }

    /// Remove `handle` from `room_id`. Returns whether it was present.
    /// The last occupant leaving removes the room's presence set entirely.
    pub fn leave(&self, room_id: i64, handle: &str) -> bool {
        let mut inner = self.inner.lock();

        if inner.by_handle.get(handle) != Some(&room_id) {
            return false;
        }
        inner.by_handle.remove(handle);

        if let Some(occupants) = inner.rooms.get_mut(&room_id) {
            occupants.remove(handle);
            if occupants.is_empty() {
                inner.rooms.remove(&room_id);
            }
        }
        true
    }

    /// Sorted occupant handles. Empty for an unknown or empty room.
    pub fn members_of(&self, room_id: i64) -> Vec<String> {
        let inner = self.inner.lock();
        let mut members: Vec<String> = inner
            .rooms
            .get(&room_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        members.sort_unstable();
        members
    }

    /// The room a handle currently occupies, if any.
    pub fn current_room_of(&self, handle: &str) -> Option<i64> {
        self.inner.lock().by_handle.get(handle).copied()
    }

    /// Evict every occupant of a room (room deletion). Returns who was
    /// evicted, sorted.
    pub fn clear_room(&self, room_id: i64) -> Vec<String> {
        let mut inner = self.inner.lock();
        let mut evicted: Vec<String> = inner
            .rooms
            .remove(&room_id)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        for handle in &evicted {
            inner.by_handle.remove(handle);
        }
        evicted.sort_unstable();
        evicted
    }
}
