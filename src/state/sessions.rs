//! Live session registry.
//!
//! Binds a case-normalized handle to the single connection currently allowed
//! to use it. The bind is an atomic check-and-set under one mutex, which is
//! what makes duplicate-session rejection race-free: two simultaneous
//! authentications for "Alice" and "alice" cannot both win.

use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

/// Handle-to-connection bindings for authenticated sessions.
#[derive(Default)]
pub struct SessionRegistry {
    bindings: Mutex<HashMap<String, Uuid>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handle` to `conn_id`.
    ///
    /// Returns false when the handle is already bound to a different live
    /// connection. Rebinding the same connection is allowed (idempotent).
    pub fn bind(&self, handle: &str, conn_id: Uuid) -> bool {
        let mut bindings = self.bindings.lock();
        match bindings.get(handle) {
            Some(existing) if *existing != conn_id => false,
            _ => {
                bindings.insert(handle.to_string(), conn_id);
                true
            }
        }
    }

    /// Release a binding, but only if it still belongs to `conn_id`.
    /// A stale disconnect must not unbind a handle that has reconnected.
    pub fn release(&self, handle: &str, conn_id: Uuid) -> bool {
        let mut bindings = self.bindings.lock();
        match bindings.get(handle) {
            Some(existing) if *existing == conn_id => {
                bindings.remove(handle);
                true
            }
            _ => false,
        }
    }

    /// The connection currently bound to a handle.
    pub fn conn_of(&self, handle: &str) -> Option<Uuid> {
        self.bindings.lock().get(handle).copied()
    }
}
