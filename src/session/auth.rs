//! Authentication handler.

use super::{AuthCtx, Session};
use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::{ServerEvent, validate_handle};
use tracing::info;

impl Session {
    /// Bind this connection to a participant identity.
    ///
    /// The handle is case-normalized before the uniqueness check, so "Alice"
    /// and "alice" are the same identity and cannot be connected twice. The
    /// registry bind happens before the participant row is created; if the
    /// store fails, the bind is rolled back so no half-authenticated state
    /// survives.
    pub(super) async fn authenticate(&mut self, handle: &str) -> ProtocolResult<()> {
        if let Some(existing) = &self.auth {
            return Err(ProtocolError::AlreadyAuthenticated(existing.handle.clone()));
        }

        let normalized = validate_handle(handle)?;

        if !self.hub.sessions.bind(&normalized, self.conn_id) {
            return Err(ProtocolError::DuplicateSession(normalized));
        }

        let participant = match self.hub.db.participants().get_or_create(&normalized).await {
            Ok(participant) => participant,
            Err(e) => {
                self.hub.sessions.release(&normalized, self.conn_id);
                return Err(e.into());
            }
        };

        info!(conn_id = %self.conn_id, handle = %normalized, id = participant.id, "Authenticated");

        self.auth = Some(AuthCtx {
            participant_id: participant.id,
            handle: normalized.clone(),
        });
        self.emit(ServerEvent::Authenticated {
            handle: normalized,
            id: participant.id,
        })
        .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::{ClientEvent, ServerEvent};
    use crate::session::tests::{connect, test_hub};

    #[tokio::test]
    async fn authenticate_normalizes_and_confirms() {
        let hub = test_hub().await;
        let mut conn = connect(&hub);

        conn.auth("Alice").await;

        match conn.next() {
            ServerEvent::Authenticated { handle, id } => {
                assert_eq!(handle, "alice");
                assert!(id > 0);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_handles_get_auth_error() {
        let hub = test_hub().await;
        let mut conn = connect(&hub);

        for bad in ["ab", "way_too_long_for_a_handle", "sp ace"] {
            conn.auth(bad).await;
            assert!(
                matches!(conn.next(), ServerEvent::AuthError { .. }),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn duplicate_session_is_case_insensitive() {
        let hub = test_hub().await;
        let mut first = connect(&hub);
        let mut second = connect(&hub);

        first.auth("alice").await;
        first.drain();

        second.auth("Alice").await;
        match second.next() {
            ServerEvent::AuthError { error } => {
                assert!(error.contains("already connected"), "got: {error}");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_authenticate_on_same_connection_is_rejected() {
        let hub = test_hub().await;
        let mut conn = connect(&hub);

        conn.auth("alice").await;
        conn.drain();
        conn.auth("alice2").await;

        assert!(matches!(conn.next(), ServerEvent::AuthError { .. }));
        // The original binding is unaffected.
        assert!(hub.sessions.conn_of("alice").is_some());
        assert!(hub.sessions.conn_of("alice2").is_none());
    }

    #[tokio::test]
    async fn same_participant_row_across_reconnects() {
        let hub = test_hub().await;

        let mut first = connect(&hub);
        first.auth("alice").await;
        let first_id = match first.next() {
            ServerEvent::Authenticated { id, .. } => id,
            other => panic!("unexpected event: {other:?}"),
        };
        first.session.disconnect().await;

        let mut second = connect(&hub);
        second.auth("ALICE").await;
        match second.next() {
            ServerEvent::Authenticated { id, .. } => assert_eq!(id, first_id),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_authenticate_leaves_no_binding() {
        let hub = test_hub().await;
        let mut conn = connect(&hub);

        conn.session
            .handle_event(ClientEvent::Authenticate {
                handle: "no".to_string(),
            })
            .await;
        conn.drain();

        assert!(hub.sessions.conn_of("no").is_none());
    }
}
