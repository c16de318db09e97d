//! Message handlers: send and history paging.

use super::Session;
use crate::db::{DbError, DeliveryStatus};
use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::{ALLOWED_PAGE_SIZES, MessagePayload, ServerEvent};
use tracing::{debug, warn};

impl Session {
    /// Persist a message and fan it out to the rest of the room.
    ///
    /// The message is appended `pending`, broadcast, then marked `sent` and
    /// confirmed to the caller. When the room has other members but not one
    /// push lands (every member queue is gone), the fan-out is re-attempted
    /// against the ledger's bounded retry budget; exhaustion marks the
    /// message `failed` and surfaces a terminal error to the caller.
    pub(super) async fn send_message(
        &mut self,
        content: &str,
        timestamp: Option<i64>,
    ) -> ProtocolResult<()> {
        let (auth, room_id) = self.require_room()?;

        let client_ts = timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

        let message = self
            .hub
            .db
            .messages()
            .append(room_id, auth.participant_id, content, client_ts)
            .await?;

        let broadcast = ServerEvent::NewMessage {
            message_id: message.id,
            content: message.content.clone(),
            handle: auth.handle.clone(),
            timestamp: message.client_ts,
        };

        let mut outcome = self
            .hub
            .broadcast_to_room(room_id, broadcast.clone(), Some(&auth.handle))
            .await;

        // Total broadcast failure consumes the retry budget before giving up.
        while outcome.recipients > 0 && outcome.delivered == 0 {
            match self.hub.db.messages().increment_retry(message.id).await {
                Ok(retry) => {
                    warn!(
                        conn_id = %self.conn_id,
                        message_id = message.id,
                        retry,
                        "Broadcast reached no member, retrying"
                    );
                    outcome = self
                        .hub
                        .broadcast_to_room(room_id, broadcast.clone(), Some(&auth.handle))
                        .await;
                }
                Err(DbError::RetryExhausted(_)) => {
                    self.hub.db.messages().mark_failed(message.id).await?;
                    return Err(ProtocolError::RetryExhausted);
                }
                Err(e) => return Err(e.into()),
            }
        }

        if outcome.recipients > outcome.delivered {
            // Best-effort fan-out: partial failure is logged, not rolled back.
            debug!(
                conn_id = %self.conn_id,
                message_id = message.id,
                recipients = outcome.recipients,
                delivered = outcome.delivered,
                "Partial broadcast delivery"
            );
        }

        self.hub.db.messages().mark_delivered(message.id).await?;

        self.emit(ServerEvent::MessageSent {
            message_id: message.id,
            content: message.content,
            handle: auth.handle,
            timestamp: message.client_ts,
            status: DeliveryStatus::Sent.to_string(),
        })
        .await;
        Ok(())
    }

    /// Return one page of the current room's history.
    pub(super) async fn load_messages(&mut self, page: u32, page_size: u32) -> ProtocolResult<()> {
        let (_, room_id) = self.require_room()?;

        if page < 1 {
            return Err(ProtocolError::PageInvalid);
        }
        if !ALLOWED_PAGE_SIZES.contains(&page_size) {
            return Err(ProtocolError::PageSizeInvalid);
        }

        let offset = (page - 1)
            .checked_mul(page_size)
            .ok_or(ProtocolError::PageInvalid)?;
        let result = self.hub.db.messages().page(room_id, page_size, offset).await?;

        self.emit(ServerEvent::MessagesLoaded {
            messages: result
                .messages
                .into_iter()
                .map(|m| MessagePayload {
                    message_id: m.id,
                    content: m.content,
                    handle: m.handle,
                    timestamp: m.client_ts,
                })
                .collect(),
            total: result.total,
            has_more: result.has_more,
        })
        .await;
        Ok(())
    }
}
