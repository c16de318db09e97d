//! Message ledger repository.
//!
//! Messages are append-only: after insert only the delivery status and the
//! retry counter ever change. Content is stored HTML-escaped; the 1..=2000
//! length bound applies to the stored (escaped) form. Ordering is by the
//! client-supplied logical timestamp, descending, with the row id as a
//! tiebreak for same-timestamp messages.

use crate::db::DbError;
use sqlx::SqlitePool;
use std::fmt;
use std::str::FromStr;

/// Retry budget per message.
const MAX_RETRIES: i64 = 3;

/// Delivery lifecycle of a persisted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            other => Err(DbError::Internal(format!("unknown status: {other}"))),
        }
    }
}

/// A ledger row.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: i64,
    pub room_id: i64,
    pub sender_id: i64,
    /// Stored (escaped) content.
    pub content: String,
    pub client_ts: i64,
    pub status: DeliveryStatus,
    pub retry_count: i64,
    pub created_at: i64,
}

/// A history row joined with the sender's handle, as pages return it.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: i64,
    pub content: String,
    pub handle: String,
    pub client_ts: i64,
    pub status: DeliveryStatus,
}

/// One page of room history.
#[derive(Debug, Clone)]
pub struct MessagePage {
    /// Messages ordered by `client_ts` descending.
    pub messages: Vec<HistoryEntry>,
    /// Total messages in the room.
    pub total: i64,
    /// Whether rows remain past this page.
    pub has_more: bool,
}

/// Repository for message ledger operations.
pub struct MessageRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MessageRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a message in `pending` state.
    ///
    /// Trims and HTML-escapes `content`; rejects with `ContentInvalid` when
    /// the trimmed input is empty or the escaped form exceeds 2000 chars, and
    /// with `TimestampInvalid` for a non-positive logical timestamp.
    pub async fn append(
        &self,
        room_id: i64,
        sender_id: i64,
        content: &str,
        client_ts: i64,
    ) -> Result<Message, DbError> {
        if client_ts <= 0 {
            return Err(DbError::TimestampInvalid);
        }

        let escaped =
            crate::protocol::validate_content(content).map_err(|_| DbError::ContentInvalid)?;

        let now = chrono::Utc::now().timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO messages (room_id, sender_id, content, client_ts, status, retry_count, created_at)
            VALUES (?, ?, ?, ?, 'pending', 0, ?)
            "#,
        )
        .bind(room_id)
        .bind(sender_id)
        .bind(&escaped)
        .bind(client_ts)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(Message {
            id: result.last_insert_rowid(),
            room_id,
            sender_id,
            content: escaped,
            client_ts,
            status: DeliveryStatus::Pending,
            retry_count: 0,
            created_at: now,
        })
    }

    /// Mark a message `sent`. Idempotent.
    pub async fn mark_delivered(&self, id: i64) -> Result<(), DbError> {
        self.set_status(id, DeliveryStatus::Sent).await
    }

    /// Mark a message `failed`. Idempotent.
    pub async fn mark_failed(&self, id: i64) -> Result<(), DbError> {
        self.set_status(id, DeliveryStatus::Failed).await
    }

    async fn set_status(&self, id: i64, status: DeliveryStatus) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE messages SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::MessageNotFound(id));
        }
        Ok(())
    }

    /// Whether the message still has retry budget.
    pub async fn can_retry(&self, id: i64) -> Result<bool, DbError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT retry_count FROM messages WHERE id = ?")
                .bind(id)
                .fetch_optional(self.pool)
                .await?;

        match row {
            Some((count,)) => Ok(count < MAX_RETRIES),
            None => Err(DbError::MessageNotFound(id)),
        }
    }

    /// Consume one retry. Fails with `RetryExhausted` once the counter would
    /// exceed the budget. The guard is in the UPDATE itself so concurrent
    /// calls cannot overshoot.
    pub async fn increment_retry(&self, id: i64) -> Result<i64, DbError> {
        let result = sqlx::query(
            "UPDATE messages SET retry_count = retry_count + 1 WHERE id = ? AND retry_count < ?",
        )
        .bind(id)
        .bind(MAX_RETRIES)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let row: Option<(i64,)> =
                sqlx::query_as("SELECT retry_count FROM messages WHERE id = ?")
                    .bind(id)
                    .fetch_optional(self.pool)
                    .await?;
            return match row {
                Some(_) => Err(DbError::RetryExhausted(id)),
                None => Err(DbError::MessageNotFound(id)),
            };
        }

        let (count,): (i64,) = sqlx::query_as("SELECT retry_count FROM messages WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Fetch one page of a room's history, newest first.
    ///
    /// The ledger accepts any positive limit; the protocol layer restricts
    /// page sizes before calling in.
    pub async fn page(
        &self,
        room_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<MessagePage, DbError> {
        let (total,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM messages WHERE room_id = ?")
                .bind(room_id)
                .fetch_one(self.pool)
                .await?;

        let rows: Vec<(i64, String, String, i64, String)> = sqlx::query_as(
            r#"
            SELECT m.id, m.content, p.handle, m.client_ts, m.status
            FROM messages m
            JOIN participants p ON p.id = m.sender_id
            WHERE m.room_id = ?
            ORDER BY m.client_ts DESC, m.id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(room_id)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(self.pool)
        .await?;

        let mut messages = Vec::with_capacity(rows.len());
        for (id, content, handle, client_ts, status) in rows {
            messages.push(HistoryEntry {
                id,
                content,
                handle,
                client_ts,
                status: status.parse()?,
            });
        }

        let has_more = i64::from(offset) + (messages.len() as i64) < total;

        Ok(MessagePage {
            messages,
            total,
            has_more,
        })
    }
}
