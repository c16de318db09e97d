//! Participant repository.
//!
//! Participants are created on first successful authentication and never
//! deleted. Handles arrive here already case-normalized by the protocol
//! layer; the unique constraint operates on the normalized form.

use crate::db::DbError;
use sqlx::SqlitePool;

/// A registered participant.
#[derive(Debug, Clone)]
pub struct Participant {
    pub id: i64,
    pub handle: String,
    pub created_at: i64,
    pub last_active_at: i64,
}

type ParticipantRow = (i64, String, i64, i64);

fn row_to_participant(row: ParticipantRow) -> Participant {
    let (id, handle, created_at, last_active_at) = row;
    Participant {
        id,
        handle,
        created_at,
        last_active_at,
    }
}

/// Repository for participant operations.
pub struct ParticipantRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ParticipantRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch a participant by handle, creating it on first sight.
    /// Refreshes `last_active_at` either way.
    pub async fn get_or_create(&self, handle: &str) -> Result<Participant, DbError> {
        let now = chrono::Utc::now().timestamp();

        if let Some(existing) = self.find_by_handle(handle).await? {
            sqlx::query("UPDATE participants SET last_active_at = ? WHERE id = ?")
                .bind(now)
                .bind(existing.id)
                .execute(self.pool)
                .await?;
            return Ok(Participant {
                last_active_at: now,
                ..existing
            });
        }

        let result = sqlx::query(
            "INSERT INTO participants (handle, created_at, last_active_at) VALUES (?, ?, ?)",
        )
        .bind(handle)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(Participant {
            id: result.last_insert_rowid(),
            handle: handle.to_string(),
            created_at: now,
            last_active_at: now,
        })
    }

    /// Find a participant by (normalized) handle.
    pub async fn find_by_handle(&self, handle: &str) -> Result<Option<Participant>, DbError> {
        let row: Option<ParticipantRow> = sqlx::query_as(
            "SELECT id, handle, created_at, last_active_at FROM participants WHERE handle = ?",
        )
        .bind(handle)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(row_to_participant))
    }

    /// Find a participant by id.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Participant>, DbError> {
        let row: Option<ParticipantRow> = sqlx::query_as(
            "SELECT id, handle, created_at, last_active_at FROM participants WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(row_to_participant))
    }
}
