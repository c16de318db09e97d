//! Room directory repository.
//!
//! Rooms are soft-deleted: deletion sets a tombstone timestamp and hides the
//! room from active listings and joins, but leaves its messages untouched.
//! Names are case-sensitive and are not released by a soft delete; `restore`
//! is the recovery path for a tombstoned name.

use crate::db::DbError;
use sqlx::SqlitePool;

/// A room record. `deleted_at` is the tombstone; `None` means active.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub creator_id: i64,
    pub created_at: i64,
    pub deleted_at: Option<i64>,
}

impl Room {
    /// Whether the room is tombstoned.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

type RoomRow = (i64, String, i64, i64, Option<i64>);

fn row_to_room(row: RoomRow) -> Room {
    let (id, name, creator_id, created_at, deleted_at) = row;
    Room {
        id,
        name,
        creator_id,
        created_at,
        deleted_at,
    }
}

/// Repository for room directory operations.
pub struct RoomRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RoomRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a room.
    ///
    /// Fails with `RoomNameInvalid` on a malformed name and `RoomExists` when
    /// any row, tombstoned or active, already holds the exact name.
    pub async fn create(&self, name: &str, creator_id: i64) -> Result<Room, DbError> {
        if crate::protocol::validate_room_name(name).is_err() {
            return Err(DbError::RoomNameInvalid);
        }

        if self.find_by_name(name).await?.is_some() {
            return Err(DbError::RoomExists(name.to_string()));
        }

        let now = chrono::Utc::now().timestamp();

        let result =
            sqlx::query("INSERT INTO rooms (name, creator_id, created_at) VALUES (?, ?, ?)")
                .bind(name)
                .bind(creator_id)
                .bind(now)
                .execute(self.pool)
                .await?;

        Ok(Room {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            creator_id,
            created_at: now,
            deleted_at: None,
        })
    }

    /// Find a room by exact name. Tombstoned rooms are returned too.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Room>, DbError> {
        let row: Option<RoomRow> = sqlx::query_as(
            "SELECT id, name, creator_id, created_at, deleted_at FROM rooms WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(row_to_room))
    }

    /// Find a room by id. Tombstoned rooms are returned too.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Room>, DbError> {
        let row: Option<RoomRow> = sqlx::query_as(
            "SELECT id, name, creator_id, created_at, deleted_at FROM rooms WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(row_to_room))
    }

    /// List active rooms, newest first.
    pub async fn list_active(&self) -> Result<Vec<Room>, DbError> {
        let rows: Vec<RoomRow> = sqlx::query_as(
            r#"
            SELECT id, name, creator_id, created_at, deleted_at
            FROM rooms
            WHERE deleted_at IS NULL
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(row_to_room).collect())
    }

    /// Tombstone a room. Creator-only; messages are left intact.
    ///
    /// Returns false when the room does not exist. Already-tombstoned rooms
    /// keep their original tombstone timestamp.
    pub async fn soft_delete(&self, id: i64, requester_id: i64) -> Result<bool, DbError> {
        let Some(room) = self.find_by_id(id).await? else {
            return Ok(false);
        };

        if room.creator_id != requester_id {
            return Err(DbError::PermissionDenied);
        }

        let now = chrono::Utc::now().timestamp();
        sqlx::query("UPDATE rooms SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
            .bind(now)
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(true)
    }

    /// Clear a room's tombstone. Returns whether a row was restored.
    pub async fn restore(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("UPDATE rooms SET deleted_at = NULL WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
