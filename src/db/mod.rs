//! Database module for persistent storage.
//!
//! Provides async SQLite access using SQLx for:
//! - Participants (created on first authentication)
//! - Rooms (the room directory, including soft-delete tombstones)
//! - Messages (the paginated message ledger)
//!
//! The store is configured for one concurrent writer with many concurrent
//! readers: WAL journal mode so reads are not blocked by writes.

mod messages;
mod participants;
mod rooms;

pub use messages::{DeliveryStatus, HistoryEntry, Message, MessagePage, MessageRepository};
pub use participants::{Participant, ParticipantRepository};
pub use rooms::{Room, RoomRepository};

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),
    #[error("room already exists: {0}")]
    RoomExists(String),
    #[error("invalid room name")]
    RoomNameInvalid,
    #[error("room not found: {0}")]
    RoomNotFound(i64),
    #[error("message not found: {0}")]
    MessageNotFound(i64),
    #[error("permission denied")]
    PermissionDenied,
    #[error("invalid message content")]
    ContentInvalid,
    #[error("invalid message timestamp")]
    TimestampInvalid,
    #[error("retry budget exhausted for message {0}")]
    RetryExhausted(i64),
    #[error("internal error: {0}")]
    Internal(String),
}

/// Schema statements applied at startup. Idempotent; the length, range, and
/// status checks here are the durable invariants of the data model.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS participants (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        handle         TEXT    NOT NULL UNIQUE
                       CHECK (length(handle) BETWEEN 3 AND 20),
        created_at     INTEGER NOT NULL,
        last_active_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS rooms (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        name       TEXT    NOT NULL UNIQUE
                   CHECK (length(name) BETWEEN 3 AND 50),
        creator_id INTEGER NOT NULL REFERENCES participants(id),
        created_at INTEGER NOT NULL,
        deleted_at INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        room_id     INTEGER NOT NULL REFERENCES rooms(id),
        sender_id   INTEGER NOT NULL REFERENCES participants(id),
        content     TEXT    NOT NULL
                    CHECK (length(content) BETWEEN 1 AND 2000),
        client_ts   INTEGER NOT NULL CHECK (client_ts > 0),
        status      TEXT    NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'sent', 'failed')),
        retry_count INTEGER NOT NULL DEFAULT 0
                    CHECK (retry_count BETWEEN 0 AND 3),
        created_at  INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_messages_room_ts ON messages (room_id, client_ts DESC)",
    "CREATE INDEX IF NOT EXISTS idx_rooms_active ON rooms (created_at DESC) WHERE deleted_at IS NULL",
];

/// Database handle with connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connection acquire timeout - prevents connection storms from blocking indefinitely.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Open (or create) a database, apply the schema, and configure pragmas.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let pool = if path == ":memory:" {
            // Use a uniquely named shared-cache memory database per call.
            // `file::memory:` is global-ish and will collide across parallel tests.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let memdb_uri = format!(
                "file:chatterd-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );

            let options = SqliteConnectOptions::new()
                .filename(&memdb_uri)
                .shared_cache(true)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                tracing::warn!(path = %parent.display(), error = %e, "Failed to create database directory");
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .test_before_acquire(true)
                .connect_with(options)
                .await?
        };

        info!(path = %path, "Database connected");

        // WAL mode allows reads to happen while writes are in progress.
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        // The messages table references participants and rooms.
        sqlx::query("PRAGMA foreign_keys=ON").execute(&pool).await?;

        // NORMAL is durable across application crashes and faster than FULL.
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(&pool)
            .await?;

        Self::apply_schema(&pool).await?;

        // Catch silent corruption from prior crashes before serving traffic.
        let integrity_result: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&pool)
            .await?;

        if integrity_result != "ok" {
            tracing::error!(
                integrity_check = %integrity_result,
                "Database integrity check FAILED - corruption detected!"
            );
            return Err(DbError::Internal(format!(
                "database integrity check failed: {integrity_result}"
            )));
        }

        Ok(Self { pool })
    }

    /// Get reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply the embedded schema statements.
    async fn apply_schema(pool: &SqlitePool) -> Result<(), DbError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(pool).await?;
        }
        info!("Database schema checked/applied");
        Ok(())
    }

    /// Get participant repository.
    pub fn participants(&self) -> ParticipantRepository<'_> {
        ParticipantRepository::new(&self.pool)
    }

    /// Get room repository.
    pub fn rooms(&self) -> RoomRepository<'_> {
        RoomRepository::new(&self.pool)
    }

    /// Get message repository.
    pub fn messages(&self) -> MessageRepository<'_> {
        MessageRepository::new(&self.pool)
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DbError::Sqlx(err)
    }
}
