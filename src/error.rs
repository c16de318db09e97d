//! Unified error handling for chatterd.
//!
//! `ProtocolError` is the session-layer taxonomy: every rejected operation
//! maps to exactly one variant, which converts to a structured wire event for
//! the originating connection. Storage errors are wrapped, logged, and
//! surfaced as a generic failure so internal text never crosses the wire.

use crate::db::DbError;
use crate::protocol::ServerEvent;
use thiserror::Error;

/// Errors that can occur while handling a client event.
#[derive(Debug, Error)]
pub enum ProtocolError {
    // Validation
    #[error("handle must be 3-20 characters: letters, digits, underscore")]
    HandleInvalid,

    #[error("room name must be 3-50 characters: letters, digits, hyphen, underscore")]
    RoomNameInvalid,

    #[error("message content must be 1-2000 characters")]
    ContentInvalid,

    #[error("timestamp must be a positive integer")]
    TimestampInvalid,

    #[error("page must be 1 or greater")]
    PageInvalid,

    #[error("page size must be one of 50, 100, 200, 500")]
    PageSizeInvalid,

    // Auth
    #[error("authentication required")]
    NotAuthenticated,

    #[error("handle {0} is already connected")]
    DuplicateSession(String),

    #[error("already authenticated as {0}")]
    AlreadyAuthenticated(String),

    // Permission
    #[error("only the room creator can do that")]
    PermissionDenied,

    // Not found
    #[error("room not found")]
    RoomNotFound,

    #[error("message not found")]
    MessageNotFound,

    // State
    #[error("join a room first")]
    NotInRoom,

    #[error("room {0} has been deleted")]
    RoomGone(String),

    #[error("room {0} already exists")]
    RoomExists(String),

    // Delivery
    #[error("message delivery failed after 3 retries")]
    RetryExhausted,

    // Storage
    #[error("storage error: {0}")]
    Storage(DbError),
}

impl ProtocolError {
    /// Stable error code for structured logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::HandleInvalid => "handle_invalid",
            Self::RoomNameInvalid => "room_name_invalid",
            Self::ContentInvalid => "content_invalid",
            Self::TimestampInvalid => "timestamp_invalid",
            Self::PageInvalid => "page_invalid",
            Self::PageSizeInvalid => "page_size_invalid",
            Self::NotAuthenticated => "not_authenticated",
            Self::DuplicateSession(_) => "duplicate_session",
            Self::AlreadyAuthenticated(_) => "already_authenticated",
            Self::PermissionDenied => "permission_denied",
            Self::RoomNotFound => "room_not_found",
            Self::MessageNotFound => "message_not_found",
            Self::NotInRoom => "not_in_room",
            Self::RoomGone(_) => "room_gone",
            Self::RoomExists(_) => "room_exists",
            Self::RetryExhausted => "retry_exhausted",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Convert to the wire event sent back to the originating connection.
    ///
    /// Authentication failures use the dedicated `auth_error` event; every
    /// other rejection uses the generic `error` event. Storage errors are
    /// reported generically; the cause is logged, not transmitted.
    pub fn to_event(&self, auth_phase: bool) -> ServerEvent {
        let message = match self {
            Self::Storage(_) => "internal storage failure, try again later".to_string(),
            other => other.to_string(),
        };
        if auth_phase {
            ServerEvent::AuthError { error: message }
        } else {
            ServerEvent::Error { message }
        }
    }
}

impl From<DbError> for ProtocolError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::RoomExists(name) => Self::RoomExists(name),
            DbError::RoomNameInvalid => Self::RoomNameInvalid,
            DbError::RoomNotFound(_) => Self::RoomNotFound,
            DbError::MessageNotFound(_) => Self::MessageNotFound,
            DbError::PermissionDenied => Self::PermissionDenied,
            DbError::ContentInvalid => Self::ContentInvalid,
            DbError::TimestampInvalid => Self::TimestampInvalid,
            DbError::RetryExhausted(_) => Self::RetryExhausted,
            other => Self::Storage(other),
        }
    }
}

/// Result type for session event handlers.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
