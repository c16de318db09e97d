//! Client and server event types.
//!
//! Both enums are internally tagged with `type` in snake_case; payload fields
//! are camelCase to match the browser client. `ClientEvent` is deserialize-
//! only, `ServerEvent` serialize-only.

use serde::{Deserialize, Serialize};

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    50
}

/// Events a client sends over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Authenticate {
        handle: String,
    },
    JoinRoom {
        #[serde(rename = "roomName")]
        room_name: String,
    },
    LeaveRoom,
    CreateRoom {
        #[serde(rename = "roomName")]
        room_name: String,
    },
    DeleteRoom {
        #[serde(rename = "roomId")]
        room_id: i64,
    },
    SendMessage {
        content: String,
        /// Logical ordering timestamp. Stamped server-side when omitted.
        #[serde(default)]
        timestamp: Option<i64>,
    },
    LoadMessages {
        #[serde(default = "default_page")]
        page: u32,
        #[serde(rename = "pageSize", default = "default_page_size")]
        page_size: u32,
    },
}

/// A message as it appears in history pages and broadcast payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub message_id: i64,
    pub content: String,
    pub handle: String,
    pub timestamp: i64,
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    Authenticated { handle: String, id: i64 },
    AuthError { error: String },
    #[serde(rename_all = "camelCase")]
    RoomJoined {
        room_id: i64,
        room_name: String,
        members: Vec<String>,
        messages: Vec<MessagePayload>,
    },
    #[serde(rename_all = "camelCase")]
    RoomLeft { room_name: String },
    #[serde(rename_all = "camelCase")]
    RoomCreated {
        room_id: i64,
        room_name: String,
        creator: String,
    },
    #[serde(rename_all = "camelCase")]
    RoomDeleted { room_id: i64, room_name: String },
    #[serde(rename_all = "camelCase")]
    UserJoined { handle: String, room_name: String },
    #[serde(rename_all = "camelCase")]
    UserLeft { handle: String, room_name: String },
    #[serde(rename_all = "camelCase")]
    MessageSent {
        message_id: i64,
        content: String,
        handle: String,
        timestamp: i64,
        status: String,
    },
    #[serde(rename_all = "camelCase")]
    NewMessage {
        message_id: i64,
        content: String,
        handle: String,
        timestamp: i64,
    },
    #[serde(rename_all = "camelCase")]
    MessagesLoaded {
        messages: Vec<MessagePayload>,
        total: i64,
        has_more: bool,
    },
    Error { message: String },
}
