//! Field-level validation for handles, room names, and message content.
//!
//! Handles are case-normalized to ASCII lowercase before storage and lookup;
//! room names are case-sensitive. Message content is trimmed and HTML-entity
//! escaped, and the 1..=2000 length bound applies to the escaped form (what
//! the store actually holds).

use crate::error::ProtocolError;

/// Handle length bounds (inclusive).
const HANDLE_LEN: std::ops::RangeInclusive<usize> = 3..=20;

/// Room name length bounds (inclusive).
const ROOM_NAME_LEN: std::ops::RangeInclusive<usize> = 3..=50;

/// Maximum stored content length in characters.
const CONTENT_MAX: usize = 2000;

/// Validate a handle and return its case-normalized form.
pub fn validate_handle(handle: &str) -> Result<String, ProtocolError> {
    if !HANDLE_LEN.contains(&handle.chars().count()) {
        return Err(ProtocolError::HandleInvalid);
    }
    if !handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ProtocolError::HandleInvalid);
    }
    Ok(handle.to_ascii_lowercase())
}

/// Validate a room name. Names keep their case.
pub fn validate_room_name(name: &str) -> Result<(), ProtocolError> {
    if !ROOM_NAME_LEN.contains(&name.chars().count()) {
        return Err(ProtocolError::RoomNameInvalid);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ProtocolError::RoomNameInvalid);
    }
    Ok(())
}

/// Trim, validate, and escape message content. Returns the stored form.
pub fn validate_content(content: &str) -> Result<String, ProtocolError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::ContentInvalid);
    }
    let escaped = escape_html(trimmed);
    if escaped.chars().count() > CONTENT_MAX {
        return Err(ProtocolError::ContentInvalid);
    }
    Ok(escaped)
}

/// Escape the five HTML-significant characters.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
