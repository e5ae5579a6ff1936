//! Object path conventions; the namespace itself is the durable schema
//!
//! ```text
//! sessions/{session_id}
//! messages/{session_id}/{message_id}
//! metadata/{session_id}
//! ```

use crate::error::{Result, StoreError};

pub const SESSIONS_PREFIX: &str = "sessions/";
pub const MESSAGES_PREFIX: &str = "messages/";
pub const METADATA_PREFIX: &str = "metadata/";

pub fn session(session_id: &str) -> String {
    format!("{}{}", SESSIONS_PREFIX, session_id)
}

pub fn metadata(session_id: &str) -> String {
    format!("{}{}", METADATA_PREFIX, session_id)
}

pub fn message(session_id: &str, message_id: &str) -> String {
    format!("{}{}/{}", MESSAGES_PREFIX, session_id, message_id)
}

/// Prefix under which every message of one session lives
pub fn session_messages(session_id: &str) -> String {
    format!("{}{}/", MESSAGES_PREFIX, session_id)
}

/// Identifiers become single path segments, so they may not contain separators
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id == "." || id == ".." || id.contains('/') || id.contains('\\') {
        return Err(StoreError::InvalidPath(id.to_string()));
    }
    Ok(())
}
