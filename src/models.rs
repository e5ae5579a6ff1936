//! Stored record types and their JSON encoding
//!
//! Each record is one flat JSON object. Timestamps are RFC 3339 strings,
//! absent optionals are written as `null`, and unknown keys are ignored on
//! read so older binaries can load objects written by newer ones.

use crate::error::{Result, StoreError};
use crate::store::paths;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque client-supplied key/value details
pub type DeviceInfo = Map<String, Value>;

/// A record that lives at exactly one object path derived from its identity
pub trait Record: Serialize + DeserializeOwned + Send {
    const KIND: &'static str;

    fn object_path(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub device_info: Option<DeviceInfo>,
}

impl Session {
    pub fn new(user_id: Option<String>, device_info: Option<DeviceInfo>) -> Self {
        let now = Utc::now();
        Self {
            session_id: new_id(),
            user_id,
            created_at: now,
            updated_at: now,
            device_info,
        }
    }
}

impl Record for Session {
    const KIND: &'static str = "session";

    fn object_path(&self) -> String {
        paths::session(&self.session_id)
    }
}

/// Mutable session fields; `Some` sets the field, `None` leaves it alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    pub user_id: Option<String>,
    pub device_info: Option<DeviceInfo>,
}

impl SessionPatch {
    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() && self.device_info.is_none()
    }

    /// Merge into `session` and stamp `updated_at`; identity and `created_at` never change
    pub fn apply(self, session: &mut Session, now: DateTime<Utc>) {
        if let Some(user_id) = self.user_id {
            session.user_id = Some(user_id);
        }
        if let Some(device_info) = self.device_info {
            session.device_info = Some(device_info);
        }
        session.updated_at = now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::User => "user",
            Role::Model => "model",
            Role::System => "system",
        };
        f.write_str(name)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "model" => Ok(Role::Model),
            "system" => Ok(Role::System),
            other => Err(format!(
                "unknown role '{}', expected one of: user, model, system",
                other
            )),
        }
    }
}

/// One chat turn; written once, never updated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub session_id: String,
    pub role: Role,
    pub message_text: String,
    pub timestamp: DateTime<Utc>,
    pub tokens_used: Option<u32>,
    pub model_version: Option<String>,
}

impl Message {
    pub fn new(
        session_id: impl Into<String>,
        role: Role,
        message_text: impl Into<String>,
        tokens_used: Option<u32>,
        model_version: Option<String>,
    ) -> Self {
        Self {
            message_id: new_id(),
            session_id: session_id.into(),
            role,
            message_text: message_text.into(),
            timestamp: Utc::now(),
            tokens_used,
            model_version,
        }
    }
}

impl Record for Message {
    const KIND: &'static str = "message";

    fn object_path(&self) -> String {
        paths::message(&self.session_id, &self.message_id)
    }
}

/// Per-session metadata, keyed by the session it describes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub session_id: String,
    pub last_active: DateTime<Utc>,
    pub extension_version: Option<String>,
    pub cluster_used: Option<String>,
}

impl Metadata {
    pub fn new(
        session_id: impl Into<String>,
        extension_version: Option<String>,
        cluster_used: Option<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            last_active: Utc::now(),
            extension_version,
            cluster_used,
        }
    }
}

impl Record for Metadata {
    const KIND: &'static str = "metadata";

    fn object_path(&self) -> String {
        paths::metadata(&self.session_id)
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn encode<R: Record>(record: &R) -> Result<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| StoreError::malformed(record.object_path(), e))
}

pub fn decode<R: Record>(path: &str, bytes: &[u8]) -> Result<R> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::malformed(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_encodes_flat_with_iso_timestamps() {
        let session = Session::new(Some("u1".to_string()), None);
        let value: Value = serde_json::from_slice(&encode(&session).unwrap()).unwrap();

        assert_eq!(value["session_id"], json!(session.session_id));
        assert_eq!(value["user_id"], json!("u1"));
        assert_eq!(value["device_info"], Value::Null);
        let created = value["created_at"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(created).is_ok());
    }

    #[test]
    fn test_decode_restores_exact_record() {
        let mut device = DeviceInfo::new();
        device.insert("os".to_string(), json!("linux"));
        let session = Session::new(None, Some(device));

        let bytes = encode(&session).unwrap();
        let restored: Session = decode("sessions/x", &bytes).unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn test_decode_tolerates_unknown_keys() {
        let bytes = json!({
            "session_id": "s1",
            "last_active": "2024-05-01T10:00:00Z",
            "extension_version": "1.0",
            "cluster_used": null,
            "region": "eu-west"
        })
        .to_string();

        let metadata: Metadata = decode("metadata/s1", bytes.as_bytes()).unwrap();
        assert_eq!(metadata.session_id, "s1");
        assert_eq!(metadata.extension_version.as_deref(), Some("1.0"));
        assert!(metadata.cluster_used.is_none());
    }

    #[test]
    fn test_decode_missing_optional_is_none() {
        let bytes = json!({
            "message_id": "m1",
            "session_id": "s1",
            "role": "model",
            "message_text": "hello",
            "timestamp": "2024-05-01T10:00:00.123Z"
        })
        .to_string();

        let message: Message = decode("messages/s1/m1", bytes.as_bytes()).unwrap();
        assert_eq!(message.role, Role::Model);
        assert!(message.tokens_used.is_none());
        assert!(message.model_version.is_none());
    }

    #[test]
    fn test_decode_missing_required_is_malformed() {
        let bytes = json!({"session_id": "s1", "role": "user"}).to_string();
        let err = decode::<Message>("messages/s1/m1", bytes.as_bytes()).unwrap_err();
        assert!(matches!(err, StoreError::MalformedRecord { ref path, .. } if path == "messages/s1/m1"));
    }

    #[test]
    fn test_decode_unknown_role_is_malformed() {
        let bytes = json!({
            "message_id": "m1",
            "session_id": "s1",
            "role": "assistant",
            "message_text": "x",
            "timestamp": "2024-05-01T10:00:00Z"
        })
        .to_string();
        assert!(decode::<Message>("messages/s1/m1", bytes.as_bytes()).is_err());
    }

    #[test]
    fn test_patch_keeps_identity_and_created_at() {
        let mut session = Session::new(None, None);
        let original = session.clone();
        let later = original.updated_at + chrono::Duration::seconds(5);

        SessionPatch {
            user_id: Some("u2".to_string()),
            device_info: None,
        }
        .apply(&mut session, later);

        assert_eq!(session.session_id, original.session_id);
        assert_eq!(session.created_at, original.created_at);
        assert_eq!(session.user_id.as_deref(), Some("u2"));
        assert_eq!(session.updated_at, later);
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("User".parse::<Role>().unwrap(), Role::User);
        assert_eq!(Role::Model.to_string(), "model");
        assert!("assistant".parse::<Role>().is_err());
    }

    #[test]
    fn test_record_paths() {
        let message = Message::new("s1", Role::User, "hi", None, None);
        assert_eq!(
            message.object_path(),
            format!("messages/s1/{}", message.message_id)
        );
        assert_eq!(Metadata::new("s1", None, None).object_path(), "metadata/s1");
    }
}
