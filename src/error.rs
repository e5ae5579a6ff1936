//! Error taxonomy for the persistence layer and the query flow
//!
//! Absence is reported through `Option` on reads; `NotFound` only appears
//! where an operation requires the record to exist (updates).

use thiserror::Error;

/// Errors surfaced by the object store, document store and service facade
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transport, auth or timeout failure talking to the object store
    #[error("store unavailable during {operation} on '{path}': {reason}")]
    StoreUnavailable {
        operation: &'static str,
        path: String,
        reason: String,
        retryable: bool,
    },

    /// A record that had to exist was absent
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// A stored object could not be decoded into its record type
    #[error("malformed record at '{path}': {reason}")]
    MalformedRecord { path: String, reason: String },

    /// The inference service answered with a non-success status or timed out
    #[error("upstream inference failure: {reason}")]
    UpstreamInferenceFailure { status: Option<u16>, reason: String },

    /// Object path is empty or escapes the container
    #[error("invalid object path '{0}'")]
    InvalidPath(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub fn unavailable(
        operation: &'static str,
        path: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::StoreUnavailable {
            operation,
            path: path.into(),
            reason: reason.to_string(),
            retryable: false,
        }
    }

    pub fn timed_out(operation: &'static str, path: impl Into<String>, after_ms: u64) -> Self {
        Self::StoreUnavailable {
            operation,
            path: path.into(),
            reason: format!("timed out after {}ms", after_ms),
            retryable: true,
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn malformed(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedRecord {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether a caller may reasonably retry. Nothing in this crate retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StoreUnavailable { retryable, .. } => *retryable,
            Self::UpstreamInferenceFailure { status, .. } => match status {
                None => true,
                Some(code) => *code >= 500,
            },
            _ => false,
        }
    }

    /// HTTP-equivalent status the boundary should report
    pub fn boundary_status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::StoreUnavailable { .. } | Self::UpstreamInferenceFailure { .. } => 503,
            Self::InvalidPath(_) => 400,
            Self::MalformedRecord { .. } | Self::Config(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_retryable_unavailable() {
        let err = StoreError::timed_out("get", "sessions/abc", 250);
        assert!(err.is_retryable());
        assert_eq!(err.boundary_status(), 503);
        assert!(err.to_string().contains("timed out after 250ms"));
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err = StoreError::not_found("session", "abc");
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
        assert_eq!(err.boundary_status(), 404);
        assert_eq!(err.to_string(), "session 'abc' not found");
    }

    #[test]
    fn test_upstream_failure_display() {
        let err = StoreError::UpstreamInferenceFailure {
            status: Some(502),
            reason: "status 502: bad gateway".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "upstream inference failure: status 502: bad gateway"
        );
        assert!(err.is_retryable());

        let client_err = StoreError::UpstreamInferenceFailure {
            status: Some(404),
            reason: "model not found".to_string(),
        };
        assert!(!client_err.is_retryable());
        assert_eq!(client_err.boundary_status(), 503);
    }
}
