//! Error types / 错误类型
//!
//! Every core operation returns `Result<T, SearchError>` so callers can tell a
//! real empty result apart from a failed backend call.

use std::fmt;

/// Search layer error / 搜索层错误
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Engine unreachable (connection refused, DNS, broken transport)
    #[error("search backend unavailable: {reason}")]
    BackendUnavailable { reason: String },

    /// Request did not complete within the configured timeout
    #[error("search backend timed out during {operation}")]
    Timeout { operation: String },

    /// Document absent where one is required
    #[error("document '{id}' not found in collection '{collection}'")]
    NotFound { collection: String, id: String },

    /// Collection mapping incompatible with the fixed schema
    #[error("schema conflict on collection '{collection}': {reason}")]
    SchemaConflict { collection: String, reason: String },

    /// Malformed caller input
    #[error("invalid input: {0}")]
    Validation(String),

    /// Engine answered with an error we do not map to a specific kind
    #[error("search backend error (status {status}): {reason}")]
    Backend { status: u16, reason: String },
}

pub type Result<T> = std::result::Result<T, SearchError>;

impl SearchError {
    pub fn validation(msg: impl fmt::Display) -> Self {
        SearchError::Validation(msg.to_string())
    }

    pub fn unavailable(reason: impl fmt::Display) -> Self {
        SearchError::BackendUnavailable { reason: reason.to_string() }
    }

    /// True for failures caused by the caller rather than the backend / 调用方输入错误
    pub fn is_validation(&self) -> bool {
        matches!(self, SearchError::Validation(_))
    }

    /// Map a transport error, keeping timeouts distinct / 映射传输层错误
    pub fn from_transport(operation: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SearchError::Timeout { operation: operation.to_string() }
        } else if err.is_decode() {
            SearchError::Backend {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                reason: format!("malformed response to {}: {}", operation, err),
            }
        } else {
            SearchError::BackendUnavailable { reason: format!("{}: {}", operation, err) }
        }
    }
}
