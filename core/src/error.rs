//! Typed failures surfaced by the store and the service layer.
//!
//! Every error carries a stable [`ErrorKind`] so transports can map it to a
//! status code without string matching.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable, machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BackendUnavailable,
    NotFound,
    InvalidRange,
    ValidationFailed,
    Conflict,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BackendUnavailable => "backend_unavailable",
            Self::NotFound => "not_found",
            Self::InvalidRange => "invalid_range",
            Self::ValidationFailed => "validation_failed",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("persistence backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidRange(String),

    #[error("{0}")]
    ValidationFailed(String),

    #[error("{0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl Error {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed(message.into())
    }

    pub fn invalid_range(message: impl Into<String>) -> Self {
        Self::InvalidRange(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidRange(_) => ErrorKind::InvalidRange,
            Self::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Storage(err) if is_connection_failure(err) => ErrorKind::BackendUnavailable,
            Self::Storage(_) => ErrorKind::Internal,
        }
    }
}

fn is_connection_failure(err: &rusqlite::Error) -> bool {
    use rusqlite::ErrorCode;
    matches!(
        err.sqlite_error_code(),
        Some(
            ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::NotADatabase
                | ErrorCode::SystemIoFailure
        )
    )
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_stable() {
        assert_eq!(
            Error::not_found("food 3").kind().as_str(),
            "not_found"
        );
        assert_eq!(
            Error::validation("bad").kind(),
            ErrorKind::ValidationFailed
        );
        assert_eq!(
            Error::BackendUnavailable("gone".to_string()).kind(),
            ErrorKind::BackendUnavailable
        );
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::InvalidRange).unwrap();
        assert_eq!(json, "\"invalid_range\"");
    }

    #[test]
    fn test_storage_error_is_internal() {
        let err = Error::from(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_message_is_human_readable() {
        let err = Error::validation("quantity must be greater than 0");
        assert_eq!(err.to_string(), "quantity must be greater than 0");
    }
}
