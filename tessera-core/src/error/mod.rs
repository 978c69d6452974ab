pub mod utilities;

use thiserror::Error;

use crate::session::SessionId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reasons a presented session cookie is refused.
///
/// None of these end the request. The session manager logs them and falls back to the
/// dummy cookie bootstrap, so the client simply appears anonymous.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Malformed session cookie")]
    MalformedCookie,

    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    #[error("Session token mismatch")]
    TokenMismatch,

    #[error("Session IP mismatch: {stored} != {observed}")]
    IpMismatch { stored: String, observed: String },

    #[error("No active session")]
    NoSession,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Record not found")]
    NotFound,

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid user ID: {0}")]
    InvalidUserId(String),

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

impl Error {
    /// Whether this error came from a refused session cookie rather than a failing backend.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::Session(
                SessionError::MalformedCookie
                    | SessionError::UnknownSession(_)
                    | SessionError::TokenMismatch
                    | SessionError::IpMismatch { .. }
            )
        )
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    pub fn is_session_error(&self) -> bool {
        matches!(self, Error::Session(_))
    }
}
