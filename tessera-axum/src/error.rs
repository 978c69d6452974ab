use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tessera::TesseraError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionLayerError {
    /// A handler asked for the session but the layer is not installed on its route
    #[error("Session layer not installed")]
    MissingLayer,

    #[error("No active session")]
    NoSession,

    #[error("Session storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Invalid session data: {0}")]
    InvalidData(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl From<tessera_core::Error> for SessionLayerError {
    fn from(err: tessera_core::Error) -> Self {
        use tessera_core::{Error, error::SessionError};

        match err {
            Error::Storage(e) => SessionLayerError::StorageUnavailable(e.to_string()),
            Error::Serialization(e) => SessionLayerError::InvalidData(e.to_string()),
            Error::Session(SessionError::NoSession) => SessionLayerError::NoSession,
            other => SessionLayerError::InternalError(other.to_string()),
        }
    }
}

impl From<TesseraError> for SessionLayerError {
    fn from(err: TesseraError) -> Self {
        match err {
            TesseraError::StorageError(msg) => SessionLayerError::StorageUnavailable(msg),
            other => SessionLayerError::InternalError(other.to_string()),
        }
    }
}

impl IntoResponse for SessionLayerError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            SessionLayerError::MissingLayer => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Session layer not installed")
            }
            SessionLayerError::NoSession => (StatusCode::UNAUTHORIZED, "No active session"),
            SessionLayerError::StorageUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Session storage unavailable")
            }
            SessionLayerError::InvalidData(ref msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            SessionLayerError::InternalError(ref msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.as_str())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, SessionLayerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::error::{SessionError, StorageError};

    #[test]
    fn test_error_mapping() {
        let err: SessionLayerError = tessera_core::Error::from(StorageError::NotFound).into();
        assert!(matches!(err, SessionLayerError::StorageUnavailable(_)));

        let err: SessionLayerError = tessera_core::Error::from(SessionError::NoSession).into();
        assert!(matches!(err, SessionLayerError::NoSession));

        let err: SessionLayerError = TesseraError::StorageError("down".to_string()).into();
        assert!(matches!(err, SessionLayerError::StorageUnavailable(_)));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            SessionLayerError::MissingLayer.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            SessionLayerError::StorageUnavailable("down".to_string())
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            SessionLayerError::NoSession.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
