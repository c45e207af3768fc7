use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use realm_store::StorageError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// The request itself is wrong. The message is ours and safe to return.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl IntoResponse for ServerError {
    /// Clients get a status and a generic message; storage details only go
    /// to the log.
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Storage(StorageError::CapabilityUnsupported { .. }) => (
                StatusCode::NOT_IMPLEMENTED,
                "not supported by this server".to_string(),
            ),
            Self::Storage(StorageError::InvalidName(_)) => {
                (StatusCode::BAD_REQUEST, "invalid file name".to_string())
            }
            _ => {
                tracing::error!(error = %self, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "request failed".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realm_store::BackendKind;

    #[test]
    fn capability_maps_to_501() {
        let err = ServerError::Storage(StorageError::CapabilityUnsupported {
            capability: "presigned upload URLs",
            backend: BackendKind::Local,
        });
        assert_eq!(err.into_response().status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[test]
    fn transient_maps_to_500() {
        let err = ServerError::Storage(StorageError::Transient("disk full at /srv/x".into()));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn bad_request_maps_to_400() {
        let err = ServerError::BadRequest("missing file".into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
