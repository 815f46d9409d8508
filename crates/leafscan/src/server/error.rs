use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use crate::error::LeafScanError;

/// Body of every failed request
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

/// Request failures with HTTP status mapping
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No image data")]
    NoPayload,
    #[error("{0}")]
    BadRequest(String),
    #[error("Request body exceeds the limit")]
    PayloadTooLarge,
    #[error("Could not decode image: {0}")]
    Decode(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoPayload | ApiError::BadRequest(_) | ApiError::Decode(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map an extractor rejection, keeping the size limit distinguishable
    pub(crate) fn rejected(status: StatusCode, message: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest(message)
        }
    }
}

impl From<LeafScanError> for ApiError {
    fn from(e: LeafScanError) -> Self {
        match e {
            LeafScanError::Decode(inner) => ApiError::Decode(inner.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(detail, "prediction failed");
                "An internal error occurred".to_string()
            }
            other => {
                tracing::warn!(error = %other, "request rejected");
                other.to_string()
            }
        };

        (status, Json(ErrorBody { success: false, error })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::NoPayload.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Decode("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Internal("x".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            ApiError::rejected(StatusCode::PAYLOAD_TOO_LARGE, "too big".into()).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_core_errors_map_by_kind() {
        let missing = LeafScanError::MissingDependency("edge detection");
        assert!(matches!(ApiError::from(missing), ApiError::Internal(_)));

        let decode = image::load_from_memory(b"not an image").unwrap_err();
        assert!(matches!(ApiError::from(LeafScanError::from(decode)), ApiError::Decode(_)));
    }
}
