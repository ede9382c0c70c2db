//! Mapping of core errors onto HTTP responses.

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rcpt_core::{
    ExportError, ExtractionError, FieldError, IngestError, StoreError, ValidationErrors,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Error returned by API handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    UnsupportedMediaType(String),

    /// Text could not be pulled out of an accepted upload.
    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    Validation(ValidationErrors),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub fields: Vec<FieldError>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Unprocessable(_) | ApiError::Validation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = match self {
            ApiError::Validation(errors) => ErrorBody {
                error: "validation failed".to_string(),
                fields: errors.errors,
            },
            ApiError::Internal(_) => ErrorBody {
                error: "internal server error".to_string(),
                fields: Vec::new(),
            },
            other => ErrorBody {
                error: other.to_string(),
                fields: Vec::new(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match e {
            IngestError::Empty => ApiError::BadRequest(e.to_string()),
            IngestError::TooLarge { .. } => ApiError::PayloadTooLarge(e.to_string()),
            IngestError::UnsupportedType(_) | IngestError::ContentMismatch { .. } => {
                ApiError::UnsupportedMediaType(e.to_string())
            }
        }
    }
}

impl From<ExtractionError> for ApiError {
    fn from(e: ExtractionError) -> Self {
        match e {
            ExtractionError::OcrUnavailable(_) => ApiError::Unavailable(e.to_string()),
            ExtractionError::Ocr(_) => ApiError::Internal(e.to_string()),
            ExtractionError::NoText(_) | ExtractionError::Decode(_) | ExtractionError::Pdf(_) => {
                ApiError::Unprocessable(e.to_string())
            }
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(e: ValidationErrors) -> Self {
        ApiError::Validation(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => ApiError::NotFound(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(e: ExportError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        match e.status() {
            StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge(e.body_text()),
            _ => ApiError::BadRequest(e.body_text()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("worker task failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_statuses() {
        let too_large = ApiError::from(IngestError::TooLarge { size: 11, limit: 10 });
        assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let unsupported = ApiError::from(IngestError::UnsupportedType("txt".into()));
        assert_eq!(unsupported.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        assert_eq!(ApiError::from(IngestError::Empty).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_statuses() {
        assert_eq!(ApiError::from(StoreError::NotFound(3)).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(StoreError::Poisoned).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_extraction_statuses() {
        let no_text = ApiError::from(ExtractionError::NoText("a.png".into()));
        assert_eq!(no_text.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let no_ocr = ApiError::from(ExtractionError::OcrUnavailable("models missing".into()));
        assert_eq!(no_ocr.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
