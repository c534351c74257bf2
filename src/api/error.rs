use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error;
use tracing::error;

use super::models::ErrorResponse;
use crate::generator::GenerationError;
use crate::manifest::ManifestError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("payload invalid: {0}")]
    InvalidPayload(String),
    #[error("payload too large: {0} bytes")]
    PayloadTooLarge(usize),
    #[error("staging endpoints are only available in development")]
    DevOnly,
    #[error("unknown media kind: {0}")]
    UnknownKind(String),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("manifest changed concurrently: {0}")]
    Conflict(String),
    #[error("generation unavailable: {0}")]
    GenerationUnavailable(String),
    #[error("manifest unreadable: {0}")]
    CorruptManifest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::DevOnly => StatusCode::FORBIDDEN,
            ApiError::UnknownKind(_) | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::GenerationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::CorruptManifest(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            ApiError::DevOnly => "DEV_ONLY",
            ApiError::UnknownKind(_) => "UNKNOWN_KIND",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONCURRENT_MODIFICATION",
            ApiError::GenerationUnavailable(_) => "GENERATION_UNAVAILABLE",
            ApiError::CorruptManifest(_) => "CORRUPT_MANIFEST",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "Request failed");
        }

        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::InvalidPayload(value.to_string())
    }
}

impl From<ManifestError> for ApiError {
    fn from(value: ManifestError) -> Self {
        match value {
            ManifestError::SlotNotFound(_) | ManifestError::VariantNotFound { .. } => {
                ApiError::NotFound(value.to_string())
            }
            ManifestError::ConcurrentModification { .. } => ApiError::Conflict(value.to_string()),
            ManifestError::Corrupt { .. } => ApiError::CorruptManifest(value.to_string()),
            ManifestError::Io(_) | ManifestError::Serialization(_) | ManifestError::Task(_) => {
                ApiError::Internal(value.to_string())
            }
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(value: GenerationError) -> Self {
        match value {
            GenerationError::InvalidRequest(message) => ApiError::InvalidPayload(message),
            GenerationError::MissingCredential => {
                ApiError::GenerationUnavailable(value.to_string())
            }
            GenerationError::Manifest(inner) => inner.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
