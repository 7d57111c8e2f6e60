//! API Error Types
//!
//! Defines error types for the API layer and implements conversion
//! to HTTP responses with appropriate status codes.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::analytics::AnalyticsError;
use crate::chat::ChatError;
use crate::store::StoreError;

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Too few readings or days to compute the result
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Forecaster, classifier or LLM not configured or not reachable
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Non-finite or otherwise unusable computation result
    #[error("Computation error: {0}")]
    Computation(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage layer error
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ApiError::NotFound(what),
            StoreError::Conflict(what) => ApiError::Conflict(format!("{} already exists", what)),
            StoreError::Invalid(msg) => ApiError::Validation(msg),
            other => ApiError::Store(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl From<AnalyticsError> for ApiError {
    fn from(err: AnalyticsError) -> Self {
        match err {
            AnalyticsError::Validation(msg) => ApiError::Validation(msg),
            AnalyticsError::InsufficientData {
                what,
                found,
                required,
            } => ApiError::InsufficientData(format!(
                "found {} {}, at least {} required",
                found, what, required
            )),
            AnalyticsError::ModelUnavailable(msg) => ApiError::ModelUnavailable(msg),
            AnalyticsError::Computation(msg) => ApiError::Computation(msg),
            AnalyticsError::Store(e) => e.into(),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Validation(msg) => ApiError::Validation(msg),
            ChatError::Model(e) => ApiError::ModelUnavailable(e.to_string()),
            ChatError::Disabled => ApiError::ModelUnavailable("chat is disabled".to_string()),
        }
    }
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

/// Error details
#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::InsufficientData(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_DATA"),
            ApiError::ModelUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "MODEL_UNAVAILABLE"),
            ApiError::Computation(_) => (StatusCode::INTERNAL_SERVER_ERROR, "COMPUTATION_ERROR"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let request_id = uuid::Uuid::new_v4().to_string();

        // Log the error
        tracing::error!(
            request_id = %request_id,
            error_code = %code,
            error_message = %self,
            "API error occurred"
        );

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelError;

    fn status_of(err: impl Into<ApiError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_analytics_status_mapping() {
        assert_eq!(
            status_of(AnalyticsError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AnalyticsError::InsufficientData {
                what: "readings",
                found: 9,
                required: 10
            }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(AnalyticsError::ModelUnavailable("down".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(AnalyticsError::Computation("nan".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_status_mapping() {
        assert_eq!(
            status_of(StoreError::NotFound("patient P001".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(StoreError::Conflict("patient P001".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(StoreError::Invalid("servings".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(StoreError::Lock("poisoned".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        // Store errors nested in analytics errors keep their mapping
        assert_eq!(
            status_of(AnalyticsError::Store(StoreError::NotFound("patient X".into()))),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_chat_status_mapping() {
        assert_eq!(
            status_of(ChatError::Validation("empty".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ChatError::Model(ModelError::Timeout)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_of(ChatError::Disabled), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_codes() {
        let (_, code) = ApiError::InsufficientData("x".into()).status_and_code();
        assert_eq!(code, "INSUFFICIENT_DATA");
        let (_, code) = ApiError::Store(StoreError::Lock("x".into())).status_and_code();
        assert_eq!(code, "STORE_ERROR");
    }
}
