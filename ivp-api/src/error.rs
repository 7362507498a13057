//! Error types for ivp-api
//!
//! Every error response has the body `{"error": {"code", "message"}}`;
//! ingestion failures add `stage` and, once a row exists, `recording_id`.

use axum::{
    extract::rejection::{FormRejection, JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ivp_common::api::{ErrorBody, ErrorDetail};
use thiserror::Error;

use crate::services::{FeedbackError, TranscriptionError};
use crate::workflow::{IngestionFailure, PipelineError};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or invalid bearer token (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Wrong email/password or inactive account (400)
    #[error("Bad credentials")]
    LoginBadCredentials,

    /// Upload exceeds the configured body limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Conflict (409), e.g. duplicate registration
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ivp-common error
    #[error("Common error: {0}")]
    Common(#[from] ivp_common::Error),

    /// Recording submission failed
    #[error(transparent)]
    Ingestion(#[from] IngestionFailure),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Status and machine-readable code for a pipeline error
pub fn pipeline_status(error: &PipelineError) -> (StatusCode, &'static str) {
    match error {
        PipelineError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        PipelineError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        PipelineError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
        PipelineError::Database(err) => common_status(err),
        PipelineError::Cancelled => (StatusCode::CONFLICT, "CANCELLED"),
        PipelineError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        PipelineError::Transcription(err) => match err {
            TranscriptionError::Transport(_) => (StatusCode::BAD_GATEWAY, "TRANSPORT_ERROR"),
            TranscriptionError::Vendor { .. } => (StatusCode::BAD_GATEWAY, "VENDOR_ERROR"),
            TranscriptionError::JobFailed(_) => (StatusCode::BAD_GATEWAY, "TRANSCRIPTION_FAILED"),
            TranscriptionError::Malformed(_) => (StatusCode::BAD_GATEWAY, "MALFORMED_RESPONSE"),
            TranscriptionError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            TranscriptionError::Cancelled => (StatusCode::CONFLICT, "CANCELLED"),
        },
        PipelineError::Feedback(err) => match err {
            FeedbackError::Transport(_) => (StatusCode::BAD_GATEWAY, "TRANSPORT_ERROR"),
            FeedbackError::Vendor { .. } => (StatusCode::BAD_GATEWAY, "VENDOR_ERROR"),
            FeedbackError::Malformed(_) => (StatusCode::BAD_GATEWAY, "MALFORMED_RESPONSE"),
        },
    }
}

fn common_status(error: &ivp_common::Error) -> (StatusCode, &'static str) {
    use ivp_common::Error;

    match error {
        Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        Error::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        Error::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
        Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        Error::Config(_) | Error::Internal(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        self.status_and_code().0
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::LoginBadCredentials => (StatusCode::BAD_REQUEST, "LOGIN_BAD_CREDENTIALS"),
            ApiError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            ApiError::Common(err) => common_status(err),
            ApiError::Ingestion(failure) => pipeline_status(&failure.error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(code, error = %self, "Request failed");
        }

        let detail = match self {
            ApiError::Ingestion(failure) => ErrorDetail {
                code: code.to_string(),
                message: failure.error.to_string(),
                stage: Some(failure.stage.as_str().to_string()),
                recording_id: failure.recording.as_ref().map(|r| r.id),
            },
            other => ErrorDetail {
                code: code.to_string(),
                message: match other {
                    ApiError::NotFound(msg)
                    | ApiError::BadRequest(msg)
                    | ApiError::Unauthorized(msg)
                    | ApiError::PayloadTooLarge(msg)
                    | ApiError::Conflict(msg)
                    | ApiError::Internal(msg) => msg,
                    ApiError::LoginBadCredentials => "LOGIN_BAD_CREDENTIALS".to_string(),
                    ApiError::Common(ivp_common::Error::NotFound(msg))
                    | ApiError::Common(ivp_common::Error::InvalidInput(msg))
                    | ApiError::Common(ivp_common::Error::Conflict(msg)) => msg,
                    other => other.to_string(),
                },
                stage: None,
                recording_id: None,
            },
        };

        (status, Json(ErrorBody { error: detail })).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
