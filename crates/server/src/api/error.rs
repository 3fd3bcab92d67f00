//! Mapping of library errors to HTTP responses.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::error;

use clipforge_core::{CredentialError, MediaError, PipelineError, PublishError};

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn internal(e: &dyn std::error::Error) -> ApiError {
    error!(error = %e, "Request failed");
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

pub fn pipeline_error(e: &PipelineError) -> ApiError {
    match e {
        PipelineError::CredentialMissing { .. } => {
            api_error(StatusCode::PRECONDITION_FAILED, e.to_string())
        }
        PipelineError::InvalidRequest(_)
        | PipelineError::Media(MediaError::UnreadableMedia { .. })
        | PipelineError::Media(MediaError::UnsupportedOrientation(_)) => {
            api_error(StatusCode::BAD_REQUEST, e.to_string())
        }
        _ => internal(e),
    }
}

pub fn publish_error(e: &PublishError) -> ApiError {
    match e {
        PublishError::JobNotFound(_) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        PublishError::CredentialMissing { .. } => {
            api_error(StatusCode::PRECONDITION_FAILED, e.to_string())
        }
        PublishError::InvalidState { .. } => api_error(StatusCode::CONFLICT, e.to_string()),
        _ => internal(e),
    }
}

pub fn credential_error(e: &CredentialError) -> ApiError {
    match e {
        CredentialError::NotFound { .. } => api_error(StatusCode::NOT_FOUND, e.to_string()),
        CredentialError::MissingField { .. } | CredentialError::Validation(_) => {
            api_error(StatusCode::BAD_REQUEST, e.to_string())
        }
        _ => internal(e),
    }
}
