//! API error types and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use intake_core::errors::IntakeError;
use intake_core::validate::FieldIssue;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("backing store is not configured")]
    StoreUnavailable,

    #[error(transparent)]
    Engine(#[from] IntakeError),
}

/// Error body: `{ error, errors? }` in both directions of the wire.
#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldIssue>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, errors) = match self {
            ApiError::StoreUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "backing store is not configured".to_string(),
                None,
            ),
            ApiError::Engine(engine) => match engine {
                IntakeError::InvalidPayload(message) => (StatusCode::BAD_REQUEST, message, None),
                IntakeError::ValidationFailed(issues) => (
                    StatusCode::BAD_REQUEST,
                    "Validation failed".to_string(),
                    Some(issues),
                ),
                err @ IntakeError::TemplateNotFound(_) => {
                    (StatusCode::NOT_FOUND, err.to_string(), None)
                }
                err @ IntakeError::NotFound => (StatusCode::NOT_FOUND, err.to_string(), None),
                err @ IntakeError::ComputeCycle(_) => {
                    (StatusCode::BAD_REQUEST, err.to_string(), None)
                }
                IntakeError::Store(err) => {
                    tracing::error!(event = "store_error", error = %err);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal error".to_string(),
                        None,
                    )
                }
            },
        };
        (status, Json(ErrorBody { error, errors })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
