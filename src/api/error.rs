//! Translation of application errors into HTTP responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::AppError;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable code.
    pub error: String,
    /// Human-readable description.
    pub message: String,
}

/// Wrapper so handlers can return `AppError` with `?`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(AppError::InvalidInput(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self.0 {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "invalid_input", msg),
            AppError::NoActiveSession(msg) => (StatusCode::NOT_FOUND, "no_active_session", msg),
            AppError::SessionBusy(msg) => (StatusCode::CONFLICT, "session_busy", msg),
            AppError::WorkflowAlreadyComplete(msg) => {
                (StatusCode::CONFLICT, "workflow_already_complete", msg)
            }
            AppError::Upstream(msg) => {
                warn!(%msg, "upstream service failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "upstream_error", msg)
            }
            AppError::Config(msg) => {
                warn!(%msg, "request hit a configuration gap");
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", msg)
            }
            other => {
                error!(err = %other, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_owned(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: code.to_owned(),
                message,
            }),
        )
            .into_response()
    }
}
