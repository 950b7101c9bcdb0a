//! Error-to-response mapping shared by every REST surface.

use crate::models::ErrorResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rewards_core::error::{BackendError, RewardsError};
use tracing::{error, warn};

/// Handler error: a [`RewardsError`] rendered as `ErrorResponse` JSON.
#[derive(Debug)]
pub struct ApiError(pub RewardsError);

impl From<RewardsError> for ApiError {
    fn from(e: RewardsError) -> Self {
        ApiError(e)
    }
}

impl From<BackendError> for ApiError {
    fn from(e: BackendError) -> Self {
        ApiError(RewardsError::Backend(e))
    }
}

impl ApiError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            RewardsError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            RewardsError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            RewardsError::InvalidTransition(_) => (StatusCode::CONFLICT, "invalid_transition"),
            RewardsError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            RewardsError::Backend(BackendError::RowNotFound { .. }) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            RewardsError::Backend(BackendError::UniqueViolation { .. })
            | RewardsError::Backend(BackendError::Conflict { .. }) => {
                (StatusCode::CONFLICT, "conflict")
            }
            RewardsError::Backend(BackendError::Unavailable { .. }) => {
                (StatusCode::BAD_GATEWAY, "backend_unavailable")
            }
            RewardsError::Serialization(_) => (StatusCode::BAD_REQUEST, "invalid_payload"),
            RewardsError::Config(_) | RewardsError::Io(_) | RewardsError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        metrics::counter!("api.errors", "code" => code).increment(1);
        if status.is_server_error() {
            error!(error = %self.0, code, "Request failed");
        } else {
            warn!(error = %self.0, code, "Request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                error: code.to_string(),
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
