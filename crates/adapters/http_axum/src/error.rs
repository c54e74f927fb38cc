//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use adpilot_domain::error::{AdPilotError, ValidationError};

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`AdPilotError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(AdPilotError);

impl From<AdPilotError> for ApiError {
    fn from(err: AdPilotError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AdPilotError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            AdPilotError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            AdPilotError::Storage(err) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            AdPilotError::Upstream(err) => {
                tracing::warn!(error = %err, "upstream source error");
                (
                    StatusCode::BAD_GATEWAY,
                    "metric source unavailable".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
