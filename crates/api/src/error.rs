//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client (malformed ids, headers).
    BadRequest(String),
    /// Resource not found.
    NotFound(String),
    /// Service-level error.
    Service(CheckoutError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Service(err) => service_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn service_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match &err {
        CheckoutError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        CheckoutError::InvalidPromo(_) => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        CheckoutError::InsufficientStock { .. }
        | CheckoutError::Conflict(_)
        | CheckoutError::InvalidStatusTransition { .. } => (StatusCode::CONFLICT, err.to_string()),
        CheckoutError::Store(store_err) => {
            tracing::error!(error = %store_err, "store failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            )
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Service(err)
    }
}
