//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::OrderError;
use order_store::OrderStoreError;
use workflow::IntakeError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Intake/validation error.
    Intake(IntakeError),
    /// Order store error.
    Store(OrderStoreError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Intake(err) => intake_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn intake_error_to_response(err: IntakeError) -> (StatusCode, String) {
    match &err {
        IntakeError::Validation(OrderError::NotCancellable { .. }) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        IntakeError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        IntakeError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        IntakeError::Store(store_err) => (store_status(store_err), err.to_string()),
        IntakeError::Queue(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn store_error_to_response(err: OrderStoreError) -> (StatusCode, String) {
    (store_status(&err), err.to_string())
}

fn store_status(err: &OrderStoreError) -> StatusCode {
    match err {
        OrderStoreError::NotFound(_) => StatusCode::NOT_FOUND,
        OrderStoreError::DuplicateOrder(_)
        | OrderStoreError::IdempotencyConflict { .. }
        | OrderStoreError::StatusConflict { .. }
        | OrderStoreError::Transition(_)
        | OrderStoreError::PaymentReferenceAlreadySet { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<IntakeError> for ApiError {
    fn from(err: IntakeError) -> Self {
        ApiError::Intake(err)
    }
}

impl From<OrderStoreError> for ApiError {
    fn from(err: OrderStoreError) -> Self {
        ApiError::Store(err)
    }
}
