//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::OrderError;
use reconciliation::ReconcileError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Reconciliation-layer error.
    Reconcile(ReconcileError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Reconcile(err) => reconcile_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn reconcile_error_to_response(err: ReconcileError) -> (StatusCode, String) {
    match &err {
        ReconcileError::Order(order_err) => match order_err {
            OrderError::InvalidTransition { .. } => (StatusCode::CONFLICT, err.to_string()),
            OrderError::LineNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
            OrderError::InvalidLineItem { .. }
            | OrderError::EmptyOrder
            | OrderError::InvalidAdjustment { .. }
            | OrderError::InvalidPayment { .. }
            | OrderError::InvalidRefundState { .. }
            | OrderError::InvalidReturn { .. }
            | OrderError::InvalidQuantity { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        },
        ReconcileError::ItemNotFound(_)
        | ReconcileError::LocationNotFound(_)
        | ReconcileError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        ReconcileError::Forbidden { .. } => (StatusCode::FORBIDDEN, err.to_string()),
        ReconcileError::ConflictingUpdate(_) | ReconcileError::OrderNumberExhausted { .. } => {
            (StatusCode::CONFLICT, err.to_string())
        }
        ReconcileError::Lookup(_) | ReconcileError::Store(_) => {
            tracing::error!(error = %err, "reconciliation infrastructure error");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        ApiError::Reconcile(err)
    }
}
