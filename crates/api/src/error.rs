//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{CartError, OrderError};
use fulfillment::FulfillmentError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// No usable identity on the request.
    Unauthorized(String),
    /// Order lifecycle error.
    Fulfillment(FulfillmentError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Fulfillment(err) => fulfillment_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn fulfillment_error_to_response(err: FulfillmentError) -> (StatusCode, String) {
    let status = match &err {
        FulfillmentError::EmptyCart
        | FulfillmentError::InvalidNotification(_)
        | FulfillmentError::StockOutOfRange { .. }
        | FulfillmentError::FractionalAmount(_) => StatusCode::BAD_REQUEST,
        FulfillmentError::OrderNotFound(_) | FulfillmentError::ProductNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        FulfillmentError::InvalidSignature | FulfillmentError::Forbidden(_) => {
            StatusCode::FORBIDDEN
        }
        FulfillmentError::InsufficientStock { .. }
        | FulfillmentError::InvalidTransition { .. }
        | FulfillmentError::Contended(_)
        | FulfillmentError::CartChanged => StatusCode::CONFLICT,
        FulfillmentError::CannotCancelPaidOrder | FulfillmentError::TrackingNotAllowed { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        FulfillmentError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
        FulfillmentError::Order(order_err) => match order_err {
            OrderError::EmptyCart | OrderError::InvalidQuantity { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        },
        FulfillmentError::Cart(cart_err) => match cart_err {
            CartError::InvalidQuantity { .. } => StatusCode::BAD_REQUEST,
            CartError::ItemNotFound { .. } => StatusCode::NOT_FOUND,
            CartError::InsufficientStock { .. } => StatusCode::CONFLICT,
            CartError::ProductUnavailable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        },
        FulfillmentError::Store(_) => {
            tracing::error!(error = %err, "store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}
