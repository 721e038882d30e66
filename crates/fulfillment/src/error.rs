//! Fulfillment error types.

use common::ProductId;
use domain::{CartError, DenyReason, Money, OrderError, OrderStatus, PaymentStatus};
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by the order lifecycle operations.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// Checkout was attempted with an empty cart.
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order has been paid and cannot be cancelled")]
    CannotCancelPaidOrder,

    /// Lookup key is the order id or the external order number.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Payment notification signature did not match.
    #[error("Invalid notification signature")]
    InvalidSignature,

    /// Notification body could not be parsed.
    #[error("Invalid payment notification: {0}")]
    InvalidNotification(String),

    /// Transport-level failure talking to the payment gateway.
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Tracking cannot be updated for an order in status {status} with payment {payment_status}")]
    TrackingNotAllowed {
        status: OrderStatus,
        payment_status: PaymentStatus,
    },

    #[error("Forbidden: {0}")]
    Forbidden(DenyReason),

    /// Optimistic writes kept losing to concurrent updates.
    #[error("Order {0} is being updated concurrently, try again")]
    Contended(String),

    /// The cart kept changing while checkout was placing the order.
    #[error("Cart changed during checkout, try again")]
    CartChanged,

    /// A stock level or correction does not fit the stock range.
    #[error("Stock change for product {product_id} is out of range")]
    StockOutOfRange { product_id: ProductId },

    /// The payment gateway only takes whole currency units.
    #[error("Amount {0} is not a whole currency unit")]
    FractionalAmount(Money),

    /// Remaining order rule violations.
    #[error(transparent)]
    Order(OrderError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<OrderError> for FulfillmentError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::EmptyCart => FulfillmentError::EmptyCart,
            OrderError::InvalidTransition { from, to } => {
                FulfillmentError::InvalidTransition { from, to }
            }
            OrderError::CannotCancelPaidOrder => FulfillmentError::CannotCancelPaidOrder,
            OrderError::TrackingNotAllowed {
                status,
                payment_status,
            } => FulfillmentError::TrackingNotAllowed {
                status,
                payment_status,
            },
            other => FulfillmentError::Order(other),
        }
    }
}

impl From<StoreError> for FulfillmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => FulfillmentError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            StoreError::OrderNotFound(id) => FulfillmentError::OrderNotFound(id.to_string()),
            StoreError::ProductNotFound(id) => FulfillmentError::ProductNotFound(id),
            StoreError::QuantityOutOfRange { product_id, .. } => {
                FulfillmentError::StockOutOfRange { product_id }
            }
            StoreError::CartChanged { .. } => FulfillmentError::CartChanged,
            StoreError::Order(err) => err.into(),
            other => FulfillmentError::Store(other),
        }
    }
}

impl FulfillmentError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FulfillmentError::EmptyCart => "empty_cart",
            FulfillmentError::InsufficientStock { .. } => "insufficient_stock",
            FulfillmentError::InvalidTransition { .. } => "invalid_transition",
            FulfillmentError::CannotCancelPaidOrder => "cannot_cancel_paid_order",
            FulfillmentError::OrderNotFound(_) => "order_not_found",
            FulfillmentError::ProductNotFound(_) => "product_not_found",
            FulfillmentError::InvalidSignature => "invalid_signature",
            FulfillmentError::InvalidNotification(_) => "invalid_notification",
            FulfillmentError::GatewayUnavailable(_) => "gateway_unavailable",
            FulfillmentError::TrackingNotAllowed { .. } => "tracking_not_allowed",
            FulfillmentError::Forbidden(_) => "forbidden",
            FulfillmentError::Contended(_) => "contended",
            FulfillmentError::CartChanged => "cart_changed",
            FulfillmentError::StockOutOfRange { .. } => "stock_out_of_range",
            FulfillmentError::FractionalAmount(_) => "fractional_amount",
            FulfillmentError::Order(_) => "order_rule",
            FulfillmentError::Cart(_) => "cart_rule",
            FulfillmentError::Store(_) => "store",
        }
    }
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderId;

    #[test]
    fn order_errors_map_to_typed_kinds() {
        let err: FulfillmentError = OrderError::CannotCancelPaidOrder.into();
        assert!(matches!(err, FulfillmentError::CannotCancelPaidOrder));

        let err: FulfillmentError = OrderError::PaymentNotPayable {
            status: PaymentStatus::Paid,
        }
        .into();
        assert!(matches!(err, FulfillmentError::Order(_)));
    }

    #[test]
    fn store_errors_unwrap_nested_order_errors() {
        let err: FulfillmentError = StoreError::Order(OrderError::EmptyCart).into();
        assert!(matches!(err, FulfillmentError::EmptyCart));

        let id = OrderId::new();
        let err: FulfillmentError = StoreError::OrderNotFound(id).into();
        assert_eq!(err.to_string(), format!("Order not found: {id}"));
    }

    #[test]
    fn stock_range_errors_keep_the_product() {
        let product_id = ProductId::new();
        let err: FulfillmentError = StoreError::QuantityOutOfRange {
            product_id,
            quantity: u32::MAX,
        }
        .into();
        assert!(matches!(
            err,
            FulfillmentError::StockOutOfRange { product_id: id } if id == product_id
        ));
        assert_eq!(err.kind(), "stock_out_of_range");
    }
}
