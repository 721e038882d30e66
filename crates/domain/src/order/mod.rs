//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod state;
mod tracking;
mod value_objects;

pub use aggregate::{Order, SYSTEM_ACTOR};
pub use commands::{OrderDraft, TrackingUpdate};
pub use events::{
    OrderCancelledData, OrderEvent, OrderPlacedData, PaymentStatusChangedData, StatusChangedData,
    StockRestoredData, TrackingNumberAssignedData, TrackingUpdatedData,
};
pub use state::{OrderStatus, PaymentStatus};
pub use tracking::{TrackingEntry, TrackingStatus};
pub use value_objects::{CourierService, OrderItem, OrderNumber, ShippingAddress, StockLine};

use common::ProductId;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderError {
    /// Checkout was attempted with no items.
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Invalid quantity for product {product_id}")]
    InvalidQuantity { product_id: ProductId },

    /// Status change not in the allowed-transition table.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Invalid payment status transition from {from} to {to}")]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Order has been paid and cannot be cancelled")]
    CannotCancelPaidOrder,

    /// Tracking needs a paid order that is processing or shipped.
    #[error("Tracking cannot be updated for an order in status {status} with payment {payment_status}")]
    TrackingNotAllowed {
        status: OrderStatus,
        payment_status: PaymentStatus,
    },

    #[error("Payment cannot be started for an order with payment status {status}")]
    PaymentNotPayable { status: PaymentStatus },

    /// Line totals or the order total do not fit the money range.
    #[error("Order amount is too large")]
    AmountOverflow,
}
