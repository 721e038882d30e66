use common::{OrderId, ProductId};
use domain::{OrderError, Version};
use thiserror::Error;

/// Errors that can occur when interacting with the commerce store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The order was modified since it was loaded.
    #[error(
        "Concurrency conflict for order {order_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        order_id: OrderId,
        expected: Version,
        actual: Version,
    },

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A reservation asked for more than the product has in stock.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A stock quantity or resulting level does not fit the stock column.
    #[error("Stock quantity {quantity} for product {product_id} is out of range")]
    QuantityOutOfRange { product_id: ProductId, quantity: u32 },

    /// The cart line no longer matches the quantity being ordered.
    #[error("Cart line for product {product_id} changed during checkout")]
    CartChanged { product_id: ProductId },

    /// The order aggregate rejected the placement.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
