use async_trait::async_trait;
use common::{OrderId, ProductId, UserId};
use domain::{Cart, Order, OrderDraft, OrderEvent, Product, Version};

use crate::{EventEnvelope, Result, StoreError};

/// Core trait for commerce persistence.
///
/// Implementations must serialize stock changes per product so that stock can
/// never go below zero, and must make [`place_order`] and [`save_order`]
/// all-or-nothing. All implementations must be thread-safe (Send + Sync).
///
/// [`place_order`]: CommerceStore::place_order
/// [`save_order`]: CommerceStore::save_order
#[async_trait]
pub trait CommerceStore: Send + Sync {
    /// Inserts or replaces a catalog row.
    async fn upsert_product(&self, product: Product) -> Result<()>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Fetches the products that exist among `ids`, in no particular order.
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Atomically decrements stock and returns the new level.
    ///
    /// Fails with `InsufficientStock` without changing anything if fewer than
    /// `quantity` units are available.
    async fn reserve_stock(&self, product_id: ProductId, quantity: u32) -> Result<u32>;

    /// Atomically increments stock and returns the new level.
    ///
    /// Fails with `QuantityOutOfRange` if the new level would exceed
    /// [`MAX_STOCK`].
    async fn restore_stock(&self, product_id: ProductId, quantity: u32) -> Result<u32>;

    /// Returns the user's cart, or a new empty one if none was saved yet.
    async fn get_cart(&self, user_id: UserId) -> Result<Cart>;

    async fn save_cart(&self, cart: &Cart) -> Result<()>;

    /// Places an order in a single transaction.
    ///
    /// Reserves stock for every line, allocates the next daily order number,
    /// stores the order with its items and `OrderPlaced` event, and removes
    /// the ordered lines from the user's cart. Any failure leaves no trace.
    ///
    /// Fails with `CartChanged` if the user's cart holds a line for an ordered
    /// product with a different quantity than the draft, so a concurrent cart
    /// update is never silently dropped.
    async fn place_order(&self, draft: OrderDraft) -> Result<Order>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    async fn find_order_by_number(&self, order_number: &str) -> Result<Option<Order>>;

    /// Returns a user's orders, newest first.
    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Persists `order` after `events` were applied to it.
    ///
    /// Fails with `ConcurrencyConflict` if the stored version is not
    /// `expected`. Stock lines carried by `StockRestored` events are returned
    /// to inventory in the same transaction. Returns the new version.
    async fn save_order(
        &self,
        order: &Order,
        events: &[OrderEvent],
        expected: Version,
    ) -> Result<Version>;

    /// Retrieves the event log of an order, oldest first.
    async fn get_order_events(&self, order_id: OrderId) -> Result<Vec<EventEnvelope>>;
}

/// Extension trait providing convenience methods for commerce stores.
#[async_trait]
pub trait CommerceStoreExt: CommerceStore {
    /// Loads an order, failing with `OrderNotFound` if it doesn't exist.
    async fn load_order(&self, id: OrderId) -> Result<Order> {
        self.get_order(id)
            .await?
            .ok_or(StoreError::OrderNotFound(id))
    }

    /// Loads a product, failing with `ProductNotFound` if it doesn't exist.
    async fn load_product(&self, id: ProductId) -> Result<Product> {
        self.get_product(id)
            .await?
            .ok_or(StoreError::ProductNotFound(id))
    }
}

// Blanket implementation for all CommerceStore implementations
impl<T: CommerceStore + ?Sized> CommerceStoreExt for T {}

/// Largest stock level or single quantity the store accepts.
pub const MAX_STOCK: u32 = i32::MAX as u32;

/// Validates a quantity against [`MAX_STOCK`], returning it as a column value.
pub(crate) fn stock_param(product_id: ProductId, quantity: u32) -> Result<i32> {
    i32::try_from(quantity).map_err(|_| StoreError::QuantityOutOfRange {
        product_id,
        quantity,
    })
}

/// Events carrying stock back to inventory, flattened to lines.
pub(crate) fn restock_lines(events: &[OrderEvent]) -> Vec<domain::StockLine> {
    events
        .iter()
        .flat_map(|event| event.restored_lines().iter().copied())
        .collect()
}
