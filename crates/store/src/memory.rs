use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use common::{OrderId, ProductId, UserId};
use domain::{Aggregate, Cart, Order, OrderDraft, OrderEvent, OrderNumber, Product, Version};
use tokio::sync::RwLock;

use crate::{
    EventEnvelope, Result, StoreError,
    store::{CommerceStore, MAX_STOCK, restock_lines, stock_param},
};

#[derive(Default)]
struct State {
    products: HashMap<ProductId, Product>,
    carts: HashMap<UserId, Cart>,
    orders: HashMap<OrderId, Order>,
    events: Vec<EventEnvelope>,
    daily_sequences: HashMap<NaiveDate, u32>,
}

impl State {
    fn reserve(&mut self, product_id: ProductId, quantity: u32) -> Result<u32> {
        stock_param(product_id, quantity)?;
        let product = self
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;
        if product.stock < quantity {
            metrics::counter!("stock_reservations_rejected_total").increment(1);
            return Err(StoreError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.stock,
            });
        }
        product.stock -= quantity;
        Ok(product.stock)
    }

    /// Returns `None` if the product no longer exists.
    fn restore(&mut self, product_id: ProductId, quantity: u32) -> Result<Option<u32>> {
        stock_param(product_id, quantity)?;
        let Some(product) = self.products.get_mut(&product_id) else {
            return Ok(None);
        };
        let stock = product
            .stock
            .checked_add(quantity)
            .filter(|stock| *stock <= MAX_STOCK)
            .ok_or(StoreError::QuantityOutOfRange {
                product_id,
                quantity,
            })?;
        product.stock = stock;
        Ok(Some(stock))
    }

    /// Fails if the user's cart disagrees with the quantities being ordered.
    fn verify_cart(&self, draft: &OrderDraft) -> Result<()> {
        let Some(cart) = self.carts.get(&draft.user_id) else {
            return Ok(());
        };
        for item in &draft.items {
            if let Some(line) = cart.item(&item.product_id) {
                if line.quantity != item.quantity {
                    return Err(StoreError::CartChanged {
                        product_id: item.product_id,
                    });
                }
            }
        }
        Ok(())
    }

    /// Undoes reservations made earlier under the same lock.
    fn release(&mut self, reserved: Vec<(ProductId, u32)>) {
        for (product_id, quantity) in reserved {
            // Cannot overflow: the units were taken out under this lock.
            self.restore(product_id, quantity).ok();
        }
    }
}

/// In-memory store implementation for tests and local runs.
///
/// A single lock guards all state, so every operation is trivially
/// serializable and multi-step writes are all-or-nothing.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.state.read().await.events.len()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl CommerceStore for InMemoryStore {
    async fn upsert_product(&self, product: Product) -> Result<()> {
        stock_param(product.id, product.stock)?;
        self.state
            .write()
            .await
            .products
            .insert(product.id, product);
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn reserve_stock(&self, product_id: ProductId, quantity: u32) -> Result<u32> {
        self.state.write().await.reserve(product_id, quantity)
    }

    async fn restore_stock(&self, product_id: ProductId, quantity: u32) -> Result<u32> {
        self.state
            .write()
            .await
            .restore(product_id, quantity)?
            .ok_or(StoreError::ProductNotFound(product_id))
    }

    async fn get_cart(&self, user_id: UserId) -> Result<Cart> {
        let state = self.state.read().await;
        Ok(state
            .carts
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| Cart::new(user_id)))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<()> {
        self.state
            .write()
            .await
            .carts
            .insert(cart.user_id, cart.clone());
        Ok(())
    }

    async fn place_order(&self, draft: OrderDraft) -> Result<Order> {
        if draft.items.is_empty() {
            return Err(domain::OrderError::EmptyCart.into());
        }

        let mut state = self.state.write().await;
        state.verify_cart(&draft)?;

        // Reserve every line, undoing earlier reservations on the first failure.
        let mut reserved = Vec::with_capacity(draft.items.len());
        for item in &draft.items {
            match state.reserve(item.product_id, item.quantity) {
                Ok(_) => reserved.push((item.product_id, item.quantity)),
                Err(err) => {
                    state.release(reserved);
                    return Err(err);
                }
            }
        }

        let day = draft.placed_at.date_naive();
        let sequence = state.daily_sequences.get(&day).copied().unwrap_or(0) + 1;
        let user_id = draft.user_id;
        let ordered: Vec<ProductId> = draft.items.iter().map(|item| item.product_id).collect();

        let order_id = OrderId::new();
        let (order, placed) = match Order::place(order_id, draft, OrderNumber::new(day, sequence))
        {
            Ok(placed) => placed,
            Err(err) => {
                state.release(reserved);
                return Err(err.into());
            }
        };
        let envelope = EventEnvelope::new(order_id, Version::first(), &placed)?;

        state.daily_sequences.insert(day, sequence);
        state.orders.insert(order_id, order.clone());
        state.events.push(envelope);
        if let Some(cart) = state.carts.get_mut(&user_id) {
            cart.remove_lines(&ordered, Utc::now());
        }

        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn find_order_by_number(&self, order_number: &str) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .find(|order| order.order_number().as_str() == order_number)
            .cloned())
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|order| order.user_id() == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.order_number().as_str().cmp(a.order_number().as_str()))
        });
        Ok(orders)
    }

    async fn save_order(
        &self,
        order: &Order,
        events: &[OrderEvent],
        expected: Version,
    ) -> Result<Version> {
        let order_id = order.id();
        let mut state = self.state.write().await;

        let actual = state
            .orders
            .get(&order_id)
            .map(|stored| stored.version())
            .ok_or(StoreError::OrderNotFound(order_id))?;
        if actual != expected {
            metrics::counter!("order_version_conflicts_total").increment(1);
            return Err(StoreError::ConcurrencyConflict {
                order_id,
                expected,
                actual,
            });
        }
        if events.is_empty() {
            return Ok(expected);
        }

        let envelopes = EventEnvelope::sequence(order_id, expected, events)?;
        let new_version = expected.advance(events.len());

        // The product row may have been removed since checkout.
        let mut restored = Vec::new();
        for line in restock_lines(events) {
            match state.restore(line.product_id, line.quantity) {
                Ok(Some(_)) => restored.push(line),
                Ok(None) => {}
                Err(err) => {
                    for line in restored {
                        state.reserve(line.product_id, line.quantity).ok();
                    }
                    return Err(err);
                }
            }
        }

        let mut stored = order.clone();
        stored.set_version(new_version);
        state.orders.insert(order_id, stored);
        state.events.extend(envelopes);

        Ok(new_version)
    }

    async fn get_order_events(&self, order_id: OrderId) -> Result<Vec<EventEnvelope>> {
        let state = self.state.read().await;
        let mut events: Vec<_> = state
            .events
            .iter()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }
}
