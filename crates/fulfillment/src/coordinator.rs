//! Order coordinator: the operations exposed to the HTTP layer.

use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{Actor, OrderId, ProductId};
use domain::{
    Action, Aggregate, CourierService, Decision, Money, Order, OrderDraft, OrderEvent, OrderItem,
    OrderError, OrderStatus, PaymentStatus, Product, ShippingAddress, Target, TrackingEntry,
    TrackingUpdate, authorize,
};
use serde::{Deserialize, Serialize};
use store::{CommerceStore, CommerceStoreExt, EventEnvelope, StoreError};

use crate::config::GatewayConfig;
use crate::error::{FulfillmentError, Result};
use crate::estimator::{ShippingEstimate, ShippingEstimator};
use crate::notification::SignatureVerifier;
use crate::payments::{CustomerContact, PaymentTokenResult, fractional_amount, session_request};
use crate::reconciliation::{NotificationReceipt, ReconciliationHandler};
use crate::services::inventory::InventoryLedger;
use crate::services::payment::{GatewayError, PaymentGateway};
use crate::services::shipping::{Destination, RateSource};

/// Attempts per optimistic order write before giving up.
pub(crate) const MAX_WRITE_ATTEMPTS: usize = 3;

/// Checkout input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub courier_service: CourierService,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Shipment progress of an order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingView {
    pub order_number: String,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub courier_service: CourierService,
    pub tracking_history: Vec<TrackingEntry>,
    pub progress: u8,
    pub latest: Option<TrackingEntry>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl From<&Order> for TrackingView {
    fn from(order: &Order) -> Self {
        Self {
            order_number: order.order_number().to_string(),
            status: order.status(),
            tracking_number: order.tracking_number().map(str::to_string),
            courier_service: order.courier_service(),
            tracking_history: order.tracking_history().to_vec(),
            progress: order.tracking_progress(),
            latest: order.latest_tracking().cloned(),
            shipped_at: order.shipped_at(),
            delivered_at: order.delivered_at(),
        }
    }
}

/// Payment state of an order, for status polling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentStatusView {
    pub order_number: String,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total_amount: Money,
}

/// Shipping estimate for the current cart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartShippingEstimate {
    #[serde(flatten)]
    pub estimate: ShippingEstimate,
    pub subtotal: Money,
    pub total: Money,
}

/// Coordinates the order lifecycle across the store, the shipping estimator
/// and the payment gateway.
///
/// Order writes are optimistic: each loads the order, decides its events,
/// and saves against the loaded version, retrying on conflict.
pub struct OrderCoordinator<S, P, R>
where
    S: CommerceStore,
    P: PaymentGateway,
    R: RateSource,
{
    store: S,
    gateway: P,
    estimator: ShippingEstimator<R>,
    gateway_config: GatewayConfig,
    inventory: InventoryLedger<S>,
    reconciliation: ReconciliationHandler<S>,
}

impl<S, P, R> OrderCoordinator<S, P, R>
where
    S: CommerceStore + Clone,
    P: PaymentGateway,
    R: RateSource,
{
    /// Creates a new order coordinator.
    pub fn new(
        store: S,
        gateway: P,
        estimator: ShippingEstimator<R>,
        gateway_config: GatewayConfig,
    ) -> Self {
        let verifier = SignatureVerifier::new(gateway_config.server_key.clone());
        Self {
            inventory: InventoryLedger::new(store.clone()),
            reconciliation: ReconciliationHandler::new(store.clone(), verifier),
            store,
            gateway,
            estimator,
            gateway_config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn estimator(&self) -> &ShippingEstimator<R> {
        &self.estimator
    }

    /// Turns the actor's cart into an order.
    ///
    /// Shipping is estimated first; stock reservation, numbering, persistence
    /// and cart clearing then happen in one store transaction.
    #[tracing::instrument(skip(self, actor, request), fields(user_id = %actor.user_id))]
    pub async fn create_order_from_cart(
        &self,
        actor: &Actor,
        request: CheckoutRequest,
    ) -> Result<Order> {
        let started = Instant::now();
        let result = self.checkout(actor, request).await;

        match &result {
            Ok(order) => {
                metrics::counter!("orders_placed_total").increment(1);
                metrics::histogram!("order_placement_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    order_number = %order.order_number(),
                    total = %order.total_amount(),
                    "order placed"
                );
            }
            Err(err) => {
                metrics::counter!("order_placement_failures_total", "reason" => err.kind())
                    .increment(1);
                tracing::info!(error = %err, "checkout rejected");
            }
        }
        result
    }

    async fn checkout(&self, actor: &Actor, request: CheckoutRequest) -> Result<Order> {
        ensure_allowed(actor, Action::PlaceOrder, Target::Global)?;

        // Placement refuses a draft whose cart lines moved since they were read.
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let draft = self.draft_from_cart(actor, &request).await?;
            match self.store.place_order(draft).await {
                Err(StoreError::CartChanged { product_id }) => {
                    tracing::debug!(attempt, %product_id, "cart changed during checkout, reloading");
                }
                result => return Ok(result?),
            }
        }
        Err(FulfillmentError::CartChanged)
    }

    async fn draft_from_cart(&self, actor: &Actor, request: &CheckoutRequest) -> Result<OrderDraft> {
        let cart = self.store.get_cart(actor.user_id).await?;
        if cart.is_empty() {
            return Err(FulfillmentError::EmptyCart);
        }

        let ids: Vec<ProductId> = cart.items.iter().map(|item| item.product_id).collect();
        let products = self.store.get_products(&ids).await?;

        let mut lines: Vec<(&Product, u32)> = Vec::with_capacity(cart.items.len());
        let mut items = Vec::with_capacity(cart.items.len());
        for cart_item in &cart.items {
            let product = products
                .iter()
                .find(|p| p.id == cart_item.product_id)
                .ok_or(FulfillmentError::ProductNotFound(cart_item.product_id))?;
            if !product.is_active {
                return Err(domain::CartError::ProductUnavailable {
                    product_id: product.id,
                }
                .into());
            }
            items.push(OrderItem::new(
                product.id,
                product.name.clone(),
                product.sku.clone(),
                cart_item.quantity,
                cart_item.unit_price,
            ));
            lines.push((product, cart_item.quantity));
        }

        let address = request.shipping_address.clone();
        let destination = Destination::city(address.city.clone())
            .with_postal_code(address.postal_code.clone());
        let weight = self.estimator.parcel_weight(lines);
        let estimate = self
            .estimator
            .estimate(&destination, weight, request.courier_service)
            .await;

        Ok(OrderDraft {
            user_id: actor.user_id,
            items,
            shipping_cost: estimate.cost,
            courier_service: request.courier_service,
            shipping_address: address,
            notes: request.notes.clone(),
            placed_at: Utc::now(),
        })
    }

    /// Moves an order along the status table.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn update_order_status(
        &self,
        actor: &Actor,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order> {
        let by = actor.user_id.to_string();
        let order = write_order(&self.store, order_id, |order| {
            ensure_allowed(actor, Action::UpdateOrderStatus, owner_of(order))?;
            Ok(order.change_status(status, &by)?)
        })
        .await?;

        tracing::info!(order_number = %order.order_number(), status = %order.status(), "order status updated");
        Ok(order)
    }

    /// Cancels an unpaid order and returns its stock.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn cancel_order(
        &self,
        actor: &Actor,
        order_id: OrderId,
        reason: Option<String>,
    ) -> Result<Order> {
        let by = actor.user_id.to_string();
        let reason = reason.unwrap_or_else(|| "Cancelled by customer".to_string());
        let order = write_order(&self.store, order_id, |order| {
            ensure_allowed(actor, Action::CancelOrder, owner_of(order))?;
            Ok(order.cancel(reason.clone(), &by)?)
        })
        .await?;

        tracing::info!(order_number = %order.order_number(), "order cancelled");
        Ok(order)
    }

    /// Records a payment status set by staff.
    ///
    /// `failed` takes the system failure path: the order is cancelled and its
    /// stock returned.
    #[tracing::instrument(skip(self, actor, raw_response), fields(user_id = %actor.user_id))]
    pub async fn update_payment_status(
        &self,
        actor: &Actor,
        order_id: OrderId,
        status: PaymentStatus,
        raw_response: Option<serde_json::Value>,
    ) -> Result<Order> {
        write_order(&self.store, order_id, |order| {
            ensure_allowed(actor, Action::UpdateOrderStatus, owner_of(order))?;
            Ok(payment_events(order, status, raw_response.clone())?)
        })
        .await
    }

    /// Appends a tracking entry.
    #[tracing::instrument(skip(self, actor, update), fields(user_id = %actor.user_id, status = %update.status))]
    pub async fn update_tracking(
        &self,
        actor: &Actor,
        order_id: OrderId,
        mut update: TrackingUpdate,
    ) -> Result<Order> {
        update
            .updated_by
            .get_or_insert_with(|| actor.user_id.to_string());
        write_order(&self.store, order_id, |order| {
            ensure_allowed(actor, Action::UpdateTracking, owner_of(order))?;
            Ok(order.update_tracking(update.clone())?)
        })
        .await
    }

    pub async fn get_order(&self, actor: &Actor, order_id: OrderId) -> Result<Order> {
        let order = self.store.load_order(order_id).await?;
        ensure_allowed(actor, Action::ViewOrder, owner_of(&order))?;
        Ok(order)
    }

    /// The actor's own orders, newest first.
    pub async fn list_orders(&self, actor: &Actor) -> Result<Vec<Order>> {
        ensure_allowed(
            actor,
            Action::ViewOrder,
            Target::Order {
                owner: actor.user_id,
            },
        )?;
        Ok(self.store.list_orders_for_user(actor.user_id).await?)
    }

    pub async fn tracking(&self, actor: &Actor, order_id: OrderId) -> Result<TrackingView> {
        let order = self.get_order(actor, order_id).await?;
        Ok(TrackingView::from(&order))
    }

    pub async fn payment_status(
        &self,
        actor: &Actor,
        order_id: OrderId,
    ) -> Result<PaymentStatusView> {
        let order = self.get_order(actor, order_id).await?;
        Ok(PaymentStatusView {
            order_number: order.order_number().to_string(),
            status: order.status(),
            payment_status: order.payment_status(),
            total_amount: order.total_amount(),
        })
    }

    pub async fn order_events(
        &self,
        actor: &Actor,
        order_id: OrderId,
    ) -> Result<Vec<EventEnvelope>> {
        self.get_order(actor, order_id).await?;
        Ok(self.store.get_order_events(order_id).await?)
    }

    /// Opens a payment session for an unpaid order.
    ///
    /// Gateway refusals come back as an unsuccessful result; transport
    /// failures as `GatewayUnavailable`. Not retried.
    #[tracing::instrument(skip(self, actor, contact), fields(user_id = %actor.user_id))]
    pub async fn create_payment(
        &self,
        actor: &Actor,
        order_id: OrderId,
        contact: CustomerContact,
    ) -> Result<PaymentTokenResult> {
        let order = self.store.load_order(order_id).await?;
        ensure_allowed(actor, Action::PayOrder, owner_of(&order))?;
        if !order.payment_status().is_payable() {
            return Err(OrderError::PaymentNotPayable {
                status: order.payment_status(),
            }
            .into());
        }
        // The session carries whole units; a fractional total could never verify.
        if let Some(amount) = fractional_amount(&order) {
            return Err(FulfillmentError::FractionalAmount(amount));
        }

        let request = session_request(&order, &contact, &self.gateway_config);
        match self.gateway.create_session(&request).await {
            Ok(session) => {
                metrics::counter!("payment_tokens_total", "outcome" => "created").increment(1);
                tracing::info!(order_number = %order.order_number(), "payment session created");
                Ok(PaymentTokenResult::created(
                    session.token,
                    session.redirect_url,
                ))
            }
            Err(GatewayError::Rejected(message)) => {
                metrics::counter!("payment_tokens_total", "outcome" => "rejected").increment(1);
                tracing::warn!(order_number = %order.order_number(), error = %message, "payment session rejected");
                Ok(PaymentTokenResult::rejected(message))
            }
            Err(GatewayError::Unavailable(message)) => {
                metrics::counter!("payment_tokens_total", "outcome" => "unavailable").increment(1);
                tracing::error!(order_number = %order.order_number(), error = %message, "payment gateway unavailable");
                Err(FulfillmentError::GatewayUnavailable(message))
            }
        }
    }

    /// Applies a gateway notification. See [`ReconciliationHandler::handle`].
    pub async fn handle_payment_notification(
        &self,
        raw: &serde_json::Value,
    ) -> Result<NotificationReceipt> {
        self.reconciliation.handle(raw).await
    }

    pub async fn estimate_shipping(
        &self,
        destination: &Destination,
        weight_kg: f64,
        courier_service: CourierService,
    ) -> ShippingEstimate {
        self.estimator
            .estimate(destination, weight_kg, courier_service)
            .await
    }

    /// Estimates shipping for the actor's current cart.
    pub async fn estimate_cart(
        &self,
        actor: &Actor,
        destination: &Destination,
        courier_service: CourierService,
    ) -> Result<CartShippingEstimate> {
        ensure_allowed(actor, Action::ManageCart, Target::Global)?;
        let cart = self.store.get_cart(actor.user_id).await?;
        if cart.is_empty() {
            return Err(FulfillmentError::EmptyCart);
        }

        let ids: Vec<ProductId> = cart.items.iter().map(|item| item.product_id).collect();
        let products = self.store.get_products(&ids).await?;
        let lines = cart.items.iter().filter_map(|item| {
            products
                .iter()
                .find(|p| p.id == item.product_id)
                .map(|p| (p, item.quantity))
        });
        let weight = self.estimator.parcel_weight(lines);

        let estimate = self
            .estimator
            .estimate(destination, weight, courier_service)
            .await;
        let subtotal = cart.subtotal();
        Ok(CartShippingEstimate {
            total: subtotal + estimate.cost,
            subtotal,
            estimate,
        })
    }

    /// Inserts or replaces a catalog row.
    pub async fn upsert_product(&self, actor: &Actor, product: Product) -> Result<Product> {
        ensure_allowed(actor, Action::ManageCatalog, Target::Global)?;
        if !product.price.is_whole() {
            return Err(FulfillmentError::FractionalAmount(product.price));
        }
        self.store.upsert_product(product.clone()).await?;
        Ok(product)
    }

    /// Applies a signed stock correction and returns the product.
    pub async fn adjust_stock(
        &self,
        actor: &Actor,
        product_id: ProductId,
        delta: i64,
    ) -> Result<Product> {
        ensure_allowed(actor, Action::ManageCatalog, Target::Global)?;
        self.inventory.adjust(product_id, delta).await?;
        Ok(self.store.load_product(product_id).await?)
    }
}

/// Fails with `Forbidden` unless the policy allows the action.
pub(crate) fn ensure_allowed(actor: &Actor, action: Action, target: Target) -> Result<()> {
    match authorize(actor, action, target) {
        Decision::Allow => Ok(()),
        Decision::Deny(reason) => {
            tracing::debug!(?action, %reason, "access denied");
            Err(FulfillmentError::Forbidden(reason))
        }
    }
}

fn owner_of(order: &Order) -> Target {
    Target::Order {
        owner: order.user_id(),
    }
}

/// Events for setting a payment status. `failed` cancels and restocks.
pub(crate) fn payment_events(
    order: &Order,
    status: PaymentStatus,
    raw_response: Option<serde_json::Value>,
) -> std::result::Result<Vec<OrderEvent>, OrderError> {
    match status {
        PaymentStatus::Failed => order.fail_payment(raw_response),
        other => order.record_payment(other, raw_response),
    }
}

/// Loads an order, asks `decide` for events and saves them against the
/// loaded version, retrying on version conflicts.
///
/// Returns the order unchanged when `decide` yields no events.
pub(crate) async fn write_order<S, F>(store: &S, order_id: OrderId, mut decide: F) -> Result<Order>
where
    S: CommerceStore + ?Sized,
    F: FnMut(&Order) -> Result<Vec<OrderEvent>> + Send,
{
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        let mut order = store.load_order(order_id).await?;
        let expected = order.version();

        let events = decide(&order)?;
        if events.is_empty() {
            return Ok(order);
        }

        order.apply_events(events.iter().cloned());
        match store.save_order(&order, &events, expected).await {
            Ok(version) => {
                order.set_version(version);
                // One per product line, matching `InventoryLedger::restore`.
                let restored: usize = events.iter().map(|e| e.restored_lines().len()).sum();
                if restored > 0 {
                    metrics::counter!("stock_restorations_total").increment(restored as u64);
                }
                return Ok(order);
            }
            Err(StoreError::ConcurrencyConflict { .. }) => {
                tracing::debug!(%order_id, attempt, "order write conflicted, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }

    tracing::warn!(%order_id, "order write abandoned after repeated conflicts");
    Err(FulfillmentError::Contended(order_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EstimatorConfig;
    use crate::services::payment::InMemoryPaymentGateway;
    use crate::services::shipping::InMemoryRateSource;
    use common::{Role, UserId};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use store::{InMemoryStore, Version};

    type TestCoordinator = OrderCoordinator<InMemoryStore, InMemoryPaymentGateway, InMemoryRateSource>;

    fn coordinator(store: InMemoryStore) -> TestCoordinator {
        OrderCoordinator::new(
            store,
            InMemoryPaymentGateway::new(),
            ShippingEstimator::new(InMemoryRateSource::new(), EstimatorConfig::default()),
            GatewayConfig::default(),
        )
    }

    fn checkout(city: &str) -> CheckoutRequest {
        CheckoutRequest {
            shipping_address: ShippingAddress {
                name: "Andi".to_string(),
                phone: "0811".to_string(),
                address: "Jl. Riau 10".to_string(),
                city: city.to_string(),
                state: "Riau".to_string(),
                postal_code: "28127".to_string(),
            },
            courier_service: CourierService::Regular,
            notes: None,
        }
    }

    async fn placed(store: &InMemoryStore, coordinator: &TestCoordinator, actor: &Actor) -> Order {
        let product = Product::new("Shoes", "SHO-1", Money::from_major(50_000), 10);
        store.upsert_product(product.clone()).await.unwrap();
        let mut cart = store.get_cart(actor.user_id).await.unwrap();
        cart.add_item(&product, 1, Utc::now()).unwrap();
        store.save_cart(&cart).await.unwrap();
        coordinator
            .create_order_from_cart(actor, checkout("Pekanbaru"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_checkout_prices_shipping_from_rate_table() {
        let store = InMemoryStore::new();
        let coordinator = coordinator(store.clone());
        let actor = Actor::customer(UserId::new());

        let order = placed(&store, &coordinator, &actor).await;

        assert_eq!(order.shipping_cost(), Money::from_major(8_000));
        assert_eq!(order.total_amount(), Money::from_major(58_000));
    }

    #[tokio::test]
    async fn test_empty_cart() {
        let coordinator = coordinator(InMemoryStore::new());
        let actor = Actor::customer(UserId::new());

        let result = coordinator
            .create_order_from_cart(&actor, checkout("Pekanbaru"))
            .await;
        assert!(matches!(result, Err(FulfillmentError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_customer_cannot_change_status() {
        let store = InMemoryStore::new();
        let coordinator = coordinator(store.clone());
        let actor = Actor::customer(UserId::new());
        let order = placed(&store, &coordinator, &actor).await;

        let result = coordinator
            .update_order_status(&actor, order.id(), OrderStatus::Processing)
            .await;
        assert!(matches!(result, Err(FulfillmentError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_other_customer_cannot_view() {
        let store = InMemoryStore::new();
        let coordinator = coordinator(store.clone());
        let owner = Actor::customer(UserId::new());
        let order = placed(&store, &coordinator, &owner).await;

        let stranger = Actor::customer(UserId::new());
        assert!(coordinator.get_order(&stranger, order.id()).await.is_err());

        let admin = Actor::new(UserId::new(), Role::Admin);
        assert!(coordinator.get_order(&admin, order.id()).await.is_ok());
    }

    #[tokio::test]
    async fn test_write_order_without_events_keeps_version() {
        let store = InMemoryStore::new();
        let coordinator = coordinator(store.clone());
        let actor = Actor::customer(UserId::new());
        let order = placed(&store, &coordinator, &actor).await;

        let unchanged = write_order(&store, order.id(), |_| Ok(vec![])).await.unwrap();
        assert_eq!(unchanged.version(), order.version());
    }

    #[tokio::test]
    async fn test_write_order_unknown_order() {
        let store = InMemoryStore::new();
        let result = write_order(&store, OrderId::new(), |_| Ok(vec![])).await;
        assert!(matches!(result, Err(FulfillmentError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_fractional_price_rejected() {
        let store = InMemoryStore::new();
        let coordinator = coordinator(store.clone());
        let admin = Actor::new(UserId::new(), Role::Admin);
        let price: Money = "50000.50".parse().unwrap();
        let product = Product::new("Shoes", "SHO-2", price, 10);

        let result = coordinator.upsert_product(&admin, product.clone()).await;
        assert!(matches!(result, Err(FulfillmentError::FractionalAmount(p)) if p == price));
        assert!(store.get_product(product.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_payment_refused_for_fractional_total() {
        let store = InMemoryStore::new();
        let coordinator = coordinator(store.clone());
        let actor = Actor::customer(UserId::new());
        // Written straight to the store, as a row predating the price check would be.
        let product = Product::new("Shoes", "SHO-3", "50000.50".parse().unwrap(), 10);
        store.upsert_product(product.clone()).await.unwrap();
        let mut cart = store.get_cart(actor.user_id).await.unwrap();
        cart.add_item(&product, 1, Utc::now()).unwrap();
        store.save_cart(&cart).await.unwrap();
        let order = coordinator
            .create_order_from_cart(&actor, checkout("Pekanbaru"))
            .await
            .unwrap();

        let contact = CustomerContact {
            name: "Andi".to_string(),
            email: "andi@example.com".to_string(),
            phone: "0811".to_string(),
        };
        let result = coordinator.create_payment(&actor, order.id(), contact).await;
        assert!(matches!(result, Err(FulfillmentError::FractionalAmount(_))));
    }

    #[tokio::test]
    async fn test_adjust_stock_out_of_range() {
        let store = InMemoryStore::new();
        let coordinator = coordinator(store.clone());
        let admin = Actor::new(UserId::new(), Role::Admin);
        let product = Product::new("Shoes", "SHO-4", Money::from_major(50_000), 10);
        store.upsert_product(product.clone()).await.unwrap();

        let result = coordinator
            .adjust_stock(&admin, product.id, i64::from(u32::MAX))
            .await;
        assert!(matches!(result, Err(FulfillmentError::StockOutOfRange { .. })));
        assert_eq!(store.load_product(product.id).await.unwrap().stock, 10);
    }

    /// Raises the first cart line right before each of the first
    /// `bumps` placements, as a concurrent cart update would.
    #[derive(Clone)]
    struct CartRacingStore {
        inner: InMemoryStore,
        bumps: Arc<AtomicU32>,
    }

    #[async_trait::async_trait]
    impl CommerceStore for CartRacingStore {
        async fn upsert_product(&self, product: Product) -> store::Result<()> {
            self.inner.upsert_product(product).await
        }

        async fn get_product(&self, id: ProductId) -> store::Result<Option<Product>> {
            self.inner.get_product(id).await
        }

        async fn get_products(&self, ids: &[ProductId]) -> store::Result<Vec<Product>> {
            self.inner.get_products(ids).await
        }

        async fn reserve_stock(&self, product_id: ProductId, quantity: u32) -> store::Result<u32> {
            self.inner.reserve_stock(product_id, quantity).await
        }

        async fn restore_stock(&self, product_id: ProductId, quantity: u32) -> store::Result<u32> {
            self.inner.restore_stock(product_id, quantity).await
        }

        async fn get_cart(&self, user_id: UserId) -> store::Result<domain::Cart> {
            self.inner.get_cart(user_id).await
        }

        async fn save_cart(&self, cart: &domain::Cart) -> store::Result<()> {
            self.inner.save_cart(cart).await
        }

        async fn place_order(&self, draft: OrderDraft) -> store::Result<Order> {
            let bump = self
                .bumps
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if bump {
                let mut cart = self.inner.get_cart(draft.user_id).await?;
                let product = self.inner.load_product(cart.items[0].product_id).await?;
                let quantity = cart.items[0].quantity + 1;
                cart.update_item(&product, quantity, Utc::now()).unwrap();
                self.inner.save_cart(&cart).await?;
            }
            self.inner.place_order(draft).await
        }

        async fn get_order(&self, id: OrderId) -> store::Result<Option<Order>> {
            self.inner.get_order(id).await
        }

        async fn find_order_by_number(&self, order_number: &str) -> store::Result<Option<Order>> {
            self.inner.find_order_by_number(order_number).await
        }

        async fn list_orders_for_user(&self, user_id: UserId) -> store::Result<Vec<Order>> {
            self.inner.list_orders_for_user(user_id).await
        }

        async fn save_order(
            &self,
            order: &Order,
            events: &[OrderEvent],
            expected: Version,
        ) -> store::Result<Version> {
            self.inner.save_order(order, events, expected).await
        }

        async fn get_order_events(&self, order_id: OrderId) -> store::Result<Vec<EventEnvelope>> {
            self.inner.get_order_events(order_id).await
        }
    }

    async fn racing_checkout(bumps: u32) -> (CartRacingStore, Product, Result<Order>) {
        let store = CartRacingStore {
            inner: InMemoryStore::new(),
            bumps: Arc::new(AtomicU32::new(bumps)),
        };
        let product = Product::new("Ball", "BAL-1", Money::from_major(90_000), 10);
        store.upsert_product(product.clone()).await.unwrap();
        let actor = Actor::customer(UserId::new());
        let mut cart = store.get_cart(actor.user_id).await.unwrap();
        cart.add_item(&product, 2, Utc::now()).unwrap();
        store.save_cart(&cart).await.unwrap();

        let coordinator = OrderCoordinator::new(
            store.clone(),
            InMemoryPaymentGateway::new(),
            ShippingEstimator::new(InMemoryRateSource::new(), EstimatorConfig::default()),
            GatewayConfig::default(),
        );
        let result = coordinator
            .create_order_from_cart(&actor, checkout("Pekanbaru"))
            .await;
        (store, product, result)
    }

    #[tokio::test]
    async fn test_checkout_rereads_cart_changed_mid_placement() {
        let (store, product, result) = racing_checkout(1).await;

        let order = result.unwrap();
        assert_eq!(order.items()[0].quantity, 3);
        assert_eq!(store.load_product(product.id).await.unwrap().stock, 7);
        let cart = store.get_cart(order.user_id()).await.unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_checkout_gives_up_on_a_cart_that_keeps_changing() {
        let (store, product, result) = racing_checkout(MAX_WRITE_ATTEMPTS as u32).await;

        assert!(matches!(result, Err(FulfillmentError::CartChanged)));
        assert_eq!(store.load_product(product.id).await.unwrap().stock, 10);
        assert_eq!(store.inner.order_count().await, 0);
    }
}
