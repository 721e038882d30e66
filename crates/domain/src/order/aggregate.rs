//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{Aggregate, Version},
    money::Money,
};

use super::{
    CourierService, OrderDraft, OrderError, OrderEvent, OrderItem, OrderNumber, OrderStatus,
    PaymentStatus, ShippingAddress, StockLine, TrackingEntry, TrackingStatus, TrackingUpdate,
    events::OrderPlacedData, tracking::status_progress,
};

/// Actor recorded for transitions triggered by the system itself.
pub const SYSTEM_ACTOR: &str = "system";

/// Order aggregate root.
///
/// Holds the frozen checkout snapshot (items, amounts, address) and the two
/// parallel status axes. Amounts never change after placement; the tracking
/// history is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,

    /// Current version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    order_number: OrderNumber,
    user_id: UserId,
    status: OrderStatus,
    payment_status: PaymentStatus,
    items: Vec<OrderItem>,
    subtotal: Money,
    shipping_cost: Money,
    total_amount: Money,
    courier_service: CourierService,
    shipping_address: ShippingAddress,
    notes: Option<String>,
    tracking_number: Option<String>,
    tracking_history: Vec<TrackingEntry>,

    /// Last raw payload received from the payment gateway.
    payment_response: Option<serde_json::Value>,

    /// Set once reserved stock has been handed back.
    #[serde(default)]
    stock_restored: bool,

    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderPlaced(data) => *self = Order::from_placed(data),
            OrderEvent::StatusChanged(data) => {
                self.enter_status(data.to, data.changed_at);
                self.updated_at = data.changed_at;
            }
            OrderEvent::PaymentStatusChanged(data) => {
                self.payment_status = data.to;
                if data.raw_response.is_some() {
                    self.payment_response = data.raw_response;
                }
                self.updated_at = data.changed_at;
            }
            OrderEvent::TrackingNumberAssigned(data) => {
                self.tracking_number = Some(data.tracking_number);
                self.updated_at = data.assigned_at;
            }
            OrderEvent::TrackingUpdated(data) => self.apply_tracking_entry(data.entry),
            OrderEvent::OrderCancelled(data) => {
                self.status = OrderStatus::Cancelled;
                self.updated_at = data.cancelled_at;
            }
            OrderEvent::StockRestored(data) => {
                self.stock_restored = true;
                self.updated_at = data.restored_at;
            }
        }
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn shipping_cost(&self) -> Money {
        self.shipping_cost
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn courier_service(&self) -> CourierService {
        self.courier_service
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn tracking_history(&self) -> &[TrackingEntry] {
        &self.tracking_history
    }

    pub fn payment_response(&self) -> Option<&serde_json::Value> {
        self.payment_response.as_ref()
    }

    pub fn stock_restored(&self) -> bool {
        self.stock_restored
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true if the owner or an admin may cancel right now.
    pub fn can_be_cancelled(&self) -> bool {
        self.status.is_cancellable() && self.payment_status != PaymentStatus::Paid
    }

    /// Returns true if shipment tracking may be recorded right now.
    pub fn can_update_tracking(&self) -> bool {
        self.status.accepts_tracking() && self.payment_status == PaymentStatus::Paid
    }

    pub fn latest_tracking(&self) -> Option<&TrackingEntry> {
        self.tracking_history.last()
    }

    /// Delivery progress from 0 to 100.
    ///
    /// Uses the latest tracking entry; entries without a progress step fall
    /// back to the order status.
    pub fn tracking_progress(&self) -> u8 {
        self.latest_tracking()
            .and_then(|entry| entry.status.progress())
            .unwrap_or_else(|| status_progress(self.status))
    }

    /// Quantities reserved by this order, one line per item.
    pub fn stock_lines(&self) -> Vec<StockLine> {
        self.items
            .iter()
            .map(|item| StockLine {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect()
    }

    /// Rebuilds an order from its event log.
    ///
    /// Returns `None` if the log does not start with `OrderPlaced`.
    pub fn replay(events: impl IntoIterator<Item = OrderEvent>) -> Option<Order> {
        let mut events = events.into_iter();
        let mut order = match events.next()? {
            OrderEvent::OrderPlaced(data) => Order::from_placed(data),
            _ => return None,
        };
        let mut count = 1;
        for event in events {
            order.apply(event);
            count += 1;
        }
        order.set_version(Version::initial().advance(count));
        Some(order)
    }
}

// Command methods (return events)
impl Order {
    /// Places a new order from a checkout draft.
    ///
    /// The caller has already reserved stock and allocated `order_number`.
    pub fn place(
        order_id: OrderId,
        draft: OrderDraft,
        order_number: OrderNumber,
    ) -> Result<(Order, OrderEvent), OrderError> {
        if draft.items.is_empty() {
            return Err(OrderError::EmptyCart);
        }
        if let Some(item) = draft.items.iter().find(|item| item.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                product_id: item.product_id,
            });
        }

        let subtotal = draft.checked_subtotal().ok_or(OrderError::AmountOverflow)?;
        let total_amount = subtotal
            .checked_add(draft.shipping_cost)
            .ok_or(OrderError::AmountOverflow)?;
        let data = OrderPlacedData {
            order_id,
            order_number,
            user_id: draft.user_id,
            items: draft.items,
            subtotal,
            shipping_cost: draft.shipping_cost,
            total_amount,
            courier_service: draft.courier_service,
            shipping_address: draft.shipping_address,
            notes: draft.notes,
            placed_at: draft.placed_at,
        };

        let mut order = Order::from_placed(data.clone());
        order.set_version(Version::first());
        Ok((order, OrderEvent::OrderPlaced(data)))
    }

    /// Moves the order to `to` along the transition table.
    ///
    /// `processing` on an order whose payment is still pending is recorded as
    /// a manual payment confirmation, and `cancelled` goes through [`cancel`].
    ///
    /// [`cancel`]: Order::cancel
    pub fn change_status(
        &self,
        to: OrderStatus,
        changed_by: &str,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if to == OrderStatus::Cancelled {
            return self.cancel("Cancelled by staff", changed_by);
        }

        if !self.status.can_transition_to(to) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to,
            });
        }

        if to == OrderStatus::Processing && self.payment_status == PaymentStatus::Pending {
            let raw = serde_json::json!({
                "source": "manual",
                "confirmed_by": changed_by,
            });
            return self.record_payment(PaymentStatus::Paid, Some(raw));
        }

        Ok(vec![OrderEvent::status_changed(self.status, to)])
    }

    /// Cancels the order on behalf of its owner or staff.
    ///
    /// Pending payment is marked failed and all reserved stock is restored.
    pub fn cancel(
        &self,
        reason: impl Into<String>,
        cancelled_by: &str,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.payment_status == PaymentStatus::Paid {
            return Err(OrderError::CannotCancelPaidOrder);
        }
        if !self.status.is_cancellable() {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: OrderStatus::Cancelled,
            });
        }

        let mut events = vec![OrderEvent::order_cancelled(
            self.status,
            reason,
            cancelled_by,
        )];
        if self.payment_status == PaymentStatus::Pending {
            events.push(OrderEvent::payment_status_changed(
                PaymentStatus::Pending,
                PaymentStatus::Failed,
                None,
            ));
        }
        if !self.stock_restored {
            events.push(OrderEvent::stock_restored(self.stock_lines()));
        }
        Ok(events)
    }

    /// Records a payment status and the gateway payload behind it.
    ///
    /// Payment becoming `paid` while the order is `pending` also moves the
    /// order to `processing`. This is the only path that does so.
    pub fn record_payment(
        &self,
        to: PaymentStatus,
        raw_response: Option<serde_json::Value>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.payment_status.can_transition_to(to) {
            return Err(OrderError::InvalidPaymentTransition {
                from: self.payment_status,
                to,
            });
        }

        let mut events = vec![OrderEvent::payment_status_changed(
            self.payment_status,
            to,
            raw_response,
        )];
        if to == PaymentStatus::Paid && self.status == OrderStatus::Pending {
            events.push(OrderEvent::status_changed(
                OrderStatus::Pending,
                OrderStatus::Processing,
            ));
        }
        Ok(events)
    }

    /// Applies a failed or expired payment reported by the gateway.
    ///
    /// This is a system path: it cancels the order and restores stock even
    /// where a user-initiated cancel would be refused. Repeating it emits
    /// nothing new.
    pub fn fail_payment(
        &self,
        raw_response: Option<serde_json::Value>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let mut events = Vec::new();

        match self.payment_status {
            PaymentStatus::Pending | PaymentStatus::Expired => {
                events.push(OrderEvent::payment_status_changed(
                    self.payment_status,
                    PaymentStatus::Failed,
                    raw_response,
                ));
            }
            PaymentStatus::Failed => {}
            PaymentStatus::Paid | PaymentStatus::Refunded => {
                return Err(OrderError::InvalidPaymentTransition {
                    from: self.payment_status,
                    to: PaymentStatus::Failed,
                });
            }
        }

        if self.status != OrderStatus::Cancelled {
            events.push(OrderEvent::order_cancelled(
                self.status,
                "Payment failed",
                SYSTEM_ACTOR,
            ));
        }
        if !self.stock_restored {
            events.push(OrderEvent::stock_restored(self.stock_lines()));
        }
        Ok(events)
    }

    /// Appends a tracking entry, advancing the order status where the entry
    /// implies it.
    pub fn update_tracking(&self, update: TrackingUpdate) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.can_update_tracking() {
            return Err(OrderError::TrackingNotAllowed {
                status: self.status,
                payment_status: self.payment_status,
            });
        }

        let now = Utc::now();
        let updated_by = update
            .updated_by
            .unwrap_or_else(|| SYSTEM_ACTOR.to_string());
        let mut events = Vec::new();

        if let Some(number) = update
            .tracking_number
            .filter(|_| self.tracking_number.is_none())
        {
            events.push(OrderEvent::tracking_updated(TrackingEntry {
                status: TrackingStatus::TrackingAssigned,
                timestamp: now,
                location: None,
                description: format!("Tracking number assigned: {number}"),
                updated_by: updated_by.clone(),
            }));
            events.push(OrderEvent::tracking_number_assigned(number));
        }

        let description = update
            .description
            .unwrap_or_else(|| update.status.default_description().to_string());
        let advance_to = match update.status {
            TrackingStatus::InTransit | TrackingStatus::Shipped => Some(OrderStatus::Shipped),
            TrackingStatus::Delivered => Some(OrderStatus::Delivered),
            _ => None,
        };

        events.push(OrderEvent::tracking_updated(TrackingEntry {
            status: update.status,
            timestamp: now,
            location: update.location,
            description,
            updated_by,
        }));

        let mut current = self.status;
        if let Some(target) = advance_to {
            if target == OrderStatus::Delivered && current == OrderStatus::Processing {
                events.push(OrderEvent::status_changed(current, OrderStatus::Shipped));
                current = OrderStatus::Shipped;
            }
            if current != target && current.can_transition_to(target) {
                events.push(OrderEvent::status_changed(current, target));
            }
        }

        Ok(events)
    }
}

// Apply event helpers
impl Order {
    fn from_placed(data: OrderPlacedData) -> Self {
        Self {
            id: data.order_id,
            version: Version::initial(),
            order_number: data.order_number,
            user_id: data.user_id,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            items: data.items,
            subtotal: data.subtotal,
            shipping_cost: data.shipping_cost,
            total_amount: data.total_amount,
            courier_service: data.courier_service,
            shipping_address: data.shipping_address,
            notes: data.notes,
            tracking_number: None,
            tracking_history: Vec::new(),
            payment_response: None,
            stock_restored: false,
            shipped_at: None,
            delivered_at: None,
            created_at: data.placed_at,
            updated_at: data.placed_at,
        }
    }

    fn enter_status(&mut self, status: OrderStatus, at: DateTime<Utc>) {
        self.status = status;
        match status {
            OrderStatus::Shipped => {
                self.shipped_at.get_or_insert(at);
            }
            OrderStatus::Delivered => {
                self.delivered_at.get_or_insert(at);
            }
            _ => {}
        }
    }

    fn apply_tracking_entry(&mut self, entry: TrackingEntry) {
        match entry.status {
            TrackingStatus::Shipped => {
                self.shipped_at.get_or_insert(entry.timestamp);
            }
            TrackingStatus::Delivered => {
                self.delivered_at.get_or_insert(entry.timestamp);
            }
            _ => {}
        }
        self.updated_at = entry.timestamp;
        self.tracking_history.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::DomainEvent;
    use chrono::NaiveDate;
    use common::ProductId;

    fn address() -> ShippingAddress {
        ShippingAddress {
            name: "Budi".to_string(),
            phone: "08123456789".to_string(),
            address: "Jl. Sudirman 1".to_string(),
            city: "Pekanbaru".to_string(),
            state: "Riau".to_string(),
            postal_code: "28111".to_string(),
        }
    }

    fn draft(items: Vec<OrderItem>) -> OrderDraft {
        OrderDraft {
            user_id: UserId::new(),
            items,
            shipping_cost: Money::from_major(15_000),
            courier_service: CourierService::Regular,
            shipping_address: address(),
            notes: None,
            placed_at: Utc::now(),
        }
    }

    fn number() -> OrderNumber {
        OrderNumber::new(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), 1)
    }

    fn place_order() -> Order {
        let item = OrderItem::new(
            ProductId::new(),
            "Shoes",
            "SHO-01",
            2,
            Money::from_major(50_000),
        );
        let (order, _) = Order::place(OrderId::new(), draft(vec![item]), number()).unwrap();
        order
    }

    fn execute(order: &mut Order, events: Vec<OrderEvent>) {
        let next = order.version().advance(events.len());
        order.apply_events(events);
        order.set_version(next);
    }

    fn paid_order() -> Order {
        let mut order = place_order();
        let events = order.record_payment(PaymentStatus::Paid, None).unwrap();
        execute(&mut order, events);
        order
    }

    #[test]
    fn test_place_computes_totals() {
        let order = place_order();
        assert_eq!(order.subtotal(), Money::from_major(100_000));
        assert_eq!(order.shipping_cost(), Money::from_major(15_000));
        assert_eq!(order.total_amount(), Money::from_major(115_000));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
        assert_eq!(order.version(), Version::first());
    }

    #[test]
    fn test_place_rejects_overflowing_amounts() {
        let item = OrderItem::new(
            ProductId::new(),
            "Gold Bar",
            "GLD-01",
            10,
            Money::from_cents(i64::MAX / 4),
        );
        let result = Order::place(OrderId::new(), draft(vec![item]), number());
        assert!(matches!(result, Err(OrderError::AmountOverflow)));
    }

    #[test]
    fn test_place_empty_cart_fails() {
        let result = Order::place(OrderId::new(), draft(vec![]), number());
        assert!(matches!(result, Err(OrderError::EmptyCart)));
    }

    #[test]
    fn test_payment_paid_advances_pending_to_processing() {
        let order = place_order();
        let events = order.record_payment(PaymentStatus::Paid, None).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), "PaymentStatusChanged");
        assert_eq!(events[1].event_type(), "StatusChanged");

        let order = paid_order();
        assert_eq!(order.status(), OrderStatus::Processing);
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
    }

    #[test]
    fn test_manual_processing_goes_through_payment_path() {
        let mut order = place_order();
        let events = order
            .change_status(OrderStatus::Processing, "admin")
            .unwrap();
        assert_eq!(events[0].event_type(), "PaymentStatusChanged");
        execute(&mut order, events);

        assert_eq!(order.status(), OrderStatus::Processing);
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
        assert_eq!(order.payment_response().unwrap()["source"], "manual");
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let order = place_order();
        let result = order.change_status(OrderStatus::Delivered, "admin");
        assert!(matches!(
            result,
            Err(OrderError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::Delivered,
            })
        ));
    }

    #[test]
    fn test_cancel_pending_restores_stock_and_fails_payment() {
        let mut order = place_order();
        let events = order.cancel("Changed my mind", "customer").unwrap();

        let restored: Vec<StockLine> = events
            .iter()
            .flat_map(|e| e.restored_lines().to_vec())
            .collect();
        assert_eq!(restored, order.stock_lines());

        execute(&mut order, events);
        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(order.payment_status(), PaymentStatus::Failed);
        assert!(order.stock_restored());
        assert_eq!(order.total_amount(), Money::from_major(115_000));
    }

    #[test]
    fn test_cancel_paid_order_fails() {
        let order = paid_order();
        assert!(matches!(
            order.cancel("Too late", "customer"),
            Err(OrderError::CannotCancelPaidOrder)
        ));
    }

    #[test]
    fn test_cancel_twice_fails() {
        let mut order = place_order();
        let events = order.cancel("First", "customer").unwrap();
        execute(&mut order, events);

        assert!(matches!(
            order.cancel("Again", "customer"),
            Err(OrderError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_fail_payment_cancels_and_restores_once() {
        let mut order = place_order();
        let events = order.fail_payment(None).unwrap();
        assert_eq!(events.len(), 3);
        execute(&mut order, events);

        assert_eq!(order.status(), OrderStatus::Cancelled);
        assert_eq!(order.payment_status(), PaymentStatus::Failed);

        let events = order.fail_payment(None).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_fail_payment_after_paid_is_rejected() {
        let order = paid_order();
        assert!(matches!(
            order.fail_payment(None),
            Err(OrderError::InvalidPaymentTransition { .. })
        ));
    }

    #[test]
    fn test_tracking_requires_paid_processing_or_shipped() {
        let order = place_order();
        let result = order.update_tracking(TrackingUpdate::new(TrackingStatus::Packed));
        assert!(matches!(result, Err(OrderError::TrackingNotAllowed { .. })));
    }

    #[test]
    fn test_tracking_assigns_number_once() {
        let mut order = paid_order();
        let events = order
            .update_tracking(TrackingUpdate::new(TrackingStatus::Packed).with_tracking_number("JNE-1"))
            .unwrap();
        execute(&mut order, events);

        assert_eq!(order.tracking_number(), Some("JNE-1"));
        assert_eq!(order.tracking_history().len(), 2);
        assert_eq!(
            order.tracking_history()[0].status,
            TrackingStatus::TrackingAssigned
        );

        let events = order
            .update_tracking(
                TrackingUpdate::new(TrackingStatus::Packed).with_tracking_number("JNE-2"),
            )
            .unwrap();
        execute(&mut order, events);
        assert_eq!(order.tracking_number(), Some("JNE-1"));
        assert_eq!(order.tracking_history().len(), 3);
    }

    #[test]
    fn test_tracking_entry_defaults() {
        let mut order = paid_order();
        let events = order
            .update_tracking(TrackingUpdate::new(TrackingStatus::Packed))
            .unwrap();
        execute(&mut order, events);

        let entry = order.latest_tracking().unwrap();
        assert_eq!(entry.description, "Order has been packed");
        assert_eq!(entry.updated_by, SYSTEM_ACTOR);
        assert_eq!(entry.location, None);
    }

    #[test]
    fn test_in_transit_ships_and_delivered_completes() {
        let mut order = paid_order();
        let events = order
            .update_tracking(TrackingUpdate::new(TrackingStatus::InTransit).at("Pekanbaru Hub"))
            .unwrap();
        execute(&mut order, events);
        assert_eq!(order.status(), OrderStatus::Shipped);
        let shipped_at = order.shipped_at();
        assert!(shipped_at.is_some());

        let events = order
            .update_tracking(TrackingUpdate::new(TrackingStatus::Shipped))
            .unwrap();
        execute(&mut order, events);
        assert_eq!(order.shipped_at(), shipped_at);

        let events = order
            .update_tracking(TrackingUpdate::new(TrackingStatus::Delivered))
            .unwrap();
        execute(&mut order, events);
        assert_eq!(order.status(), OrderStatus::Delivered);
        assert!(order.delivered_at().is_some());
        assert_eq!(order.tracking_progress(), 100);

        assert!(matches!(
            order.update_tracking(TrackingUpdate::new(TrackingStatus::Delivered)),
            Err(OrderError::TrackingNotAllowed { .. })
        ));
    }

    #[test]
    fn test_delivered_from_processing_passes_through_shipped() {
        let order = paid_order();
        let events = order
            .update_tracking(TrackingUpdate::new(TrackingStatus::Delivered))
            .unwrap();
        let transitions: Vec<(OrderStatus, OrderStatus)> = events
            .iter()
            .filter_map(|e| match e {
                OrderEvent::StatusChanged(data) => Some((data.from, data.to)),
                _ => None,
            })
            .collect();
        assert_eq!(
            transitions,
            vec![
                (OrderStatus::Processing, OrderStatus::Shipped),
                (OrderStatus::Shipped, OrderStatus::Delivered),
            ]
        );
    }

    #[test]
    fn test_tracking_progress_is_monotonic() {
        let mut order = place_order();
        let mut last = order.tracking_progress();
        assert_eq!(last, 10);

        let events = order.record_payment(PaymentStatus::Paid, None).unwrap();
        execute(&mut order, events);
        assert!(order.tracking_progress() >= last);
        last = order.tracking_progress();

        for status in [
            TrackingStatus::Processing,
            TrackingStatus::Packed,
            TrackingStatus::InTransit,
            TrackingStatus::Shipped,
            TrackingStatus::OutForDelivery,
            TrackingStatus::Delivered,
        ] {
            let events = order.update_tracking(TrackingUpdate::new(status)).unwrap();
            execute(&mut order, events);
            let progress = order.tracking_progress();
            assert!(progress >= last, "{progress} < {last}");
            last = progress;
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn test_unknown_tracking_status_falls_back_to_order_status() {
        let mut order = paid_order();
        let events = order
            .update_tracking(TrackingUpdate::new("held_at_warehouse"))
            .unwrap();
        execute(&mut order, events);
        assert_eq!(order.tracking_progress(), 25);
    }

    #[test]
    fn test_replay_matches_live_state() {
        let item = OrderItem::new(
            ProductId::new(),
            "Bag",
            "BAG-01",
            1,
            Money::from_major(80_000),
        );
        let (mut order, placed) = Order::place(OrderId::new(), draft(vec![item]), number()).unwrap();
        let mut log = vec![placed];

        let events = order.record_payment(PaymentStatus::Paid, None).unwrap();
        log.extend(events.clone());
        execute(&mut order, events);

        let events = order
            .update_tracking(TrackingUpdate::new(TrackingStatus::Shipped).with_tracking_number("SC-9"))
            .unwrap();
        log.extend(events.clone());
        execute(&mut order, events);

        let replayed = Order::replay(log).unwrap();
        assert_eq!(replayed, order);
    }

    #[test]
    fn test_replay_requires_placement_first() {
        let events = vec![OrderEvent::status_changed(
            OrderStatus::Pending,
            OrderStatus::Processing,
        )];
        assert!(Order::replay(events).is_none());
    }
}
