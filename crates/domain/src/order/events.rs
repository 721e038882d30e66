//! Order domain events.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::{aggregate::DomainEvent, money::Money};

use super::{
    CourierService, OrderItem, OrderNumber, OrderStatus, PaymentStatus, ShippingAddress,
    StockLine, TrackingEntry,
};

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was placed from a cart.
    OrderPlaced(OrderPlacedData),

    /// Fulfilment status moved along the transition table.
    StatusChanged(StatusChangedData),

    /// Payment status changed, or a gateway payload was recorded.
    PaymentStatusChanged(PaymentStatusChangedData),

    /// A courier tracking number was attached.
    TrackingNumberAssigned(TrackingNumberAssignedData),

    /// A tracking history entry was appended.
    TrackingUpdated(TrackingUpdatedData),

    /// Order was cancelled.
    OrderCancelled(OrderCancelledData),

    /// Reserved stock was returned to inventory.
    StockRestored(StockRestoredData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::StatusChanged(_) => "StatusChanged",
            OrderEvent::PaymentStatusChanged(_) => "PaymentStatusChanged",
            OrderEvent::TrackingNumberAssigned(_) => "TrackingNumberAssigned",
            OrderEvent::TrackingUpdated(_) => "TrackingUpdated",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
            OrderEvent::StockRestored(_) => "StockRestored",
        }
    }
}

/// Data for OrderPlaced event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: OrderId,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub total_amount: Money,
    pub courier_service: CourierService,
    pub shipping_address: ShippingAddress,
    pub notes: Option<String>,
    pub placed_at: DateTime<Utc>,
}

/// Data for StatusChanged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangedData {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub changed_at: DateTime<Utc>,
}

/// Data for PaymentStatusChanged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentStatusChangedData {
    pub from: PaymentStatus,
    pub to: PaymentStatus,

    /// Raw gateway payload, kept opaque.
    pub raw_response: Option<serde_json::Value>,

    pub changed_at: DateTime<Utc>,
}

/// Data for TrackingNumberAssigned event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingNumberAssignedData {
    pub tracking_number: String,
    pub assigned_at: DateTime<Utc>,
}

/// Data for TrackingUpdated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingUpdatedData {
    pub entry: TrackingEntry,
}

/// Data for OrderCancelled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelledData {
    /// Status the order was in when cancelled.
    pub from: OrderStatus,

    pub reason: String,

    /// Who cancelled the order.
    pub cancelled_by: String,

    pub cancelled_at: DateTime<Utc>,
}

/// Data for StockRestored event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRestoredData {
    pub lines: Vec<StockLine>,
    pub restored_at: DateTime<Utc>,
}

// Convenience constructors for events
impl OrderEvent {
    /// Creates a StatusChanged event.
    pub fn status_changed(from: OrderStatus, to: OrderStatus) -> Self {
        OrderEvent::StatusChanged(StatusChangedData {
            from,
            to,
            changed_at: Utc::now(),
        })
    }

    /// Creates a PaymentStatusChanged event.
    pub fn payment_status_changed(
        from: PaymentStatus,
        to: PaymentStatus,
        raw_response: Option<serde_json::Value>,
    ) -> Self {
        OrderEvent::PaymentStatusChanged(PaymentStatusChangedData {
            from,
            to,
            raw_response,
            changed_at: Utc::now(),
        })
    }

    /// Creates a TrackingNumberAssigned event.
    pub fn tracking_number_assigned(tracking_number: impl Into<String>) -> Self {
        OrderEvent::TrackingNumberAssigned(TrackingNumberAssignedData {
            tracking_number: tracking_number.into(),
            assigned_at: Utc::now(),
        })
    }

    /// Creates a TrackingUpdated event.
    pub fn tracking_updated(entry: TrackingEntry) -> Self {
        OrderEvent::TrackingUpdated(TrackingUpdatedData { entry })
    }

    /// Creates an OrderCancelled event.
    pub fn order_cancelled(
        from: OrderStatus,
        reason: impl Into<String>,
        cancelled_by: impl Into<String>,
    ) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            from,
            reason: reason.into(),
            cancelled_by: cancelled_by.into(),
            cancelled_at: Utc::now(),
        })
    }

    /// Creates a StockRestored event.
    pub fn stock_restored(lines: Vec<StockLine>) -> Self {
        OrderEvent::StockRestored(StockRestoredData {
            lines,
            restored_at: Utc::now(),
        })
    }

    /// Returns the stock lines this event gives back to inventory, if any.
    pub fn restored_lines(&self) -> &[StockLine] {
        match self {
            OrderEvent::StockRestored(data) => &data.lines,
            _ => &[],
        }
    }
}
