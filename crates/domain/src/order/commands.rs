//! Inputs to order commands.

use chrono::{DateTime, Utc};
use common::UserId;
use serde::{Deserialize, Serialize};

use super::{CourierService, OrderItem, ShippingAddress, TrackingStatus};
use crate::money::Money;

/// Everything needed to place an order except its number.
///
/// Built from a cart outside the storage transaction; the store reserves
/// stock, assigns the daily order number and persists the result atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_cost: Money,
    pub courier_service: CourierService,
    pub shipping_address: ShippingAddress,
    pub notes: Option<String>,
    pub placed_at: DateTime<Utc>,
}

impl OrderDraft {
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(OrderItem::line_total).sum()
    }

    /// Subtotal, or `None` if a line total or the sum overflows.
    pub fn checked_subtotal(&self) -> Option<Money> {
        self.items.iter().try_fold(Money::zero(), |acc, item| {
            acc.checked_add(item.unit_price.checked_multiply(item.quantity)?)
        })
    }
}

/// A shipment tracking update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingUpdate {
    pub status: TrackingStatus,
    #[serde(default)]
    pub location: Option<String>,
    /// Falls back to the status's default description.
    #[serde(default)]
    pub description: Option<String>,
    /// Falls back to `system`.
    #[serde(default)]
    pub updated_by: Option<String>,
    /// Stored only if the order has no tracking number yet.
    #[serde(default)]
    pub tracking_number: Option<String>,
}

impl TrackingUpdate {
    pub fn new(status: impl Into<TrackingStatus>) -> Self {
        Self {
            status: status.into(),
            location: None,
            description: None,
            updated_by: None,
            tracking_number: None,
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn by(mut self, updated_by: impl Into<String>) -> Self {
        self.updated_by = Some(updated_by.into());
        self
    }

    pub fn with_tracking_number(mut self, tracking_number: impl Into<String>) -> Self {
        self.tracking_number = Some(tracking_number.into());
        self
    }
}
