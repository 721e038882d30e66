//! Shipment tracking statuses and history entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::OrderStatus;

/// Status reported by a tracking update.
///
/// Courier integrations may report statuses outside the known set; those are
/// kept verbatim as [`TrackingStatus::Other`] and have no progress value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TrackingStatus {
    Pending,
    Processing,
    Packed,
    InTransit,
    Shipped,
    OutForDelivery,
    Delivered,
    /// Recorded when a tracking number is first attached to the order.
    TrackingAssigned,
    Other(String),
}

impl TrackingStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TrackingStatus::Pending => "pending",
            TrackingStatus::Processing => "processing",
            TrackingStatus::Packed => "packed",
            TrackingStatus::InTransit => "in_transit",
            TrackingStatus::Shipped => "shipped",
            TrackingStatus::OutForDelivery => "out_for_delivery",
            TrackingStatus::Delivered => "delivered",
            TrackingStatus::TrackingAssigned => "tracking_assigned",
            TrackingStatus::Other(status) => status,
        }
    }

    /// Delivery progress percentage, or `None` for statuses without a step.
    pub fn progress(&self) -> Option<u8> {
        match self {
            TrackingStatus::Pending => Some(10),
            TrackingStatus::Processing => Some(25),
            TrackingStatus::Packed => Some(40),
            TrackingStatus::InTransit => Some(60),
            TrackingStatus::Shipped => Some(75),
            TrackingStatus::OutForDelivery => Some(90),
            TrackingStatus::Delivered => Some(100),
            TrackingStatus::TrackingAssigned | TrackingStatus::Other(_) => None,
        }
    }

    pub fn default_description(&self) -> &'static str {
        match self {
            TrackingStatus::Pending => "Order received and awaiting payment",
            TrackingStatus::Processing => "Order is being prepared",
            TrackingStatus::Packed => "Order has been packed",
            TrackingStatus::InTransit => "Package is on its way",
            TrackingStatus::Shipped => "Package has been handed to the courier",
            TrackingStatus::OutForDelivery => "Package is out for delivery",
            TrackingStatus::Delivered => "Package has been delivered",
            TrackingStatus::TrackingAssigned => "Tracking number assigned",
            TrackingStatus::Other(_) => "Shipment status updated",
        }
    }
}

impl From<String> for TrackingStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => TrackingStatus::Pending,
            "processing" => TrackingStatus::Processing,
            "packed" => TrackingStatus::Packed,
            "in_transit" => TrackingStatus::InTransit,
            "shipped" => TrackingStatus::Shipped,
            "out_for_delivery" => TrackingStatus::OutForDelivery,
            "delivered" => TrackingStatus::Delivered,
            "tracking_assigned" => TrackingStatus::TrackingAssigned,
            _ => TrackingStatus::Other(value),
        }
    }
}

impl From<&str> for TrackingStatus {
    fn from(value: &str) -> Self {
        TrackingStatus::from(value.to_string())
    }
}

impl From<TrackingStatus> for String {
    fn from(status: TrackingStatus) -> Self {
        match status {
            TrackingStatus::Other(status) => status,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress percentage implied by the order status alone.
pub(crate) fn status_progress(status: OrderStatus) -> u8 {
    match status {
        OrderStatus::Pending => 10,
        OrderStatus::Processing => 25,
        OrderStatus::Shipped => 75,
        OrderStatus::Delivered => 100,
        OrderStatus::Cancelled => 0,
    }
}

/// One entry of an order's append-only tracking history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEntry {
    pub status: TrackingStatus,
    pub timestamp: DateTime<Utc>,
    pub location: Option<String>,
    pub description: String,
    pub updated_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_statuses_parse() {
        assert_eq!(TrackingStatus::from("in_transit"), TrackingStatus::InTransit);
        assert_eq!(
            TrackingStatus::from("out_for_delivery"),
            TrackingStatus::OutForDelivery
        );
        assert_eq!(
            TrackingStatus::from("held_at_customs"),
            TrackingStatus::Other("held_at_customs".to_string())
        );
    }

    #[test]
    fn test_progress_table() {
        let steps = [
            TrackingStatus::Pending,
            TrackingStatus::Processing,
            TrackingStatus::Packed,
            TrackingStatus::InTransit,
            TrackingStatus::Shipped,
            TrackingStatus::OutForDelivery,
            TrackingStatus::Delivered,
        ];
        let values: Vec<u8> = steps.iter().filter_map(TrackingStatus::progress).collect();
        assert_eq!(values, vec![10, 25, 40, 60, 75, 90, 100]);
        assert_eq!(TrackingStatus::from("lost").progress(), None);
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let json = serde_json::to_string(&TrackingStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"out_for_delivery\"");

        let other: TrackingStatus = serde_json::from_str("\"returned\"").unwrap();
        assert_eq!(other.as_str(), "returned");
    }
}
