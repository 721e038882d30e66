use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{DomainEvent, OrderEvent, Version};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a stored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A recorded order event along with its position in the order's log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,

    /// The type of the event (e.g., "OrderPlaced", "StatusChanged").
    pub event_type: String,

    pub order_id: OrderId,

    /// The order version after this event.
    pub version: Version,

    pub timestamp: DateTime<Utc>,

    /// The event as tagged JSON.
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Wraps an order event for storage.
    pub fn new(
        order_id: OrderId,
        version: Version,
        event: &OrderEvent,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_id: EventId::new(),
            event_type: event.event_type().to_string(),
            order_id,
            version,
            timestamp: Utc::now(),
            payload: serde_json::to_value(event)?,
        })
    }

    /// Wraps a batch of events that follow `expected`, numbering them in order.
    pub fn sequence(
        order_id: OrderId,
        expected: Version,
        events: &[OrderEvent],
    ) -> Result<Vec<Self>, serde_json::Error> {
        let mut version = expected;
        events
            .iter()
            .map(|event| {
                version = version.next();
                Self::new(order_id, version, event)
            })
            .collect()
    }

    /// Deserializes the payload back into an order event.
    pub fn decode(&self) -> Result<OrderEvent, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}
