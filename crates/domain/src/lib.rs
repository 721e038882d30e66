//! Domain model for the storefront order core.
//!
//! Everything here is pure: aggregates validate commands against their state
//! and return events, without touching storage or the network.

pub mod aggregate;
pub mod cart;
pub mod money;
pub mod order;
pub mod policy;
pub mod product;

pub use aggregate::{Aggregate, DomainEvent, Version};
pub use cart::{Cart, CartError, CartItem, MAX_LINE_QUANTITY};
pub use money::{Money, ParseMoneyError};
pub use order::{
    CourierService, Order, OrderDraft, OrderError, OrderEvent, OrderItem, OrderNumber,
    OrderStatus, PaymentStatus, SYSTEM_ACTOR, ShippingAddress, StockLine, TrackingEntry,
    TrackingStatus, TrackingUpdate,
};
pub use policy::{Action, Decision, DenyReason, Target, authorize};
pub use product::Product;
