//! Order lifecycle coordination for the storefront.
//!
//! This crate sits between the HTTP surface and the store. It provides:
//!
//! - [`CartService`] for the acting user's cart
//! - [`OrderCoordinator`] for checkout, status changes, cancellation,
//!   tracking and payment sessions
//! - [`ReconciliationHandler`] for gateway payment notifications
//! - [`ShippingEstimator`] for parcel pricing with a local fallback
//!
//! Every operation takes the acting [`common::Actor`] and checks it against
//! [`domain::authorize`] before touching state.

pub mod cart;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod estimator;
pub mod notification;
pub mod payments;
pub mod reconciliation;
pub mod services;

pub use cart::{CartLineView, CartService, CartView};
pub use config::{EstimatorConfig, GatewayConfig};
pub use coordinator::{
    CartShippingEstimate, CheckoutRequest, OrderCoordinator, PaymentStatusView, TrackingView,
};
pub use error::{FulfillmentError, Result};
pub use estimator::{
    DeclaredWeightFirst, KeywordWeightTable, ShippingEstimate, ShippingEstimator, WeightStrategy,
};
pub use notification::{CanonicalStatus, PaymentNotification, SignatureVerifier};
pub use payments::{CustomerContact, PaymentTokenResult, fractional_amount, session_request};
pub use reconciliation::{NotificationOutcome, NotificationReceipt, ReconciliationHandler};
