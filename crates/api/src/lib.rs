//! HTTP API server for the storefront order core.
//!
//! Exposes cart, checkout, order lifecycle, payment and shipping endpoints
//! over [`fulfillment`], with structured logging (tracing) and Prometheus
//! metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post, put};
use fulfillment::services::{PaymentGateway, RateSource};
use fulfillment::{CartService, OrderCoordinator, ShippingEstimator};
use metrics_exporter_prometheus::PrometheusHandle;
use store::CommerceStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Payment gateway chosen at startup.
pub type SharedGateway = Arc<dyn PaymentGateway>;

/// Shipping rate source chosen at startup.
pub type SharedRates = Arc<dyn RateSource>;

/// Shared application state accessible from all handlers.
pub struct AppState<S: CommerceStore> {
    pub coordinator: OrderCoordinator<S, SharedGateway, SharedRates>,
    pub carts: CartService<S>,
}

impl<S: CommerceStore + Clone + 'static> AppState<S> {
    /// Wires the services over `store` and the chosen collaborators.
    pub fn new(store: S, gateway: SharedGateway, rates: SharedRates, config: &Config) -> Self {
        let estimator = ShippingEstimator::new(rates, config.estimator.clone());
        Self {
            carts: CartService::new(store.clone()),
            coordinator: OrderCoordinator::new(store, gateway, estimator, config.gateway.clone()),
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: CommerceStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        // Cart
        .route(
            "/cart",
            get(routes::cart::view::<S>).delete(routes::cart::clear::<S>),
        )
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{product_id}",
            put(routes::cart::update_item::<S>).delete(routes::cart::remove_item::<S>),
        )
        // Orders
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/orders/{id}/status",
            get(routes::orders::payment_status::<S>).patch(routes::orders::update_status::<S>),
        )
        .route(
            "/orders/{id}/payment-status",
            patch(routes::orders::update_payment_status::<S>),
        )
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route(
            "/orders/{id}/payment",
            post(routes::orders::create_payment::<S>),
        )
        .route(
            "/orders/{id}/tracking",
            get(routes::orders::tracking::<S>).put(routes::orders::update_tracking::<S>),
        )
        .route("/orders/{id}/events", get(routes::orders::events::<S>))
        // Payment gateway callbacks
        .route(
            "/payment/notification",
            post(routes::payment::notification::<S>),
        )
        // Shipping
        .route("/shipping/estimate", post(routes::shipping::estimate::<S>))
        .route(
            "/shipping/estimate-cart",
            post(routes::shipping::estimate_cart::<S>),
        )
        .route("/shipping/cities", get(routes::shipping::cities))
        .route("/shipping/origin", get(routes::shipping::origin))
        .route(
            "/shipping/courier-services",
            get(routes::shipping::courier_services),
        )
        // Back office
        .route(
            "/admin/products/{id}",
            put(routes::admin::upsert_product::<S>),
        )
        .route(
            "/admin/products/{id}/stock",
            post(routes::admin::adjust_stock::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
