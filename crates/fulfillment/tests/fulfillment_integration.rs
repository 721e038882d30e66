//! End-to-end order lifecycle tests against the in-memory store.

use std::sync::Arc;

use chrono::Utc;
use common::{Actor, Role, UserId};
use domain::{
    Aggregate, CourierService, Money, OrderStatus, PaymentStatus, Product, ShippingAddress,
    TrackingStatus, TrackingUpdate,
};
use fulfillment::services::{InMemoryPaymentGateway, InMemoryRateSource};
use fulfillment::{
    CartService, CheckoutRequest, CustomerContact, EstimatorConfig, FulfillmentError,
    GatewayConfig, NotificationOutcome, OrderCoordinator, ShippingEstimator, SignatureVerifier,
};
use serde_json::json;
use store::{CommerceStore, CommerceStoreExt, InMemoryStore};

const SERVER_KEY: &str = "SB-Mid-server-test";

type Coordinator = OrderCoordinator<InMemoryStore, InMemoryPaymentGateway, InMemoryRateSource>;

struct Harness {
    store: InMemoryStore,
    gateway: InMemoryPaymentGateway,
    rates: InMemoryRateSource,
    coordinator: Coordinator,
    carts: CartService<InMemoryStore>,
    customer: Actor,
    admin: Actor,
}

fn harness() -> Harness {
    let store = InMemoryStore::new();
    let gateway = InMemoryPaymentGateway::new();
    let rates = InMemoryRateSource::new();
    let config = GatewayConfig {
        server_key: SERVER_KEY.to_string(),
        ..GatewayConfig::default()
    };
    let coordinator = OrderCoordinator::new(
        store.clone(),
        gateway.clone(),
        ShippingEstimator::new(rates.clone(), EstimatorConfig::default()),
        config,
    );
    Harness {
        carts: CartService::new(store.clone()),
        store,
        gateway,
        rates,
        coordinator,
        customer: Actor::customer(UserId::new()),
        admin: Actor::new(UserId::new(), Role::Admin),
    }
}

fn checkout() -> CheckoutRequest {
    CheckoutRequest {
        shipping_address: ShippingAddress {
            name: "Budi Santoso".to_string(),
            phone: "081234567890".to_string(),
            address: "Jl. Gatot Subroto 5".to_string(),
            city: "Bandung".to_string(),
            state: "Jawa Barat".to_string(),
            postal_code: "40115".to_string(),
        },
        courier_service: CourierService::Regular,
        notes: Some("Leave at the gate".to_string()),
    }
}

async fn product(h: &Harness, name: &str, price: i64, stock: u32) -> Product {
    let product = Product::new(name, format!("SKU-{name}"), Money::from_major(price), stock);
    h.store.upsert_product(product.clone()).await.unwrap();
    product
}

async fn stock_of(h: &Harness, product: &Product) -> u32 {
    h.store.load_product(product.id).await.unwrap().stock
}

fn signed_notification(
    order_number: &str,
    total: Money,
    transaction_status: &str,
) -> serde_json::Value {
    let signer = SignatureVerifier::new(SERVER_KEY);
    json!({
        "order_id": order_number,
        "status_code": "200",
        "gross_amount": total.to_string(),
        "signature_key": signer.sign(order_number, "200", total),
        "transaction_status": transaction_status,
        "fraud_status": "accept",
        "payment_type": "bank_transfer",
    })
}

#[tokio::test]
async fn checkout_with_fallback_shipping() {
    let h = harness();
    h.rates.set_fail_on_quote(true);
    let a = product(&h, "Product A", 50_000, 10).await;
    h.carts.add_item(&h.customer, a.id, 2).await.unwrap();

    let order = h
        .coordinator
        .create_order_from_cart(&h.customer, checkout())
        .await
        .unwrap();

    assert_eq!(order.subtotal(), Money::from_major(100_000));
    assert_eq!(order.shipping_cost(), Money::from_major(15_000));
    assert_eq!(order.total_amount(), Money::from_major(115_000));
    assert_eq!(order.status(), OrderStatus::Pending);
    assert_eq!(order.payment_status(), PaymentStatus::Pending);
    assert_eq!(order.notes(), Some("Leave at the gate"));
    assert_eq!(stock_of(&h, &a).await, 8);
    assert!(h.store.get_cart(h.customer.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn checkout_snapshots_survive_product_edits() {
    let h = harness();
    let a = product(&h, "Sepatu Futsal", 300_000, 3).await;
    h.carts.add_item(&h.customer, a.id, 1).await.unwrap();
    let order = h
        .coordinator
        .create_order_from_cart(&h.customer, checkout())
        .await
        .unwrap();

    let mut edited = h.store.load_product(a.id).await.unwrap();
    edited.name = "Sepatu Futsal v2".to_string();
    edited.price = Money::from_major(350_000);
    h.store.upsert_product(edited).await.unwrap();

    let reloaded = h.coordinator.get_order(&h.customer, order.id()).await.unwrap();
    assert_eq!(reloaded.items()[0].product_name, "Sepatu Futsal");
    assert_eq!(reloaded.items()[0].unit_price, Money::from_major(300_000));
}

#[tokio::test]
async fn checkout_is_atomic_when_stock_runs_out() {
    let h = harness();
    let a = product(&h, "Bola Voli", 80_000, 3).await;
    let b = product(&h, "Kaos Kaki", 20_000, 10).await;
    h.carts.add_item(&h.customer, b.id, 2).await.unwrap();
    h.carts.add_item(&h.customer, a.id, 3).await.unwrap();

    let mut drained = h.store.load_product(a.id).await.unwrap();
    drained.stock = 1;
    h.store.upsert_product(drained).await.unwrap();

    let result = h
        .coordinator
        .create_order_from_cart(&h.customer, checkout())
        .await;

    assert!(matches!(
        result,
        Err(FulfillmentError::InsufficientStock { available: 1, .. })
    ));
    assert_eq!(stock_of(&h, &a).await, 1);
    assert_eq!(stock_of(&h, &b).await, 10);
    assert_eq!(
        h.store.get_cart(h.customer.user_id).await.unwrap().total_quantity(),
        5
    );
    assert!(
        h.coordinator
            .list_orders(&h.customer)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn orders_are_numbered_per_day() {
    let h = harness();
    let a = product(&h, "Tas", 100_000, 10).await;
    let today = Utc::now().format("%Y%m%d").to_string();

    for expected in 1..=3 {
        h.carts.add_item(&h.customer, a.id, 1).await.unwrap();
        let order = h
            .coordinator
            .create_order_from_cart(&h.customer, checkout())
            .await
            .unwrap();
        assert_eq!(
            order.order_number().as_str(),
            format!("ORD-{today}-{expected:04}")
        );
    }
}

#[tokio::test]
async fn cancel_pending_restores_exact_quantities() {
    let h = harness();
    let a = product(&h, "Raket", 250_000, 6).await;
    let b = product(&h, "Helm", 400_000, 4).await;
    h.carts.add_item(&h.customer, a.id, 2).await.unwrap();
    h.carts.add_item(&h.customer, b.id, 3).await.unwrap();
    let order = h
        .coordinator
        .create_order_from_cart(&h.customer, checkout())
        .await
        .unwrap();
    assert_eq!(stock_of(&h, &a).await, 4);
    assert_eq!(stock_of(&h, &b).await, 1);

    let cancelled = h
        .coordinator
        .cancel_order(&h.customer, order.id(), Some("Changed my mind".to_string()))
        .await
        .unwrap();

    assert_eq!(cancelled.status(), OrderStatus::Cancelled);
    assert_eq!(stock_of(&h, &a).await, 6);
    assert_eq!(stock_of(&h, &b).await, 4);

    let again = h.coordinator.cancel_order(&h.customer, order.id(), None).await;
    assert!(again.is_err());
    assert_eq!(stock_of(&h, &a).await, 6);
}

#[tokio::test]
async fn paid_orders_cannot_be_cancelled() {
    let h = harness();
    let a = product(&h, "Jersey", 150_000, 5).await;
    h.carts.add_item(&h.customer, a.id, 1).await.unwrap();
    let order = h
        .coordinator
        .create_order_from_cart(&h.customer, checkout())
        .await
        .unwrap();

    let paid = h
        .coordinator
        .update_payment_status(&h.admin, order.id(), PaymentStatus::Paid, None)
        .await
        .unwrap();
    assert_eq!(paid.status(), OrderStatus::Processing);

    let by_customer = h.coordinator.cancel_order(&h.customer, order.id(), None).await;
    assert!(matches!(
        by_customer,
        Err(FulfillmentError::CannotCancelPaidOrder)
    ));
    let by_admin = h
        .coordinator
        .update_order_status(&h.admin, order.id(), OrderStatus::Cancelled)
        .await;
    assert!(matches!(by_admin, Err(FulfillmentError::CannotCancelPaidOrder)));
    assert_eq!(stock_of(&h, &a).await, 4);
}

#[tokio::test]
async fn duplicate_settlement_is_a_no_op() {
    let h = harness();
    let a = product(&h, "Bola", 90_000, 5).await;
    h.carts.add_item(&h.customer, a.id, 2).await.unwrap();
    let order = h
        .coordinator
        .create_order_from_cart(&h.customer, checkout())
        .await
        .unwrap();
    let raw = signed_notification(
        order.order_number().as_str(),
        order.total_amount(),
        "settlement",
    );

    let first = h.coordinator.handle_payment_notification(&raw).await.unwrap();
    assert_eq!(first.outcome, NotificationOutcome::Applied);
    let after_first = h.store.load_order(order.id()).await.unwrap();

    let second = h.coordinator.handle_payment_notification(&raw).await.unwrap();
    assert_eq!(second.outcome, NotificationOutcome::AlreadyPaid);

    let after_second = h.store.load_order(order.id()).await.unwrap();
    assert_eq!(after_second.version(), after_first.version());
    assert_eq!(after_second.status(), OrderStatus::Processing);
    assert_eq!(stock_of(&h, &a).await, 3);
    assert_eq!(
        h.store.get_order_events(order.id()).await.unwrap().len(),
        3
    );
}

#[tokio::test]
async fn tampered_notifications_never_change_payment() {
    let h = harness();
    let a = product(&h, "Shoes", 50_000, 5).await;
    h.carts.add_item(&h.customer, a.id, 1).await.unwrap();
    let order = h
        .coordinator
        .create_order_from_cart(&h.customer, checkout())
        .await
        .unwrap();

    let underpaid = Money::from_major(1_000);
    let mut forged = signed_notification(order.order_number().as_str(), underpaid, "settlement");
    forged["gross_amount"] = json!(underpaid.to_string());
    let mut bad_key = signed_notification(
        order.order_number().as_str(),
        order.total_amount(),
        "settlement",
    );
    bad_key["signature_key"] = json!(SignatureVerifier::new("guess").sign(
        order.order_number().as_str(),
        "200",
        order.total_amount()
    ));
    let mut flipped = signed_notification(
        order.order_number().as_str(),
        order.total_amount(),
        "settlement",
    );
    flipped["status_code"] = json!("201");

    for raw in [forged, bad_key, flipped] {
        let result = h.coordinator.handle_payment_notification(&raw).await;
        assert!(matches!(result, Err(FulfillmentError::InvalidSignature)));
    }

    let stored = h.store.load_order(order.id()).await.unwrap();
    assert_eq!(stored.payment_status(), PaymentStatus::Pending);
    assert_eq!(stored.version(), order.version());
}

#[tokio::test]
async fn failed_payment_cancels_and_restocks_once() {
    let h = harness();
    let a = product(&h, "Kaos", 75_000, 5).await;
    h.carts.add_item(&h.customer, a.id, 4).await.unwrap();
    let order = h
        .coordinator
        .create_order_from_cart(&h.customer, checkout())
        .await
        .unwrap();
    assert_eq!(stock_of(&h, &a).await, 1);

    let raw = signed_notification(order.order_number().as_str(), order.total_amount(), "deny");
    let receipt = h.coordinator.handle_payment_notification(&raw).await.unwrap();
    assert_eq!(receipt.status, OrderStatus::Cancelled);
    assert_eq!(receipt.payment_status, PaymentStatus::Failed);
    assert_eq!(stock_of(&h, &a).await, 5);

    let expire = signed_notification(order.order_number().as_str(), order.total_amount(), "expire");
    let receipt = h.coordinator.handle_payment_notification(&expire).await.unwrap();
    assert_eq!(receipt.outcome, NotificationOutcome::Ignored);
    assert_eq!(stock_of(&h, &a).await, 5);

    let settle =
        signed_notification(order.order_number().as_str(), order.total_amount(), "settlement");
    assert!(h.coordinator.handle_payment_notification(&settle).await.is_err());
}

#[tokio::test]
async fn tracking_progress_is_monotonic() {
    let h = harness();
    let a = product(&h, "Helmet", 500_000, 2).await;
    h.carts.add_item(&h.customer, a.id, 1).await.unwrap();
    let order = h
        .coordinator
        .create_order_from_cart(&h.customer, checkout())
        .await
        .unwrap();

    let early = h
        .coordinator
        .update_tracking(&h.admin, order.id(), TrackingUpdate::new(TrackingStatus::Packed))
        .await;
    assert!(matches!(
        early,
        Err(FulfillmentError::TrackingNotAllowed { .. })
    ));

    h.coordinator
        .update_payment_status(&h.admin, order.id(), PaymentStatus::Paid, None)
        .await
        .unwrap();

    let mut last = h
        .coordinator
        .tracking(&h.customer, order.id())
        .await
        .unwrap()
        .progress;
    let steps = [
        TrackingUpdate::new(TrackingStatus::Packed),
        TrackingUpdate::new(TrackingStatus::InTransit)
            .at("Jakarta Hub")
            .with_tracking_number("JNE123456"),
        TrackingUpdate::new(TrackingStatus::OutForDelivery).at("Bandung"),
        TrackingUpdate::new(TrackingStatus::Delivered),
    ];
    for step in steps {
        h.coordinator
            .update_tracking(&h.admin, order.id(), step)
            .await
            .unwrap();
        let view = h.coordinator.tracking(&h.customer, order.id()).await.unwrap();
        assert!(view.progress >= last, "{} < {last}", view.progress);
        last = view.progress;
    }

    let view = h.coordinator.tracking(&h.customer, order.id()).await.unwrap();
    assert_eq!(view.progress, 100);
    assert_eq!(view.status, OrderStatus::Delivered);
    assert_eq!(view.tracking_number.as_deref(), Some("JNE123456"));
    assert!(view.shipped_at.is_some());
    assert!(view.delivered_at.is_some());
    assert_eq!(
        view.latest.map(|entry| entry.updated_by),
        Some(h.admin.user_id.to_string())
    );
}

#[tokio::test]
async fn payment_session_outcomes() {
    let h = harness();
    let a = product(&h, "Tas Ransel", 200_000, 5).await;
    h.carts.add_item(&h.customer, a.id, 1).await.unwrap();
    let order = h
        .coordinator
        .create_order_from_cart(&h.customer, checkout())
        .await
        .unwrap();
    let contact = CustomerContact {
        name: "Budi Santoso".to_string(),
        email: "budi@example.com".to_string(),
        phone: "081234567890".to_string(),
    };

    let created = h
        .coordinator
        .create_payment(&h.customer, order.id(), contact.clone())
        .await
        .unwrap();
    assert!(created.success);
    assert_eq!(created.token.as_deref(), Some("SNAP-0001"));
    let request = h.gateway.last_request().unwrap();
    assert_eq!(
        request.transaction_details.gross_amount,
        order.total_amount().major()
    );

    h.gateway.set_reject_with(Some("gross_amount mismatch"));
    let rejected = h
        .coordinator
        .create_payment(&h.customer, order.id(), contact.clone())
        .await
        .unwrap();
    assert!(!rejected.success);
    assert_eq!(rejected.error.as_deref(), Some("gross_amount mismatch"));

    h.gateway.set_reject_with(None);
    h.gateway.set_unavailable(true);
    let unavailable = h
        .coordinator
        .create_payment(&h.customer, order.id(), contact.clone())
        .await;
    assert!(matches!(
        unavailable,
        Err(FulfillmentError::GatewayUnavailable(_))
    ));
    assert_eq!(h.gateway.request_count(), 3);

    let stored = h.store.load_order(order.id()).await.unwrap();
    assert_eq!(stored.payment_status(), PaymentStatus::Pending);
    assert_eq!(stored.version(), order.version());

    let stranger = Actor::customer(UserId::new());
    let denied = h
        .coordinator
        .create_payment(&stranger, order.id(), contact)
        .await;
    assert!(matches!(denied, Err(FulfillmentError::Forbidden(_))));
    assert_eq!(h.gateway.request_count(), 3);
}

#[tokio::test]
async fn concurrent_checkouts_never_oversell() {
    let h = harness();
    let a = product(&h, "Limited Jersey", 500_000, 4).await;
    let coordinator = Arc::new(h.coordinator);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let customer = Actor::customer(UserId::new());
        CartService::new(h.store.clone())
            .add_item(&customer, a.id, 1)
            .await
            .unwrap();
        let coordinator = Arc::clone(&coordinator);
        handles.push(tokio::spawn(async move {
            coordinator
                .create_order_from_cart(&customer, checkout())
                .await
                .is_ok()
        }));
    }

    let results = futures_util::future::join_all(handles).await;
    let placed = results
        .into_iter()
        .filter(|r| matches!(r, Ok(true)))
        .count();

    assert_eq!(placed, 4);
    assert_eq!(h.store.load_product(a.id).await.unwrap().stock, 0);
}

#[tokio::test]
async fn concurrent_cancel_and_failure_restock_once() {
    let h = harness();
    let a = product(&h, "Raket Pro", 900_000, 3).await;
    h.carts.add_item(&h.customer, a.id, 3).await.unwrap();
    let order = h
        .coordinator
        .create_order_from_cart(&h.customer, checkout())
        .await
        .unwrap();
    let raw = signed_notification(order.order_number().as_str(), order.total_amount(), "cancel");

    let coordinator = Arc::new(h.coordinator);
    let cancel = {
        let coordinator = Arc::clone(&coordinator);
        let customer = h.customer.clone();
        tokio::spawn(async move { coordinator.cancel_order(&customer, order.id(), None).await })
    };
    let webhook = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move { coordinator.handle_payment_notification(&raw).await })
    };
    let _ = cancel.await;
    let _ = webhook.await;

    assert_eq!(h.store.load_product(a.id).await.unwrap().stock, 3);
}
