//! Order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use domain::{
    Aggregate, CourierService, Money, Order, OrderItem, OrderStatus, PaymentStatus,
    ShippingAddress, TrackingUpdate,
};
use fulfillment::{CheckoutRequest, PaymentStatusView, PaymentTokenResult, TrackingView};
use serde::{Deserialize, Serialize};
use store::CommerceStore;

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::routes::parse_id;

// -- Request types --

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Deserialize)]
pub struct UpdatePaymentRequest {
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub raw_response: Option<serde_json::Value>,
}

#[derive(Deserialize, Default)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub items: Vec<OrderItem>,
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub total_amount: Money,
    pub courier_service: CourierService,
    pub shipping_address: ShippingAddress,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id(),
            order_number: order.order_number().to_string(),
            user_id: order.user_id(),
            status: order.status(),
            payment_status: order.payment_status(),
            items: order.items().to_vec(),
            subtotal: order.subtotal(),
            shipping_cost: order.shipping_cost(),
            total_amount: order.total_amount(),
            courier_service: order.courier_service(),
            shipping_address: order.shipping_address().clone(),
            notes: order.notes().map(str::to_string),
            tracking_number: order.tracking_number().map(str::to_string),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
            version: order.version().as_i64(),
        }
    }
}

#[derive(Serialize)]
pub struct EventResponse {
    pub event_id: String,
    pub event_type: String,
    pub version: i64,
    pub timestamp: String,
    pub payload: serde_json::Value,
}

// -- Handlers --

/// POST /orders: check out the caller's cart.
#[tracing::instrument(skip(state, user, req), fields(user_id = %user.actor.user_id))]
pub async fn create<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state
        .coordinator
        .create_order_from_cart(&user.actor, req)
        .await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// GET /orders: the caller's orders, newest first.
pub async fn list<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.coordinator.list_orders(&user.actor).await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{id}
pub async fn get<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_id::<OrderId>(&id, "order id")?;
    let order = state.coordinator.get_order(&user.actor, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// PATCH /orders/{id}/status
#[tracing::instrument(skip(state, user, req), fields(user_id = %user.actor.user_id))]
pub async fn update_status<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_id::<OrderId>(&id, "order id")?;
    let order = state
        .coordinator
        .update_order_status(&user.actor, order_id, req.status)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// PATCH /orders/{id}/payment-status
#[tracing::instrument(skip(state, user, req), fields(user_id = %user.actor.user_id))]
pub async fn update_payment_status<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdatePaymentRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_id::<OrderId>(&id, "order id")?;
    let order = state
        .coordinator
        .update_payment_status(&user.actor, order_id, req.payment_status, req.raw_response)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/{id}/cancel with an optional `{"reason": ...}` body.
#[tracing::instrument(skip(state, user, body), fields(user_id = %user.actor.user_id))]
pub async fn cancel<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_id::<OrderId>(&id, "order id")?;
    let req: CancelRequest = if body.is_empty() {
        CancelRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?
    };

    let order = state
        .coordinator
        .cancel_order(&user.actor, order_id, req.reason)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /orders/{id}/status: payment status for polling after checkout.
pub async fn payment_status<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<PaymentStatusView>, ApiError> {
    let order_id = parse_id::<OrderId>(&id, "order id")?;
    Ok(Json(
        state.coordinator.payment_status(&user.actor, order_id).await?,
    ))
}

/// POST /orders/{id}/payment: open a payment session.
///
/// A gateway refusal answers 422 with `success: false`.
#[tracing::instrument(skip(state, user), fields(user_id = %user.actor.user_id))]
pub async fn create_payment<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<PaymentTokenResult>), ApiError> {
    let order_id = parse_id::<OrderId>(&id, "order id")?;
    let result = state
        .coordinator
        .create_payment(&user.actor, order_id, user.contact())
        .await?;

    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((status, Json(result)))
}

/// GET /orders/{id}/tracking
pub async fn tracking<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<TrackingView>, ApiError> {
    let order_id = parse_id::<OrderId>(&id, "order id")?;
    Ok(Json(state.coordinator.tracking(&user.actor, order_id).await?))
}

/// PUT /orders/{id}/tracking
#[tracing::instrument(skip(state, user, update), fields(user_id = %user.actor.user_id))]
pub async fn update_tracking<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(update): Json<TrackingUpdate>,
) -> Result<Json<TrackingView>, ApiError> {
    let order_id = parse_id::<OrderId>(&id, "order id")?;
    let order = state
        .coordinator
        .update_tracking(&user.actor, order_id, update)
        .await?;
    Ok(Json(TrackingView::from(&order)))
}

/// GET /orders/{id}/events
pub async fn events<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<EventResponse>>, ApiError> {
    let order_id = parse_id::<OrderId>(&id, "order id")?;
    let envelopes = state.coordinator.order_events(&user.actor, order_id).await?;

    let events = envelopes
        .into_iter()
        .map(|e| EventResponse {
            event_id: e.event_id.to_string(),
            event_type: e.event_type,
            version: e.version.as_i64(),
            timestamp: e.timestamp.to_rfc3339(),
            payload: e.payload,
        })
        .collect();
    Ok(Json(events))
}
