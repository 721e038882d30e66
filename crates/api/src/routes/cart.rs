//! Cart endpoints for the calling user.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::ProductId;
use fulfillment::CartView;
use serde::Deserialize;
use store::CommerceStore;

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::routes::parse_id;

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: u32,
}

/// GET /cart
pub async fn view<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(state.carts.view(&user.actor).await?))
}

/// DELETE /cart
pub async fn clear<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
) -> Result<Json<CartView>, ApiError> {
    Ok(Json(state.carts.clear(&user.actor).await?))
}

/// POST /cart/items
#[tracing::instrument(skip(state, user, req), fields(user_id = %user.actor.user_id))]
pub async fn add_item<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartView>, ApiError> {
    let cart = state
        .carts
        .add_item(&user.actor, req.product_id, req.quantity)
        .await?;
    Ok(Json(cart))
}

/// PUT /cart/items/{product_id}
pub async fn update_item<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(product_id): Path<String>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<CartView>, ApiError> {
    let product_id = parse_id::<ProductId>(&product_id, "product id")?;
    let cart = state
        .carts
        .update_item(&user.actor, product_id, req.quantity)
        .await?;
    Ok(Json(cart))
}

/// DELETE /cart/items/{product_id}
pub async fn remove_item<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(product_id): Path<String>,
) -> Result<Json<CartView>, ApiError> {
    let product_id = parse_id::<ProductId>(&product_id, "product id")?;
    Ok(Json(state.carts.remove_item(&user.actor, product_id).await?))
}
