//! Back-office catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::ProductId;
use domain::{Money, Product};
use serde::Deserialize;
use store::CommerceStore;

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::routes::parse_id;

fn active_by_default() -> bool {
    true
}

#[derive(Deserialize)]
pub struct ProductRequest {
    pub name: String,
    pub sku: String,
    pub price: Money,
    pub stock: u32,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

#[derive(Deserialize)]
pub struct StockAdjustmentRequest {
    pub delta: i64,
}

/// PUT /admin/products/{id}
#[tracing::instrument(skip(state, user, req), fields(user_id = %user.actor.user_id))]
pub async fn upsert_product<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<ProductRequest>,
) -> Result<Json<Product>, ApiError> {
    let product_id = parse_id::<ProductId>(&id, "product id")?;
    if req.price.is_negative() {
        return Err(ApiError::BadRequest("price must not be negative".to_string()));
    }

    let product = Product {
        id: product_id,
        name: req.name,
        sku: req.sku,
        price: req.price,
        stock: req.stock,
        weight_kg: req.weight_kg.filter(|w| *w > 0.0),
        is_active: req.is_active,
    };
    let product = state.coordinator.upsert_product(&user.actor, product).await?;
    Ok(Json(product))
}

/// POST /admin/products/{id}/stock with a signed `delta`.
#[tracing::instrument(skip(state, user, req), fields(user_id = %user.actor.user_id))]
pub async fn adjust_stock<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<StockAdjustmentRequest>,
) -> Result<Json<Product>, ApiError> {
    let product_id = parse_id::<ProductId>(&id, "product id")?;
    let product = state
        .coordinator
        .adjust_stock(&user.actor, product_id, req.delta)
        .await?;
    Ok(Json(product))
}
