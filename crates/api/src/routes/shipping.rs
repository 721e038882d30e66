//! Shipping estimate and rate table endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use domain::CourierService;
use fulfillment::services::shipping::{self, CourierOption, ORIGIN, Origin};
use fulfillment::services::Destination;
use fulfillment::{CartShippingEstimate, ShippingEstimate};
use serde::{Deserialize, Serialize};
use store::CommerceStore;

use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct EstimateRequest {
    pub city: String,
    #[serde(default)]
    pub postal_code: Option<String>,
    pub weight_kg: f64,
    #[serde(default)]
    pub courier_service: CourierService,
}

#[derive(Deserialize)]
pub struct CartEstimateRequest {
    pub city: String,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub courier_service: CourierService,
}

#[derive(Deserialize)]
pub struct CourierQuery {
    #[serde(default)]
    pub city: Option<String>,
}

#[derive(Serialize)]
pub struct CitiesResponse {
    pub cities: Vec<&'static str>,
}

fn destination(city: String, postal_code: Option<String>) -> Result<Destination, ApiError> {
    if city.trim().is_empty() {
        return Err(ApiError::BadRequest("city is required".to_string()));
    }
    Ok(Destination { city, postal_code })
}

/// POST /shipping/estimate
pub async fn estimate<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<EstimateRequest>,
) -> Result<Json<ShippingEstimate>, ApiError> {
    if !req.weight_kg.is_finite() || req.weight_kg <= 0.0 {
        return Err(ApiError::BadRequest(
            "weight_kg must be a positive number".to_string(),
        ));
    }
    let max_weight_kg = state.coordinator.estimator().config().max_weight_kg;
    if req.weight_kg > max_weight_kg {
        return Err(ApiError::BadRequest(format!(
            "weight_kg must not exceed {max_weight_kg}"
        )));
    }
    let destination = destination(req.city, req.postal_code)?;
    let estimate = state
        .coordinator
        .estimate_shipping(&destination, req.weight_kg, req.courier_service)
        .await;
    Ok(Json(estimate))
}

/// POST /shipping/estimate-cart
pub async fn estimate_cart<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Json(req): Json<CartEstimateRequest>,
) -> Result<Json<CartShippingEstimate>, ApiError> {
    let destination = destination(req.city, req.postal_code)?;
    let estimate = state
        .coordinator
        .estimate_cart(&user.actor, &destination, req.courier_service)
        .await?;
    Ok(Json(estimate))
}

/// GET /shipping/cities
pub async fn cities() -> Json<CitiesResponse> {
    Json(CitiesResponse {
        cities: shipping::supported_cities(),
    })
}

/// GET /shipping/origin
pub async fn origin() -> Json<Origin> {
    Json(ORIGIN)
}

/// GET /shipping/courier-services?city=
pub async fn courier_services(Query(query): Query<CourierQuery>) -> Json<Vec<CourierOption>> {
    let city = query.city.unwrap_or_else(|| ORIGIN.city.to_string());
    Json(shipping::courier_services(&city))
}
