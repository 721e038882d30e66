//! Payment gateway notification endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use fulfillment::NotificationReceipt;
use store::CommerceStore;

use crate::AppState;
use crate::error::ApiError;

/// POST /payment/notification
///
/// Called by the gateway, not by users; authenticity comes from the
/// signature in the body.
#[tracing::instrument(skip(state, body))]
pub async fn notification<S: CommerceStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<NotificationReceipt>, ApiError> {
    let receipt = state.coordinator.handle_payment_notification(&body).await?;
    Ok(Json(receipt))
}
