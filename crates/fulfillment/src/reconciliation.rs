//! Payment notification reconciliation.
//!
//! Gateway notifications may arrive late, more than once, or forged. Each is
//! parsed, matched to an order by number, checked against the order's stored
//! total, and applied at most once:
//!
//! - already `paid`: acknowledged, nothing changes
//! - `paid`: payment recorded
//! - `failed`: order cancelled and stock returned, once
//! - `pending` / `challenge`: payment stays pending
//! - anything else: acknowledged, nothing changes
//!
//! The paid check and the write share one versioned save, so two concurrent
//! deliveries of the same notification cannot both apply.

use domain::{OrderStatus, PaymentStatus};
use serde::Serialize;
use store::CommerceStore;

use crate::coordinator::{payment_events, write_order};
use crate::error::{FulfillmentError, Result};
use crate::notification::{CanonicalStatus, PaymentNotification, SignatureVerifier};

/// What a notification did to its order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationOutcome {
    Applied,
    AlreadyPaid,
    Ignored,
}

impl NotificationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationOutcome::Applied => "applied",
            NotificationOutcome::AlreadyPaid => "already_paid",
            NotificationOutcome::Ignored => "ignored",
        }
    }
}

/// Acknowledgement returned for a handled notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationReceipt {
    pub order_number: String,
    pub transaction_status: CanonicalStatus,
    pub outcome: NotificationOutcome,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
}

/// Applies gateway notifications to orders.
#[derive(Debug, Clone)]
pub struct ReconciliationHandler<S> {
    store: S,
    verifier: SignatureVerifier,
}

impl<S: CommerceStore> ReconciliationHandler<S> {
    pub fn new(store: S, verifier: SignatureVerifier) -> Self {
        Self { store, verifier }
    }

    #[tracing::instrument(skip(self, raw))]
    pub async fn handle(&self, raw: &serde_json::Value) -> Result<NotificationReceipt> {
        let result = self.reconcile(raw).await;

        let outcome = match &result {
            Ok(receipt) => receipt.outcome.as_str(),
            Err(FulfillmentError::InvalidSignature) => "invalid_signature",
            Err(FulfillmentError::OrderNotFound(_)) => "order_not_found",
            Err(FulfillmentError::InvalidNotification(_)) => "malformed",
            Err(_) => "error",
        };
        metrics::counter!("payment_notifications_total", "outcome" => outcome).increment(1);
        result
    }

    async fn reconcile(&self, raw: &serde_json::Value) -> Result<NotificationReceipt> {
        let notification = PaymentNotification::parse(raw)?;
        let canonical = notification.canonical_status();

        let Some(order) = self
            .store
            .find_order_by_number(&notification.order_id)
            .await?
        else {
            tracing::error!(order_number = %notification.order_id, "notification for unknown order");
            return Err(FulfillmentError::OrderNotFound(notification.order_id));
        };

        let mut outcome = NotificationOutcome::Ignored;
        let order = write_order(&self.store, order.id(), |order| {
            if order.payment_status() == PaymentStatus::Paid {
                outcome = NotificationOutcome::AlreadyPaid;
                return Ok(vec![]);
            }

            if !self.verifier.verify(&notification, order.total_amount()) {
                tracing::warn!(
                    order_number = %notification.order_id,
                    status_code = %notification.status_code,
                    "notification signature mismatch"
                );
                return Err(FulfillmentError::InvalidSignature);
            }

            let events = match canonical {
                CanonicalStatus::Paid => {
                    payment_events(order, PaymentStatus::Paid, Some(raw.clone()))?
                }
                CanonicalStatus::Failed => {
                    payment_events(order, PaymentStatus::Failed, Some(raw.clone()))?
                }
                CanonicalStatus::Pending | CanonicalStatus::Challenge
                    if order.payment_status() == PaymentStatus::Pending =>
                {
                    payment_events(order, PaymentStatus::Pending, Some(raw.clone()))?
                }
                _ => vec![],
            };
            outcome = if events.is_empty() {
                NotificationOutcome::Ignored
            } else {
                NotificationOutcome::Applied
            };
            Ok(events)
        })
        .await?;

        tracing::info!(
            order_number = %order.order_number(),
            transaction_status = canonical.as_str(),
            outcome = outcome.as_str(),
            payment_status = %order.payment_status(),
            "payment notification handled"
        );

        Ok(NotificationReceipt {
            order_number: order.order_number().to_string(),
            transaction_status: canonical,
            outcome,
            status: order.status(),
            payment_status: order.payment_status(),
        })
    }
}
