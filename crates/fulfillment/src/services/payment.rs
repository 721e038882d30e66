//! Payment gateway trait and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transaction totals sent to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDetails {
    /// External order identifier; the order number.
    pub order_id: String,
    /// Whole currency units.
    pub gross_amount: i64,
}

/// Address block inside customer details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayAddress {
    pub first_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub first_name: String,
    pub email: String,
    pub phone: String,
    pub shipping_address: GatewayAddress,
}

/// One line of the payment page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDetail {
    pub id: String,
    pub price: i64,
    pub quantity: u32,
    pub name: String,
}

/// Where the payment page sends the customer afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Callbacks {
    pub finish: String,
    pub unfinish: String,
    pub error: String,
}

/// A payment session request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub transaction_details: TransactionDetails,
    pub customer_details: CustomerDetails,
    pub item_details: Vec<ItemDetail>,
    pub callbacks: Callbacks,
}

/// A session opened by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub token: String,
    pub redirect_url: String,
}

/// Gateway failures, split by whether the gateway answered at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The gateway refused the request.
    #[error("{0}")]
    Rejected(String),

    /// The gateway could not be reached or answered with a server fault.
    #[error("{0}")]
    Unavailable(String),
}

/// Trait for payment session creation.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a payment session. Never retried by callers.
    async fn create_session(&self, request: &SessionRequest)
    -> Result<PaymentSession, GatewayError>;
}

#[async_trait]
impl<T: PaymentGateway + ?Sized> PaymentGateway for Arc<T> {
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<PaymentSession, GatewayError> {
        (**self).create_session(request).await
    }
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    requests: Vec<SessionRequest>,
    next_id: u32,
    reject_with: Option<String>,
    unavailable: bool,
}

/// In-memory payment gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to refuse sessions with the given message.
    pub fn set_reject_with(&self, message: Option<&str>) {
        if let Ok(mut state) = self.state.write() {
            state.reject_with = message.map(str::to_string);
        }
    }

    /// Configures the gateway to behave as unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut state) = self.state.write() {
            state.unavailable = unavailable;
        }
    }

    /// Returns the number of session requests received.
    pub fn request_count(&self) -> usize {
        self.state.read().map(|s| s.requests.len()).unwrap_or(0)
    }

    /// Returns the most recent session request.
    pub fn last_request(&self) -> Option<SessionRequest> {
        self.state
            .read()
            .ok()
            .and_then(|s| s.requests.last().cloned())
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<PaymentSession, GatewayError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| GatewayError::Unavailable("gateway state poisoned".to_string()))?;

        state.requests.push(request.clone());

        if state.unavailable {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }
        if let Some(message) = &state.reject_with {
            return Err(GatewayError::Rejected(message.clone()));
        }

        state.next_id += 1;
        let token = format!("SNAP-{:04}", state.next_id);
        Ok(PaymentSession {
            redirect_url: format!("https://pay.test/snap/v2/vtweb/{token}"),
            token,
        })
    }
}
