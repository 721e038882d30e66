//! Payment notification parsing and signature verification.

use domain::Money;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::error::{FulfillmentError, Result};

/// Fields read from a gateway notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentNotification {
    /// External order identifier; the order number.
    pub order_id: String,
    pub status_code: String,
    pub gross_amount: String,
    pub signature_key: String,
    pub transaction_status: String,
    #[serde(default)]
    pub fraud_status: Option<String>,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

impl PaymentNotification {
    /// Parses a raw notification body.
    pub fn parse(raw: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(raw.clone())
            .map_err(|e| FulfillmentError::InvalidNotification(e.to_string()))
    }

    /// Maps gateway transaction and fraud statuses to a canonical status.
    pub fn canonical_status(&self) -> CanonicalStatus {
        match self.transaction_status.as_str() {
            "capture" => match self.fraud_status.as_deref() {
                Some("accept") => CanonicalStatus::Paid,
                Some("challenge") => CanonicalStatus::Challenge,
                _ => CanonicalStatus::Unknown,
            },
            "settlement" => CanonicalStatus::Paid,
            "cancel" | "deny" | "expire" => CanonicalStatus::Failed,
            "pending" => CanonicalStatus::Pending,
            _ => CanonicalStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalStatus {
    Paid,
    Pending,
    Failed,
    Challenge,
    Unknown,
}

impl CanonicalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalStatus::Paid => "paid",
            CanonicalStatus::Pending => "pending",
            CanonicalStatus::Failed => "failed",
            CanonicalStatus::Challenge => "challenge",
            CanonicalStatus::Unknown => "unknown",
        }
    }
}

/// Checks notification signatures against the server key.
#[derive(Clone)]
pub struct SignatureVerifier {
    server_key: String,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("server_key", &"<redacted>")
            .finish()
    }
}

impl SignatureVerifier {
    pub fn new(server_key: impl Into<String>) -> Self {
        Self {
            server_key: server_key.into(),
        }
    }

    /// `sha512(order_id + status_code + amount + server_key)` as lowercase hex,
    /// with the amount rendered to two decimals.
    pub fn sign(&self, order_id: &str, status_code: &str, amount: Money) -> String {
        let mut hasher = Sha512::new();
        hasher.update(order_id.as_bytes());
        hasher.update(status_code.as_bytes());
        hasher.update(amount.to_string().as_bytes());
        hasher.update(self.server_key.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Verifies `notification` against the order's stored total.
    pub fn verify(&self, notification: &PaymentNotification, total_amount: Money) -> bool {
        let expected = self.sign(
            &notification.order_id,
            &notification.status_code,
            total_amount,
        );
        constant_time_eq(
            expected.as_bytes(),
            notification.signature_key.to_ascii_lowercase().as_bytes(),
        )
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
