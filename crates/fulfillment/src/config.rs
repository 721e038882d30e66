//! Configuration for the outbound collaborators.
//!
//! These are plain values; reading them from the environment is the
//! binary's job.

use std::time::Duration;

use domain::Money;

use crate::services::payment::Callbacks;

/// Payment gateway settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Secret key for API authentication and notification signatures.
    pub server_key: String,
    pub base_url: String,
    /// Storefront origin the payment page redirects back to.
    pub frontend_url: String,
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server_key: String::new(),
            base_url: "https://app.sandbox.midtrans.com".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl GatewayConfig {
    /// Hosted payment page for a session token.
    pub fn redirect_url(&self, token: &str) -> String {
        format!(
            "{}/snap/v2/vtweb/{token}",
            self.base_url.trim_end_matches('/')
        )
    }

    pub fn callbacks(&self) -> Callbacks {
        let base = self.frontend_url.trim_end_matches('/');
        Callbacks {
            finish: format!("{base}/payment/success"),
            unfinish: format!("{base}/payment/pending"),
            error: format!("{base}/payment/failed"),
        }
    }
}

/// Shipping estimator settings.
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    /// Base cost of the fallback formula.
    pub fallback_base_cost: Money,
    /// Parcels are never billed below this weight.
    pub min_weight_kg: f64,
    /// Heaviest parcel quoted; heavier parcels are billed at this weight.
    pub max_weight_kg: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            fallback_base_cost: Money::from_major(15_000),
            min_weight_kg: 0.5,
            max_weight_kg: 1_000.0,
        }
    }
}
