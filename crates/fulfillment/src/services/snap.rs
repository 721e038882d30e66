//! HTTP client for the Snap payment API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::config::GatewayConfig;
use crate::services::payment::{GatewayError, PaymentGateway, PaymentSession, SessionRequest};

/// Snap gateway over HTTPS, authenticated with the server key.
#[derive(Debug, Clone)]
pub struct SnapGateway {
    config: GatewayConfig,
    http: Client,
}

impl SnapGateway {
    /// Creates a client whose requests time out after `config.timeout`.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        Ok(Self { config, http })
    }

    fn transactions_url(&self) -> String {
        format!(
            "{}/snap/v1/transactions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[derive(Debug, Deserialize)]
struct SnapResponse {
    token: String,
    #[serde(default)]
    redirect_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SnapErrorResponse {
    #[serde(default)]
    error_messages: Vec<String>,
}

#[async_trait]
impl PaymentGateway for SnapGateway {
    #[tracing::instrument(skip(self, request), fields(order_number = %request.transaction_details.order_id))]
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<PaymentSession, GatewayError> {
        let response = self
            .http
            .post(self.transactions_url())
            .basic_auth(&self.config.server_key, Some(""))
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GatewayError::Unavailable(format!(
                "gateway answered {status}"
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<SnapErrorResponse>(&text)
                .ok()
                .filter(|body| !body.error_messages.is_empty())
                .map(|body| body.error_messages.join(", "))
                .unwrap_or_else(|| format!("gateway answered {status}: {text}"));
            return Err(GatewayError::Rejected(message));
        }

        let body: SnapResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        let redirect_url = body
            .redirect_url
            .unwrap_or_else(|| self.config.redirect_url(&body.token));
        Ok(PaymentSession {
            token: body.token,
            redirect_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transactions_url_trims_trailing_slash() {
        let config = GatewayConfig {
            base_url: "https://app.sandbox.midtrans.com/".to_string(),
            ..GatewayConfig::default()
        };
        let gateway = SnapGateway::new(config).unwrap();

        assert_eq!(
            gateway.transactions_url(),
            "https://app.sandbox.midtrans.com/snap/v1/transactions"
        );
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_unavailable() {
        let config = GatewayConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_millis(500),
            ..GatewayConfig::default()
        };
        let gateway = SnapGateway::new(config).unwrap();
        let request: SessionRequest = serde_json::from_value(serde_json::json!({
            "transaction_details": {"order_id": "ORD-20240101-0001", "gross_amount": 1000},
            "customer_details": {
                "first_name": "A", "email": "a@b.c", "phone": "",
                "shipping_address": {
                    "first_name": "A", "phone": "", "address": "", "city": "",
                    "postal_code": "", "country_code": "IDN"
                }
            },
            "item_details": [],
            "callbacks": {"finish": "", "unfinish": "", "error": ""}
        }))
        .unwrap();

        let result = gateway.create_session(&request).await;
        assert!(matches!(result, Err(GatewayError::Unavailable(_))));
    }
}
