//! Application configuration loaded from environment variables.

use std::time::Duration;

use domain::Money;
use fulfillment::{EstimatorConfig, GatewayConfig};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `text` or `json`
/// - `DATABASE_URL`: Postgres connection string; unset runs in memory
/// - `PAYMENT_SERVER_KEY`, `PAYMENT_BASE_URL`, `PAYMENT_TIMEOUT_SECS`
/// - `FRONTEND_URL`: origin for payment redirect callbacks
/// - `SHIPPING_RATE_URL`: remote rate service; unset uses the built-in table
/// - `SHIPPING_TIMEOUT_SECS`, `SHIPPING_FALLBACK_BASE_COST`
/// - `SHIPPING_MIN_WEIGHT_KG`, `SHIPPING_MAX_WEIGHT_KG`
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub gateway: GatewayConfig,
    pub shipping_rate_url: Option<String>,
    pub shipping_timeout: Duration,
    pub estimator: EstimatorConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Loads configuration from `lookup`, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let gateway = GatewayConfig {
            server_key: lookup("PAYMENT_SERVER_KEY").unwrap_or_default(),
            base_url: non_empty("PAYMENT_BASE_URL").unwrap_or(defaults.gateway.base_url),
            frontend_url: non_empty("FRONTEND_URL").unwrap_or(defaults.gateway.frontend_url),
            timeout: parsed("PAYMENT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.gateway.timeout),
        };

        let weight = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|w| w.is_finite() && *w > 0.0)
        };
        let min_weight_kg =
            weight("SHIPPING_MIN_WEIGHT_KG").unwrap_or(defaults.estimator.min_weight_kg);
        let estimator = EstimatorConfig {
            fallback_base_cost: lookup("SHIPPING_FALLBACK_BASE_COST")
                .and_then(|v| v.parse::<Money>().ok())
                .unwrap_or(defaults.estimator.fallback_base_cost),
            min_weight_kg,
            max_weight_kg: weight("SHIPPING_MAX_WEIGHT_KG")
                .filter(|w| *w >= min_weight_kg)
                .unwrap_or(defaults.estimator.max_weight_kg.max(min_weight_kg)),
        };

        Self {
            host: non_empty("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: non_empty("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            database_url: non_empty("DATABASE_URL"),
            gateway,
            shipping_rate_url: non_empty("SHIPPING_RATE_URL"),
            shipping_timeout: parsed("SHIPPING_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shipping_timeout),
            estimator,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            gateway: GatewayConfig::default(),
            shipping_rate_url: None,
            shipping_timeout: Duration::from_secs(5),
            estimator: EstimatorConfig::default(),
        }
    }
}
