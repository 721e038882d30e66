//! Shipping rate sources.
//!
//! [`StaticRateTable`] prices parcels from a per-city base rate with weight
//! and courier multipliers. [`HttpRateSource`] asks a remote rate service.
//! Either can fail a lookup; the estimator then falls back to its formula.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use domain::{CourierService, Money};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const CITY_RATES: &[(&str, i64)] = &[
    ("pekanbaru", 8_000),
    ("dumai", 10_000),
    ("rengat", 12_000),
    ("bangkinang", 9_000),
    ("duri", 11_000),
    ("batam", 15_000),
    ("tanjungpinang", 16_000),
    ("jakarta", 22_000),
    ("bandung", 24_000),
    ("surabaya", 28_000),
    ("medan", 18_000),
    ("padang", 20_000),
    ("jambi", 16_000),
    ("palembang", 20_000),
    ("lampung", 25_000),
    ("semarang", 26_000),
    ("yogyakarta", 27_000),
    ("makassar", 35_000),
    ("manado", 40_000),
    ("pontianak", 22_000),
];

const DELIVERY_DAYS: &[(&str, u32)] = &[
    ("pekanbaru", 1),
    ("jakarta", 2),
    ("bandung", 2),
    ("surabaya", 3),
    ("medan", 2),
    ("semarang", 3),
    ("makassar", 4),
    ("yogyakarta", 3),
    ("palembang", 2),
    ("batam", 2),
];

const DEFAULT_DELIVERY_DAYS: u32 = 3;

/// Same-day delivery is only offered here.
const SAME_DAY_CITIES: &[&str] = &["pekanbaru", "jakarta", "bandung", "surabaya", "medan"];

/// Inclusive postal code ranges and the city they belong to.
const POSTAL_RANGES: &[(u32, u32, &str)] = &[
    (28111, 28183, "pekanbaru"),
    (28284, 28289, "dumai"),
    (29711, 29716, "batam"),
    (10110, 10112, "jakarta"),
    (20111, 20113, "medan"),
];

/// Where parcels ship from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Origin {
    pub postal_code: &'static str,
    pub city: &'static str,
    pub province: &'static str,
    pub country: &'static str,
}

pub const ORIGIN: Origin = Origin {
    postal_code: "28127",
    city: "Pekanbaru",
    province: "Riau",
    country: "Indonesia",
};

/// A courier tier offered for a destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourierOption {
    pub code: CourierService,
    pub name: &'static str,
    pub description: &'static str,
    pub multiplier: f64,
}

/// Parcel destination as entered at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub city: String,
    #[serde(default)]
    pub postal_code: Option<String>,
}

impl Destination {
    pub fn city(city: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            postal_code: None,
        }
    }

    pub fn with_postal_code(mut self, postal_code: impl Into<String>) -> Self {
        self.postal_code = Some(postal_code.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateQuery {
    pub destination: Destination,
    pub weight_kg: f64,
    pub courier: CourierService,
}

/// Estimated delivery time in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryWindow {
    pub min_days: u32,
    pub max_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub cost: Money,
    pub delivery: DeliveryWindow,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RateLookupError {
    #[error("No rate for destination {0}")]
    UnknownDestination(String),

    #[error("Rate source unavailable: {0}")]
    Unavailable(String),
}

/// Trait for shipping rate lookups.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn quote(&self, query: &RateQuery) -> Result<RateQuote, RateLookupError>;
}

#[async_trait]
impl<T: RateSource + ?Sized> RateSource for Arc<T> {
    async fn quote(&self, query: &RateQuery) -> Result<RateQuote, RateLookupError> {
        (**self).quote(query).await
    }
}

/// Cities with a base rate, in table order.
pub fn supported_cities() -> Vec<&'static str> {
    CITY_RATES.iter().map(|(city, _)| *city).collect()
}

/// Courier tiers available for `city`.
pub fn courier_services(city: &str) -> Vec<CourierOption> {
    let mut options = vec![
        CourierOption {
            code: CourierService::Regular,
            name: "Reguler",
            description: "Pengiriman standar",
            multiplier: courier_multiplier(CourierService::Regular),
        },
        CourierOption {
            code: CourierService::Express,
            name: "Express",
            description: "Pengiriman cepat",
            multiplier: courier_multiplier(CourierService::Express),
        },
    ];
    if SAME_DAY_CITIES.contains(&normalize(city).as_str()) {
        options.push(CourierOption {
            code: CourierService::SameDay,
            name: "Same Day",
            description: "Pengiriman hari yang sama",
            multiplier: courier_multiplier(CourierService::SameDay),
        });
    }
    options
}

/// Resolves a destination to a rated city, by name first and then by postal code.
pub fn resolve_city(destination: &Destination) -> Option<&'static str> {
    let by_name = normalize(&destination.city);
    if let Some((city, _)) = CITY_RATES.iter().find(|(city, _)| *city == by_name) {
        return Some(city);
    }
    let code: u32 = destination.postal_code.as_deref()?.trim().parse().ok()?;
    POSTAL_RANGES
        .iter()
        .find(|(low, high, _)| (*low..=*high).contains(&code))
        .map(|(_, _, city)| *city)
}

pub fn weight_multiplier(weight_kg: f64) -> f64 {
    if weight_kg <= 1.0 {
        1.0
    } else if weight_kg <= 5.0 {
        1.5
    } else {
        2.0
    }
}

pub fn courier_multiplier(courier: CourierService) -> f64 {
    match courier {
        CourierService::Regular => 1.0,
        CourierService::Express => 1.5,
        CourierService::SameDay => 2.5,
    }
}

/// Delivery window for a city and tier; unknown cities use the default lead time.
pub fn delivery_window(city: &str, courier: CourierService) -> DeliveryWindow {
    let city = normalize(city);
    let base = DELIVERY_DAYS
        .iter()
        .find(|(name, _)| *name == city)
        .map(|(_, days)| *days)
        .unwrap_or(DEFAULT_DELIVERY_DAYS);

    match courier {
        CourierService::SameDay => DeliveryWindow {
            min_days: 0,
            max_days: 1,
        },
        CourierService::Express => DeliveryWindow {
            min_days: base.saturating_sub(1).max(1),
            max_days: base,
        },
        CourierService::Regular => DeliveryWindow {
            min_days: base,
            max_days: base + 2,
        },
    }
}

/// Rounds a whole-unit amount up to the next thousand, saturating at the
/// money range. NaN rounds to zero.
pub(crate) fn round_up_to_thousand(amount: f64) -> Money {
    let thousands = (amount / 1000.0).ceil() as i64;
    Money::from_major(thousands.saturating_mul(1000))
}

fn normalize(city: &str) -> String {
    city.trim().to_lowercase()
}

/// Built-in rate table.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticRateTable;

impl StaticRateTable {
    pub fn new() -> Self {
        Self
    }

    pub fn lookup(&self, query: &RateQuery) -> Result<RateQuote, RateLookupError> {
        let city = resolve_city(&query.destination)
            .ok_or_else(|| RateLookupError::UnknownDestination(query.destination.city.clone()))?;
        let base = CITY_RATES
            .iter()
            .find(|(name, _)| *name == city)
            .map(|(_, rate)| *rate)
            .ok_or_else(|| RateLookupError::UnknownDestination(city.to_string()))?;

        let raw = base as f64 * weight_multiplier(query.weight_kg) * courier_multiplier(query.courier);
        Ok(RateQuote {
            cost: round_up_to_thousand(raw),
            delivery: delivery_window(city, query.courier),
        })
    }
}

#[async_trait]
impl RateSource for StaticRateTable {
    async fn quote(&self, query: &RateQuery) -> Result<RateQuote, RateLookupError> {
        self.lookup(query)
    }
}

/// Remote rate service.
///
/// Posts the query as JSON and expects `{cost, etd_min_days, etd_max_days}`
/// with `cost` in whole currency units.
#[derive(Debug, Clone)]
pub struct HttpRateSource {
    url: String,
    http: Client,
}

#[derive(Debug, Serialize)]
struct RateRequestBody<'a> {
    destination_city: &'a str,
    destination_postal_code: Option<&'a str>,
    weight_kg: f64,
    courier: &'a str,
}

#[derive(Debug, Deserialize)]
struct RateResponseBody {
    cost: i64,
    etd_min_days: u32,
    etd_max_days: u32,
}

impl HttpRateSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RateLookupError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RateLookupError::Unavailable(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    #[tracing::instrument(skip(self, query), fields(city = %query.destination.city))]
    async fn quote(&self, query: &RateQuery) -> Result<RateQuote, RateLookupError> {
        let body = RateRequestBody {
            destination_city: &query.destination.city,
            destination_postal_code: query.destination.postal_code.as_deref(),
            weight_kg: query.weight_kg,
            courier: query.courier.as_str(),
        };

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RateLookupError::Unavailable(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RateLookupError::UnknownDestination(
                query.destination.city.clone(),
            ));
        }
        if !response.status().is_success() {
            return Err(RateLookupError::Unavailable(format!(
                "rate service answered {}",
                response.status()
            )));
        }

        let parsed: RateResponseBody = response
            .json()
            .await
            .map_err(|e| RateLookupError::Unavailable(e.to_string()))?;

        Ok(RateQuote {
            cost: Money::from_major(parsed.cost),
            delivery: DeliveryWindow {
                min_days: parsed.etd_min_days,
                max_days: parsed.etd_max_days,
            },
        })
    }
}

#[derive(Debug, Default)]
struct InMemoryRateState {
    queries: usize,
    fail_on_quote: bool,
}

/// Static table with a failure switch, for testing fallbacks.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRateSource {
    table: StaticRateTable,
    state: Arc<RwLock<InMemoryRateState>>,
}

impl InMemoryRateSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures every lookup to fail as unavailable.
    pub fn set_fail_on_quote(&self, fail: bool) {
        if let Ok(mut state) = self.state.write() {
            state.fail_on_quote = fail;
        }
    }

    /// Returns the number of lookups made.
    pub fn query_count(&self) -> usize {
        self.state.read().map(|s| s.queries).unwrap_or(0)
    }
}

#[async_trait]
impl RateSource for InMemoryRateSource {
    async fn quote(&self, query: &RateQuery) -> Result<RateQuote, RateLookupError> {
        let fail = match self.state.write() {
            Ok(mut state) => {
                state.queries += 1;
                state.fail_on_quote
            }
            Err(_) => true,
        };
        if fail {
            return Err(RateLookupError::Unavailable("rate source offline".to_string()));
        }
        self.table.lookup(query)
    }
}
