//! Shipping cost estimation with a local fallback.

use std::sync::Arc;

use domain::{CourierService, Money, Product};
use serde::Serialize;

use crate::config::EstimatorConfig;
use crate::services::shipping::{
    DeliveryWindow, Destination, RateQuery, RateSource, delivery_window, round_up_to_thousand,
};

/// Decides how much one unit of a product weighs.
pub trait WeightStrategy: Send + Sync {
    fn unit_weight(&self, product: &Product) -> f64;
}

/// Guesses a weight from keywords in the product name.
///
/// Only a heuristic for catalogs without declared weights.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordWeightTable;

const KEYWORD_WEIGHTS: &[(&[&str], f64)] = &[
    (&["sepatu", "shoes"], 0.8),
    (&["jersey", "kaos"], 0.3),
    (&["raket", "racket"], 0.4),
    (&["bola", "ball"], 0.5),
    (&["tas", "bag"], 0.6),
    (&["helm", "helmet"], 1.2),
];

const DEFAULT_UNIT_WEIGHT: f64 = 0.5;

impl WeightStrategy for KeywordWeightTable {
    fn unit_weight(&self, product: &Product) -> f64 {
        let name = product.name.to_lowercase();
        KEYWORD_WEIGHTS
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| name.contains(k)))
            .map(|(_, weight)| *weight)
            .unwrap_or(DEFAULT_UNIT_WEIGHT)
    }
}

/// Uses the declared catalog weight, asking `F` only when there is none.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredWeightFirst<F = KeywordWeightTable> {
    fallback: F,
}

impl<F: WeightStrategy> DeclaredWeightFirst<F> {
    pub fn new(fallback: F) -> Self {
        Self { fallback }
    }
}

impl<F: WeightStrategy> WeightStrategy for DeclaredWeightFirst<F> {
    fn unit_weight(&self, product: &Product) -> f64 {
        match product.weight_kg {
            Some(weight) if weight > 0.0 => weight,
            _ => self.fallback.unit_weight(product),
        }
    }
}

/// Result of a shipping estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShippingEstimate {
    pub cost: Money,
    pub courier_service: CourierService,
    pub weight_kg: f64,
    pub delivery: DeliveryWindow,
    /// True when the rate source failed and the formula priced the parcel.
    pub fallback_used: bool,
}

/// Prices parcels through a [`RateSource`], falling back to
/// `ceil(base * (1 + max(0, weight - 1) * 0.1) / 1000) * 1000` on any lookup
/// failure.
pub struct ShippingEstimator<R> {
    source: R,
    config: EstimatorConfig,
    weights: Arc<dyn WeightStrategy>,
}

impl<R: RateSource> ShippingEstimator<R> {
    pub fn new(source: R, config: EstimatorConfig) -> Self {
        Self {
            source,
            config,
            weights: Arc::new(DeclaredWeightFirst::<KeywordWeightTable>::default()),
        }
    }

    pub fn with_weight_strategy(mut self, weights: impl WeightStrategy + 'static) -> Self {
        self.weights = Arc::new(weights);
        self
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Total billed weight of `lines`, never below the configured minimum.
    pub fn parcel_weight<'a>(&self, lines: impl IntoIterator<Item = (&'a Product, u32)>) -> f64 {
        let total: f64 = lines
            .into_iter()
            .map(|(product, quantity)| self.weights.unit_weight(product) * f64::from(quantity))
            .sum();
        total.max(self.config.min_weight_kg)
    }

    /// Estimates shipping for a parcel. Never fails.
    #[tracing::instrument(skip(self, destination), fields(city = %destination.city))]
    pub async fn estimate(
        &self,
        destination: &Destination,
        weight_kg: f64,
        courier_service: CourierService,
    ) -> ShippingEstimate {
        let weight_kg = self.billable_weight(weight_kg);
        let query = RateQuery {
            destination: destination.clone(),
            weight_kg,
            courier: courier_service,
        };

        match self.source.quote(&query).await {
            Ok(quote) => {
                metrics::counter!("shipping_estimates_total", "source" => "rate_source")
                    .increment(1);
                ShippingEstimate {
                    cost: quote.cost,
                    courier_service,
                    weight_kg,
                    delivery: quote.delivery,
                    fallback_used: false,
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "rate lookup failed, using fallback estimate");
                metrics::counter!("shipping_estimates_total", "source" => "fallback")
                    .increment(1);
                ShippingEstimate {
                    cost: self.fallback_cost(weight_kg),
                    courier_service,
                    weight_kg,
                    delivery: delivery_window(&destination.city, courier_service),
                    fallback_used: true,
                }
            }
        }
    }

    /// Clamps `weight_kg` into the configured range. NaN bills the minimum.
    pub fn billable_weight(&self, weight_kg: f64) -> f64 {
        if weight_kg.is_nan() {
            return self.config.min_weight_kg;
        }
        weight_kg.clamp(self.config.min_weight_kg, self.config.max_weight_kg)
    }

    fn fallback_cost(&self, weight_kg: f64) -> Money {
        let base = self.config.fallback_base_cost.major() as f64;
        let surcharge = (weight_kg - 1.0).max(0.0) * 0.1;
        round_up_to_thousand(base * (1.0 + surcharge))
    }
}
