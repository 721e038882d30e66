//! Value objects for the Order aggregate.

use chrono::NaiveDate;
use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Human-facing order number: `ORD-<YYYYMMDD>-<NNNN>`.
///
/// `NNNN` is the 1-based sequence of the order within its calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn new(day: NaiveDate, sequence: u32) -> Self {
        Self(format!("ORD-{}-{:04}", day.format("%Y%m%d"), sequence))
    }

    /// Parses an order number, rejecting anything not in the canonical format.
    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.strip_prefix("ORD-")?;
        let (day, sequence) = rest.split_once('-')?;
        if day.len() != 8 || sequence.len() < 4 {
            return None;
        }
        NaiveDate::parse_from_str(day, "%Y%m%d").ok()?;
        if !sequence.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the daily sequence component.
    pub fn sequence(&self) -> Option<u32> {
        self.0.rsplit('-').next()?.parse().ok()
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Delivery address captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    #[serde(default)]
    pub state: String,
    pub postal_code: String,
}

/// Courier service tier chosen at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CourierService {
    #[default]
    Regular,
    Express,
    SameDay,
}

impl CourierService {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourierService::Regular => "regular",
            CourierService::Express => "express",
            CourierService::SameDay => "same_day",
        }
    }
}

impl std::fmt::Display for CourierService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CourierService {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(CourierService::Regular),
            "express" => Ok(CourierService::Express),
            "same_day" => Ok(CourierService::SameDay),
            other => Err(format!("unknown courier service: {other}")),
        }
    }
}

/// A line item frozen into an order at checkout.
///
/// Name, SKU and price are copied from the product and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Weak reference; the product may later change or disappear.
    pub product_id: ProductId,
    pub product_name: String,
    pub product_sku: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderItem {
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        product_sku: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            product_sku: product_sku.into(),
            quantity,
            unit_price,
        }
    }

    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A quantity of one product moved in or out of stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub product_id: ProductId,
    pub quantity: u32,
}
