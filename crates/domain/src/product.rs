//! Catalog product rows as seen by the order core.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// A catalog product.
///
/// `stock` is unsigned so it can never go below zero; it is only changed
/// through the store's reserve/restore operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub sku: String,
    pub price: Money,
    pub stock: u32,
    /// Declared shipping weight in kilograms, if the catalog has one.
    pub weight_kg: Option<f64>,
    pub is_active: bool,
}

impl Product {
    /// Creates an active product with no declared weight.
    pub fn new(
        name: impl Into<String>,
        sku: impl Into<String>,
        price: Money,
        stock: u32,
    ) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            sku: sku.into(),
            price,
            stock,
            weight_kg: None,
            is_active: true,
        }
    }

    pub fn with_id(mut self, id: ProductId) -> Self {
        self.id = id;
        self
    }

    pub fn with_weight(mut self, weight_kg: f64) -> Self {
        self.weight_kg = Some(weight_kg);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Returns true if `quantity` units could currently be reserved.
    pub fn has_stock(&self, quantity: u32) -> bool {
        self.stock >= quantity
    }
}
