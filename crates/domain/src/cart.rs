//! Shopping cart.
//!
//! A cart is a per-user mutable collection of product lines. Each line keeps
//! the price seen when it was last added or updated; the order built from the
//! cart freezes those prices again at checkout.

use chrono::{DateTime, Utc};
use common::{CartId, ProductId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{money::Money, product::Product};

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: u32 = 10;

/// Errors raised by cart operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("Invalid quantity: {quantity} (must be between 1 and 10)")]
    InvalidQuantity { quantity: u32 },

    #[error("Product {product_id} is not available")]
    ProductUnavailable { product_id: ProductId },

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Product {product_id} is not in the cart")]
    ItemNotFound { product_id: ProductId },
}

/// A single product line in a cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Price snapshot taken when the line was added or last updated.
    pub unit_price: Money,
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A user's shopping cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub items: Vec<CartItem>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart for a user.
    pub fn new(user_id: UserId) -> Self {
        Self {
            id: CartId::new(),
            user_id,
            items: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }

    /// Sum of line totals at snapshot prices.
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Adds `quantity` of `product`, merging into an existing line.
    ///
    /// A merged line is validated against the combined quantity and takes the
    /// product's current price.
    pub fn add_item(
        &mut self,
        product: &Product,
        quantity: u32,
        at: DateTime<Utc>,
    ) -> Result<(), CartError> {
        check_quantity(quantity)?;
        check_available(product)?;

        let existing = self.item(&product.id).map(|item| item.quantity).unwrap_or(0);
        let combined = existing + quantity;
        check_quantity(combined)?;
        check_stock(product, combined)?;

        match self
            .items
            .iter_mut()
            .find(|item| item.product_id == product.id)
        {
            Some(item) => {
                item.quantity = combined;
                item.unit_price = product.price;
            }
            None => self.items.push(CartItem {
                product_id: product.id,
                quantity,
                unit_price: product.price,
                added_at: at,
            }),
        }

        self.updated_at = at;
        Ok(())
    }

    /// Replaces the quantity of an existing line, refreshing its price.
    pub fn update_item(
        &mut self,
        product: &Product,
        quantity: u32,
        at: DateTime<Utc>,
    ) -> Result<(), CartError> {
        check_quantity(quantity)?;
        check_available(product)?;
        check_stock(product, quantity)?;

        let item = self
            .items
            .iter_mut()
            .find(|item| item.product_id == product.id)
            .ok_or(CartError::ItemNotFound {
                product_id: product.id,
            })?;

        item.quantity = quantity;
        item.unit_price = product.price;
        self.updated_at = at;
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: ProductId, at: DateTime<Utc>) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|item| item.product_id != product_id);
        if self.items.len() == before {
            return Err(CartError::ItemNotFound { product_id });
        }
        self.updated_at = at;
        Ok(())
    }

    pub fn clear(&mut self, at: DateTime<Utc>) {
        self.items.clear();
        self.updated_at = at;
    }

    /// Drops the lines for the given products. Used after checkout.
    pub fn remove_lines(&mut self, product_ids: &[ProductId], at: DateTime<Utc>) {
        self.items
            .retain(|item| !product_ids.contains(&item.product_id));
        self.updated_at = at;
    }
}

fn check_quantity(quantity: u32) -> Result<(), CartError> {
    if quantity == 0 || quantity > MAX_LINE_QUANTITY {
        return Err(CartError::InvalidQuantity { quantity });
    }
    Ok(())
}

fn check_available(product: &Product) -> Result<(), CartError> {
    if !product.is_active {
        return Err(CartError::ProductUnavailable {
            product_id: product.id,
        });
    }
    Ok(())
}

fn check_stock(product: &Product, requested: u32) -> Result<(), CartError> {
    if !product.has_stock(requested) {
        return Err(CartError::InsufficientStock {
            product_id: product.id,
            requested,
            available: product.stock,
        });
    }
    Ok(())
}
