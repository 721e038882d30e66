//! Inventory ledger over the store's stock operations.

use common::ProductId;
use store::{CommerceStore, MAX_STOCK};

use crate::error::{FulfillmentError, Result};

/// Per-product stock debit and credit.
///
/// Each call is a single atomic store operation; checkout reserves inside the
/// store's placement transaction instead of going through here.
#[derive(Debug, Clone)]
pub struct InventoryLedger<S> {
    store: S,
}

impl<S: CommerceStore> InventoryLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Decrements stock, failing with `InsufficientStock` if fewer than
    /// `quantity` units remain. Returns the new stock level.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(&self, product_id: ProductId, quantity: u32) -> Result<u32> {
        let stock = self.store.reserve_stock(product_id, quantity).await?;
        metrics::counter!("stock_reservations_total").increment(1);
        tracing::debug!(stock, "stock reserved");
        Ok(stock)
    }

    /// Increments stock and returns the new level.
    #[tracing::instrument(skip(self))]
    pub async fn restore(&self, product_id: ProductId, quantity: u32) -> Result<u32> {
        let stock = self.store.restore_stock(product_id, quantity).await?;
        metrics::counter!("stock_restorations_total").increment(1);
        tracing::debug!(stock, "stock restored");
        Ok(stock)
    }

    /// Applies a signed stock correction.
    ///
    /// Fails with `StockOutOfRange` if `delta` exceeds [`MAX_STOCK`] either way.
    pub async fn adjust(&self, product_id: ProductId, delta: i64) -> Result<u32> {
        let quantity = u32::try_from(delta.unsigned_abs())
            .ok()
            .filter(|quantity| *quantity <= MAX_STOCK)
            .ok_or(FulfillmentError::StockOutOfRange { product_id })?;
        if delta < 0 {
            self.reserve(product_id, quantity).await
        } else {
            self.restore(product_id, quantity).await
        }
    }
}
