//! Cart operations for the acting user.

use chrono::Utc;
use common::{Actor, CartId, ProductId};
use domain::{Action, Cart, Money, Target};
use serde::Serialize;
use store::{CommerceStore, CommerceStoreExt};

use crate::coordinator::ensure_allowed;
use crate::error::Result;

/// A cart line joined with the product name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub product_name: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartView {
    pub id: CartId,
    pub items: Vec<CartLineView>,
    pub subtotal: Money,
    pub total_quantity: u32,
}

/// Reads and edits the acting user's cart.
#[derive(Debug, Clone)]
pub struct CartService<S> {
    store: S,
}

impl<S: CommerceStore> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn view(&self, actor: &Actor) -> Result<CartView> {
        ensure_allowed(actor, Action::ManageCart, Target::Global)?;
        let cart = self.store.get_cart(actor.user_id).await?;
        self.render(cart).await
    }

    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn add_item(
        &self,
        actor: &Actor,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView> {
        ensure_allowed(actor, Action::ManageCart, Target::Global)?;
        let product = self.store.load_product(product_id).await?;
        let mut cart = self.store.get_cart(actor.user_id).await?;

        cart.add_item(&product, quantity, Utc::now())?;
        self.store.save_cart(&cart).await?;
        self.render(cart).await
    }

    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn update_item(
        &self,
        actor: &Actor,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView> {
        ensure_allowed(actor, Action::ManageCart, Target::Global)?;
        let product = self.store.load_product(product_id).await?;
        let mut cart = self.store.get_cart(actor.user_id).await?;

        cart.update_item(&product, quantity, Utc::now())?;
        self.store.save_cart(&cart).await?;
        self.render(cart).await
    }

    pub async fn remove_item(&self, actor: &Actor, product_id: ProductId) -> Result<CartView> {
        ensure_allowed(actor, Action::ManageCart, Target::Global)?;
        let mut cart = self.store.get_cart(actor.user_id).await?;

        cart.remove_item(product_id, Utc::now())?;
        self.store.save_cart(&cart).await?;
        self.render(cart).await
    }

    pub async fn clear(&self, actor: &Actor) -> Result<CartView> {
        ensure_allowed(actor, Action::ManageCart, Target::Global)?;
        let mut cart = self.store.get_cart(actor.user_id).await?;

        cart.clear(Utc::now());
        self.store.save_cart(&cart).await?;
        self.render(cart).await
    }

    async fn render(&self, cart: Cart) -> Result<CartView> {
        let ids: Vec<ProductId> = cart.items.iter().map(|item| item.product_id).collect();
        let products = self.store.get_products(&ids).await?;

        let items = cart
            .items
            .iter()
            .map(|item| CartLineView {
                product_id: item.product_id,
                product_name: products
                    .iter()
                    .find(|p| p.id == item.product_id)
                    .map(|p| p.name.clone()),
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.line_total(),
            })
            .collect();

        Ok(CartView {
            id: cart.id,
            items,
            subtotal: cart.subtotal(),
            total_quantity: cart.total_quantity(),
        })
    }
}
