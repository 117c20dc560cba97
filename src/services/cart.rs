//! Cart reads and mutations. Totals are always recomputed from the live catalog.

use serde::Deserialize;
use uuid::Uuid;

use crate::domain::aggregates::{price_cart, Cart, CartLine, PricedCart};
use crate::domain::value_objects::Quantity;
use crate::error::{EcommerceError, Result};
use crate::store::{CartRepository, ProductRepository};

#[derive(Clone, Debug, Deserialize)]
pub struct AddToCart {
    pub product_id: Uuid,
    #[serde(default = "one")]
    pub quantity: i32,
}

fn one() -> i32 { 1 }

#[derive(Clone, Debug, Deserialize)]
pub struct SetQuantity {
    pub quantity: i32,
}

pub async fn load<S>(store: &S, user_id: Uuid) -> Result<Cart>
where
    S: CartRepository,
{
    Ok(Cart::new(user_id, store.load_cart(user_id).await?))
}

/// The caller's cart priced against current product data.
pub async fn view<S>(store: &S, user_id: Uuid) -> Result<PricedCart>
where
    S: CartRepository + ProductRepository,
{
    let cart = load(store, user_id).await?;
    if cart.is_empty() {
        return Ok(PricedCart::default());
    }
    let products = store.find_products(&cart.product_ids()).await?;
    Ok(price_cart(cart.lines(), &products))
}

pub async fn add_item<S>(store: &S, user_id: Uuid, input: AddToCart) -> Result<PricedCart>
where
    S: CartRepository + ProductRepository,
{
    let quantity = Quantity::new(input.quantity).map_err(|e| EcommerceError::invalid("quantity", e.to_string()))?;
    let product = store
        .find_product(input.product_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| EcommerceError::not_found("product"))?;

    let mut cart = load(store, user_id).await?;
    let merged = cart.add(product.id, quantity);
    if !product.has_stock(merged.value()) {
        return Err(EcommerceError::invalid("quantity", format!("only {} in stock", product.stock)));
    }
    store.put_cart_line(cart.user_id(), &CartLine { product_id: product.id, quantity: merged }).await?;
    tracing::debug!(user = %cart.user_id(), product = %product.id, quantity = merged.value(), "cart line saved");
    view(store, user_id).await
}

/// Sets a line's quantity; zero removes the line.
pub async fn set_quantity<S>(store: &S, user_id: Uuid, product_id: Uuid, input: SetQuantity) -> Result<PricedCart>
where
    S: CartRepository + ProductRepository,
{
    if input.quantity == 0 {
        return remove_item(store, user_id, product_id).await;
    }
    let quantity = Quantity::new(input.quantity).map_err(|e| EcommerceError::invalid("quantity", e.to_string()))?;
    let cart = load(store, user_id).await?;
    if cart.line(product_id).is_none() {
        return Err(EcommerceError::not_found("cart item"));
    }
    if let Some(product) = store.find_product(product_id).await? {
        if !product.has_stock(quantity.value()) {
            return Err(EcommerceError::invalid("quantity", format!("only {} in stock", product.stock)));
        }
    }
    store.put_cart_line(user_id, &CartLine { product_id, quantity }).await?;
    view(store, user_id).await
}

pub async fn remove_item<S>(store: &S, user_id: Uuid, product_id: Uuid) -> Result<PricedCart>
where
    S: CartRepository + ProductRepository,
{
    if !store.remove_cart_line(user_id, product_id).await? {
        return Err(EcommerceError::not_found("cart item"));
    }
    view(store, user_id).await
}

pub async fn clear<S>(store: &S, user_id: Uuid) -> Result<()>
where
    S: CartRepository,
{
    store.clear_cart(user_id).await
}
