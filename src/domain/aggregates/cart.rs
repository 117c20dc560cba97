//! Cart Aggregate
//!
//! The persisted cart is only a list of product references and quantities.
//! Prices, discounts and totals are derived on every read from the live
//! catalog by [`price_cart`].

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::product::Product;
use crate::domain::value_objects::{round_money, Quantity};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: Quantity,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cart {
    user_id: Uuid,
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new(user_id: Uuid, lines: Vec<CartLine>) -> Self { Self { user_id, lines } }

    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }

    pub fn product_ids(&self) -> Vec<Uuid> { self.lines.iter().map(|l| l.product_id).collect() }

    /// Adds `quantity` of a product, merging with an existing line. Returns the new line quantity.
    pub fn add(&mut self, product_id: Uuid, quantity: Quantity) -> Quantity {
        if let Some(existing) = self.lines.iter_mut().find(|l| l.product_id == product_id) {
            existing.quantity = existing.quantity.add(quantity);
            return existing.quantity;
        }
        self.lines.push(CartLine { product_id, quantity });
        quantity
    }

    pub fn line(&self, product_id: Uuid) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub name: String,
    pub slug: String,
    pub image: Option<String>,
    pub quantity: i32,
    pub price: Decimal,
    pub discount_percent: Decimal,
    pub effective_price: Decimal,
    pub line_subtotal: Decimal,
    pub line_discount: Decimal,
    pub line_total: Decimal,
    pub stock: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PricedCart {
    pub items: Vec<PricedLine>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl PricedCart {
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
}

/// Prices cart lines against the current catalog.
///
/// Lines whose product is missing from `products` or inactive are left out
/// of the result. Every line amount is rounded to cents before it is summed,
/// so totals are exactly `subtotal - discount`.
pub fn price_cart(lines: &[CartLine], products: &[Product]) -> PricedCart {
    let by_id: HashMap<Uuid, &Product> = products.iter().map(|p| (p.id, p)).collect();
    let mut cart = PricedCart::default();

    for line in lines {
        let Some(product) = by_id.get(&line.product_id).filter(|p| p.is_active) else { continue };
        let qty = line.quantity.as_decimal();
        let effective = product.effective_price();
        let line_subtotal = round_money(product.price * qty);
        let line_total = round_money(effective * qty);
        let line_discount = line_subtotal - line_total;

        cart.subtotal += line_subtotal;
        cart.discount += line_discount;
        cart.items.push(PricedLine {
            product_id: product.id,
            name: product.name.clone(),
            slug: product.slug.to_string(),
            image: product.primary_image().map(|i| i.url.clone()),
            quantity: line.quantity.value(),
            price: product.price,
            discount_percent: product.discount_percent.value(),
            effective_price: effective,
            line_subtotal,
            line_discount,
            line_total,
            stock: product.stock,
        });
    }

    cart.total = cart.subtotal - cart.discount;
    cart
}
