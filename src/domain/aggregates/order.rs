//! Order Aggregate

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::cart::PricedCart;
use crate::domain::value_objects::round_money;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub items: Vec<OrderItem>,
    pub shipping_address_id: Uuid,
    pub billing_address_id: Uuid,
    pub status: OrderStatus,
    pub status_history: Vec<StatusEntry>,
    pub tracking_number: Option<String>,
    pub admin_notes: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub delivery_method: DeliveryMethod,
    pub coupon_code: Option<String>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order line with the product data frozen at order time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub snapshot: ProductSnapshot,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub name: String,
    pub slug: String,
    pub price: Decimal,
    pub discount_percent: Decimal,
    pub effective_price: Decimal,
    pub image: Option<String>,
}

/// One immutable entry in an order's status history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: OrderStatus,
    pub at: DateTime<Utc>,
    pub actor: Uuid,
    pub notes: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Confirmed, Shipped, Delivered, Cancelled }

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [Self::Pending, Self::Confirmed, Self::Shipped, Self::Delivered, Self::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Delivered | Self::Cancelled) }

    /// Statuses reachable from `self` in one step.
    pub fn successors(&self) -> &'static [OrderStatus] {
        match self {
            Self::Pending => &[Self::Confirmed, Self::Cancelled],
            Self::Confirmed => &[Self::Shipped, Self::Cancelled],
            Self::Shipped => &[Self::Delivered, Self::Cancelled],
            Self::Delivered | Self::Cancelled => &[],
        }
    }

    /// Re-writing the current status is allowed so that notes can be recorded.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        *self == next || self.successors().contains(&next)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|v| v.as_str() == s).ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod { Card, Bkash, Nagad, CashOnDelivery, BankTransfer }

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 5] = [Self::Card, Self::Bkash, Self::Nagad, Self::CashOnDelivery, Self::BankTransfer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Bkash => "bkash",
            Self::Nagad => "nagad",
            Self::CashOnDelivery => "cash_on_delivery",
            Self::BankTransfer => "bank_transfer",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|v| v.as_str() == s).ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus { #[default] Unpaid, Pending, CollectOnDelivery, Paid, Failed }

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 5] = [Self::Unpaid, Self::Pending, Self::CollectOnDelivery, Self::Paid, Self::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Pending => "pending",
            Self::CollectOnDelivery => "collect_on_delivery",
            Self::Paid => "paid",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|v| v.as_str() == s).ok_or_else(|| UnknownVariant(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod { Standard, Pickup }

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Standard => "standard", Self::Pickup => "pickup" }
    }
}

impl FromStr for DeliveryMethod {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "pickup" => Ok(Self::Pickup),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub struct UnknownVariant(pub String);
impl std::error::Error for UnknownVariant {}
impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "unknown value '{}'", self.0) }
}

/// Admin order update; omitted fields are left untouched.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct OrderUpdate {
    pub status: Option<String>,
    #[validate(length(min = 1, max = 100, message = "tracking number must be 1-100 characters"))]
    pub tracking_number: Option<String>,
    #[validate(length(max = 2000))]
    pub admin_notes: Option<String>,
}

/// Field changes written to storage in one step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderChanges {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub tracking_number: Option<String>,
    pub admin_notes: Option<String>,
    pub history_entry: Option<StatusEntry>,
}

impl OrderChanges {
    /// A status change together with its history entry.
    pub fn transition(status: OrderStatus, actor: Uuid, notes: Option<String>) -> Self {
        Self {
            status: Some(status),
            history_entry: Some(StatusEntry { status, at: Utc::now(), actor, notes }),
            ..Self::default()
        }
    }
}

impl Order {
    /// Builds a pending order from a priced cart, freezing product data into each line.
    pub fn place(
        user_id: Uuid,
        cart: &PricedCart,
        addresses: (Uuid, Uuid),
        payment_method: PaymentMethod,
        delivery_method: DeliveryMethod,
        coupon: Option<(String, Decimal)>,
    ) -> Self {
        let id = Uuid::now_v7();
        let now = Utc::now();
        let items = cart.items.iter().map(|line| OrderItem {
            product_id: line.product_id,
            quantity: line.quantity,
            snapshot: ProductSnapshot {
                name: line.name.clone(),
                slug: line.slug.clone(),
                price: line.price,
                discount_percent: line.discount_percent,
                effective_price: line.effective_price,
                image: line.image.clone(),
            },
        }).collect();
        let (coupon_code, coupon_discount) = match coupon {
            Some((code, amount)) => (Some(code), round_money(amount).min(cart.total).max(Decimal::ZERO)),
            None => (None, Decimal::ZERO),
        };
        let discount = cart.discount + coupon_discount;
        Self {
            id,
            order_number: order_number(id, now),
            user_id,
            items,
            shipping_address_id: addresses.0,
            billing_address_id: addresses.1,
            status: OrderStatus::Pending,
            status_history: vec![StatusEntry { status: OrderStatus::Pending, at: now, actor: user_id, notes: None }],
            tracking_number: None,
            admin_notes: None,
            payment_method,
            payment_status: PaymentStatus::Unpaid,
            delivery_method,
            coupon_code,
            subtotal: cart.subtotal,
            discount,
            total: cart.subtotal - discount,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies changes in memory the same way the store applies them.
    pub fn apply(&mut self, changes: &OrderChanges) {
        if let Some(status) = changes.status { self.status = status; }
        if let Some(payment) = changes.payment_status { self.payment_status = payment; }
        if let Some(tracking) = &changes.tracking_number { self.tracking_number = Some(tracking.clone()); }
        if let Some(notes) = &changes.admin_notes { self.admin_notes = Some(notes.clone()); }
        if let Some(entry) = &changes.history_entry { self.status_history.push(entry.clone()); }
        self.updated_at = Utc::now();
    }
}

fn order_number(id: Uuid, at: DateTime<Utc>) -> String {
    let suffix: String = id.simple().to_string().chars().rev().take(6).collect::<String>().to_uppercase();
    format!("ORD-{}-{}", at.format("%Y%m%d"), suffix)
}
