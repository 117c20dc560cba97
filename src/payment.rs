//! Payment initiation.
//!
//! No money is moved here. [`OfflineGateway`] records online methods as
//! awaiting payment and cash on delivery as collectable; a real provider
//! implements [`PaymentGateway`] instead.

use std::future::Future;

use rust_decimal::Decimal;

use crate::domain::aggregates::{Order, PaymentMethod, PaymentStatus};
use crate::error::{EcommerceError, Result};

/// Starts payment for a freshly created order. An `Err` makes checkout
/// cancel the order.
pub trait PaymentGateway: Send + Sync {
    fn initiate(&self, order: &Order) -> impl Future<Output = Result<PaymentStatus>> + Send;
}

#[derive(Clone, Debug, Default)]
pub struct OfflineGateway;

impl OfflineGateway {
    pub fn new() -> Self { Self }
}

/// Status an order starts with when no external provider is involved.
fn initial_status(order: &Order) -> Result<PaymentStatus> {
    if order.total < Decimal::ZERO {
        return Err(EcommerceError::Unexpected(format!("order {} has a negative total", order.order_number)));
    }
    Ok(match order.payment_method {
        PaymentMethod::CashOnDelivery => PaymentStatus::CollectOnDelivery,
        _ if order.total.is_zero() => PaymentStatus::Paid,
        _ => PaymentStatus::Pending,
    })
}

impl PaymentGateway for OfflineGateway {
    async fn initiate(&self, order: &Order) -> Result<PaymentStatus> {
        let status = initial_status(order)?;
        tracing::info!(
            order = %order.order_number,
            method = order.payment_method.as_str(),
            status = status.as_str(),
            "payment initiated"
        );
        Ok(status)
    }
}
