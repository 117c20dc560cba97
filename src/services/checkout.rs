//! Checkout orchestration.
//!
//! A submission is validated section by section, first failure wins. Once it
//! is accepted the order is written and payment started; those two steps are
//! critical. Every later step is attempted independently and reported in the
//! receipt, so a failed e-mail never undoes an order.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{addresses, authenticated, cart, coupons, Caller};
use crate::domain::aggregates::{
    mask_account, AddressInput, DeliveryMethod, Order, OrderChanges, OrderStatus, PaymentMethod,
    PaymentStatus, PricedCart, SavedPaymentMethod,
};
use crate::domain::events::{DomainEvent, OrderEvent, ProductEvent};
use crate::error::{EcommerceError, Result};
use crate::notify::{Notification, Notifier};
use crate::payment::PaymentGateway;
use crate::store::{
    AccountRepository, AddressRepository, CartRepository, CouponRepository, OrderRepository, ProductRepository,
};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CheckoutSubmission {
    #[serde(default)]
    pub shipping: ShippingSection,
    #[serde(default)]
    pub billing: BillingSection,
    #[serde(default)]
    pub payment: PaymentSection,
    pub delivery_method: Option<String>,
    pub coupon_code: Option<String>,
}

/// A saved address id or a new address to save.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ShippingSection {
    pub id: Option<Uuid>,
    pub address: Option<AddressInput>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BillingSection {
    #[serde(default)]
    pub same_as_shipping: bool,
    pub id: Option<Uuid>,
    pub address: Option<AddressInput>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PaymentSection {
    pub method: Option<String>,
    #[serde(default)]
    pub agree_to_terms: bool,
    /// Card or wallet number, only used when `save` is set.
    pub account: Option<String>,
    #[serde(default)]
    pub save: bool,
}

/// Outcome of one post-validation step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CheckoutReceipt {
    pub order: Order,
    pub steps: Vec<StepOutcome>,
}

impl CheckoutReceipt {
    pub fn step(&self, name: &str) -> Option<&StepOutcome> { self.steps.iter().find(|s| s.step == name) }

    pub fn all_ok(&self) -> bool { self.steps.iter().all(|s| s.ok) }
}

enum AddressChoice {
    Saved(Uuid),
    New(AddressInput),
}

struct Accepted {
    shipping: AddressChoice,
    /// `None` bills the shipping address.
    billing: Option<AddressChoice>,
    payment_method: PaymentMethod,
    delivery_method: DeliveryMethod,
    save_account: Option<String>,
    coupon_code: Option<String>,
}

/// Shape checks that need no storage access, in reporting order.
fn accept(submission: CheckoutSubmission) -> Result<Accepted> {
    let CheckoutSubmission { shipping, billing, payment, delivery_method, coupon_code } = submission;

    let billing = match (billing.same_as_shipping, billing.id, billing.address) {
        (true, _, _) => None,
        (false, Some(id), _) => Some(AddressChoice::Saved(id)),
        (false, None, Some(address)) => Some(AddressChoice::New(address)),
        (false, None, None) => {
            return Err(EcommerceError::invalid("billing.id", "select a billing address or use the shipping address"));
        }
    };

    let payment_method = payment
        .method
        .as_deref()
        .and_then(|m| m.parse::<PaymentMethod>().ok())
        .ok_or_else(|| EcommerceError::invalid("payment.method", "choose a valid payment method"))?;

    if !payment.agree_to_terms {
        return Err(EcommerceError::invalid("payment.agree_to_terms", "must agree to terms"));
    }

    let shipping = match (shipping.id, shipping.address) {
        (Some(id), _) => AddressChoice::Saved(id),
        (None, Some(address)) => AddressChoice::New(address),
        (None, None) => return Err(EcommerceError::invalid("shipping.id", "select a shipping address")),
    };

    let delivery_method = delivery_method
        .as_deref()
        .and_then(|m| m.parse::<DeliveryMethod>().ok())
        .ok_or_else(|| EcommerceError::invalid("delivery_method", "choose standard delivery or pickup"))?;

    if let AddressChoice::New(input) = &shipping {
        input.validate().map_err(|e| EcommerceError::from(e).within("shipping.address"))?;
    }
    if let Some(AddressChoice::New(input)) = &billing {
        input.validate().map_err(|e| EcommerceError::from(e).within("billing.address"))?;
    }

    let save_account = payment.account.filter(|a| payment.save && !a.trim().is_empty());
    let coupon_code = coupon_code.filter(|c| !c.trim().is_empty());

    Ok(Accepted { shipping, billing, payment_method, delivery_method, save_account, coupon_code })
}

/// Runs a checkout for the caller's current cart.
pub async fn checkout<S, P>(
    store: &S,
    notifier: &Notifier,
    payments: &P,
    caller: Option<&Caller>,
    submission: CheckoutSubmission,
) -> Result<CheckoutReceipt>
where
    S: CartRepository
        + ProductRepository
        + OrderRepository
        + AddressRepository
        + CouponRepository
        + AccountRepository,
    P: PaymentGateway,
{
    let caller = authenticated(caller)?;
    let user_id = caller.user_id;
    let accepted = accept(submission)?;

    let priced = cart::view(store, user_id).await?;
    if priced.is_empty() {
        return Err(EcommerceError::invalid("cart", "your cart is empty"));
    }
    for choice in [Some(&accepted.shipping), accepted.billing.as_ref()] {
        if let Some(AddressChoice::Saved(id)) = choice {
            addresses::owned(store, user_id, *id).await?;
        }
    }
    let coupon = match &accepted.coupon_code {
        Some(code) => {
            let (coupon, amount) = coupons::resolve(store, code, priced.total).await?;
            Some((coupon.code, amount))
        }
        None => None,
    };
    check_stock(&priced)?;

    let mut steps = Steps::default();

    let shipping_id = match accepted.shipping {
        AddressChoice::Saved(id) => id,
        AddressChoice::New(input) => {
            let saved = addresses::create(store, user_id, input).await;
            steps.record("save_shipping_address", saved.as_ref().map(|_| ()).map_err(ToString::to_string));
            saved?.id
        }
    };
    let billing_id = match accepted.billing {
        None => shipping_id,
        Some(AddressChoice::Saved(id)) => id,
        Some(AddressChoice::New(input)) => {
            let saved = addresses::create(store, user_id, input).await;
            steps.record("save_billing_address", saved.as_ref().map(|_| ()).map_err(ToString::to_string));
            saved?.id
        }
    };

    let mut order = Order::place(
        user_id,
        &priced,
        (shipping_id, billing_id),
        accepted.payment_method,
        accepted.delivery_method,
        coupon,
    );
    let created = store.insert_order(&order).await;
    steps.record("create_order", created.as_ref().map(|_| ()).map_err(ToString::to_string));
    created?;
    tracing::info!(order = %order.order_number, user = %user_id, total = %order.total, "order created");

    match payments.initiate(&order).await {
        Ok(payment_status) => {
            let changes = OrderChanges { payment_status: Some(payment_status), ..OrderChanges::default() };
            order.apply(&changes);
            let written = store.apply_order_changes(order.id, &changes).await;
            steps.record("initiate_payment", written.map(|_| ()).map_err(|e| e.to_string()));
        }
        Err(error) => {
            steps.record("initiate_payment", Err(error.to_string()));
            abandon(store, &order, user_id, &error).await;
            return Err(EcommerceError::Unexpected(format!("payment for order {} could not be started", order.order_number)));
        }
    }

    for item in &order.items {
        let outcome = match store.decrement_stock(item.product_id, item.quantity).await {
            Ok(Some(0)) => {
                let event = DomainEvent::Product(ProductEvent::StockDepleted { product_id: item.product_id });
                notifier.publish_quietly(&event).await;
                Ok(())
            }
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err("insufficient stock".to_string()),
            Err(error) => Err(error.to_string()),
        };
        steps.record(format!("decrement_stock:{}", item.product_id), outcome);
    }

    let appended = store.append_order_history(user_id, order.id).await;
    steps.record("append_order_history", appended.map_err(|e| e.to_string()));

    if let Some(account) = &accepted.save_account {
        let method = SavedPaymentMethod {
            id: Uuid::now_v7(),
            user_id,
            method: order.payment_method,
            label: mask_account(account),
            created_at: Utc::now(),
        };
        let saved = store.insert_payment_method(&method).await;
        steps.record("save_payment_method", saved.map_err(|e| e.to_string()));
    }

    if let Some(code) = &order.coupon_code {
        let redeemed = match store.redeem_coupon(code).await {
            Ok(true) => Ok(()),
            Ok(false) => Err("usage limit reached".to_string()),
            Err(error) => Err(error.to_string()),
        };
        steps.record("redeem_coupon", redeemed);
    }

    let cleared = store.clear_cart(user_id).await;
    steps.record("clear_cart", cleared.map_err(|e| e.to_string()));

    let notified = match store.find_user(user_id).await {
        Ok(Some(user)) => {
            let message = Notification::OrderConfirmation {
                to: user.email,
                name: user.name,
                order_number: order.order_number.clone(),
                total: order.total,
            };
            notifier.send(&message).await.map_err(|e| e.to_string())
        }
        Ok(None) => Err("user record missing".to_string()),
        Err(error) => Err(error.to_string()),
    };
    steps.record("send_confirmation", notified);

    let placed = DomainEvent::Order(OrderEvent::Placed { order_id: order.id, user_id, total: order.total });
    let published = notifier.publish(&placed).await;
    steps.record("publish_event", published.map_err(|e| e.to_string()));

    Ok(CheckoutReceipt { order, steps: steps.0 })
}

fn check_stock(priced: &PricedCart) -> Result<()> {
    match priced.items.iter().find(|line| line.quantity > line.stock) {
        Some(line) => Err(EcommerceError::invalid(
            "cart",
            format!("only {} of {} left in stock", line.stock.max(0), line.name),
        )),
        None => Ok(()),
    }
}

/// Cancels an order whose payment could not be started.
async fn abandon<S>(store: &S, order: &Order, actor: Uuid, error: &EcommerceError)
where
    S: OrderRepository,
{
    tracing::error!(order = %order.order_number, %error, "payment initiation failed, cancelling order");
    let mut changes = OrderChanges::transition(OrderStatus::Cancelled, actor, Some("payment initiation failed".to_string()));
    changes.payment_status = Some(PaymentStatus::Failed);
    if let Err(error) = store.apply_order_changes(order.id, &changes).await {
        tracing::error!(order = %order.order_number, %error, "failed to cancel order after payment failure");
    }
}

#[derive(Default)]
struct Steps(Vec<StepOutcome>);

impl Steps {
    fn record(&mut self, step: impl Into<String>, outcome: std::result::Result<(), String>) {
        let step = step.into();
        match outcome {
            Ok(()) => {
                tracing::debug!(step = %step, "checkout step done");
                self.0.push(StepOutcome { step, ok: true, detail: None });
            }
            Err(detail) => {
                tracing::warn!(step = %step, %detail, "checkout step failed");
                self.0.push(StepOutcome { step, ok: false, detail: Some(detail) });
            }
        }
    }
}
