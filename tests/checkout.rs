mod common;

use rust_decimal::Decimal;
use uuid::Uuid;

use common::*;
use storefront::domain::aggregates::{DiscountType, OrderStatus, PaymentStatus, Role};
use storefront::error::EcommerceError;
use storefront::notify::Notifier;
use storefront::payment::{OfflineGateway, PaymentGateway};
use storefront::services::cart::{self, AddToCart};
use storefront::services::checkout::{
    checkout, BillingSection, CheckoutReceipt, CheckoutSubmission, PaymentSection, ShippingSection,
};
use storefront::services::Caller;

fn submission(shipping: Uuid) -> CheckoutSubmission {
    CheckoutSubmission {
        shipping: ShippingSection { id: Some(shipping), address: None },
        billing: BillingSection { same_as_shipping: true, id: None, address: None },
        payment: PaymentSection {
            method: Some("cash_on_delivery".into()),
            agree_to_terms: true,
            account: None,
            save: false,
        },
        delivery_method: Some("standard".into()),
        coupon_code: None,
    }
}

async fn run(store: &MemoryStore, caller: Option<&Caller>, s: CheckoutSubmission) -> storefront::Result<CheckoutReceipt> {
    run_with(store, &OfflineGateway::new(), caller, s).await
}

async fn run_with<P: PaymentGateway>(
    store: &MemoryStore,
    payments: &P,
    caller: Option<&Caller>,
    s: CheckoutSubmission,
) -> storefront::Result<CheckoutReceipt> {
    checkout(store, &Notifier::disabled(), payments, caller, s).await
}

#[tokio::test]
async fn cart_view_prices_from_live_catalog() {
    let store = MemoryStore::new();
    let user = seed_user(&store, Role::Customer);
    let a = seed_product(&store, product(100, 10, 5));
    let b = seed_product(&store, product(50, 0, 5));
    put_in_cart(&store, user.user_id, a.id, 2);
    put_in_cart(&store, user.user_id, b.id, 1);

    let priced = cart::view(&store, user.user_id).await.unwrap();
    assert_eq!(priced.subtotal, Decimal::new(250, 0));
    assert_eq!(priced.discount, Decimal::new(20, 0));
    assert_eq!(priced.total, Decimal::new(230, 0));

    store.data().products.iter_mut().find(|p| p.id == b.id).unwrap().is_active = false;
    let priced = cart::view(&store, user.user_id).await.unwrap();
    assert_eq!(priced.items.len(), 1);
    assert_eq!(priced.subtotal, Decimal::new(200, 0));
    assert_eq!(store.data().carts[&user.user_id].len(), 2, "inactive lines stay in storage");
}

#[tokio::test]
async fn adding_inactive_product_is_not_found() {
    let store = MemoryStore::new();
    let user = seed_user(&store, Role::Customer);
    let mut p = product(10, 0, 5);
    p.is_active = false;
    let p = seed_product(&store, p);

    let err = cart::add_item(&store, user.user_id, AddToCart { product_id: p.id, quantity: 1 }).await.unwrap_err();
    assert!(matches!(err, EcommerceError::NotFound { entity: "product" }));
}

#[tokio::test]
async fn adding_twice_merges_quantity() {
    let store = MemoryStore::new();
    let user = seed_user(&store, Role::Customer);
    let p = seed_product(&store, product(10, 0, 5));

    cart::add_item(&store, user.user_id, AddToCart { product_id: p.id, quantity: 2 }).await.unwrap();
    let priced = cart::add_item(&store, user.user_id, AddToCart { product_id: p.id, quantity: 1 }).await.unwrap();
    assert_eq!(priced.items.len(), 1);
    assert_eq!(priced.items[0].quantity, 3);

    let err = cart::add_item(&store, user.user_id, AddToCart { product_id: p.id, quantity: 3 }).await.unwrap_err();
    assert!(err.field_issues("quantity").is_some());
}

#[tokio::test]
async fn checkout_requires_a_session() {
    let store = MemoryStore::new();
    let err = run(&store, None, submission(Uuid::new_v4())).await.unwrap_err();
    assert!(matches!(err, EcommerceError::Unauthorized(_)));
}

#[tokio::test]
async fn checkout_rejects_missing_billing_reference() {
    let store = MemoryStore::new();
    let user = seed_user(&store, Role::Customer);
    let address = seed_address(&store, user.user_id, true);
    let mut s = submission(address.id);
    s.billing.same_as_shipping = false;

    let err = run(&store, Some(&user), s).await.unwrap_err();
    assert!(err.field_issues("billing.id").is_some());
    assert!(store.data().orders.is_empty());
}

#[tokio::test]
async fn checkout_rejects_unaccepted_terms() {
    let store = MemoryStore::new();
    let user = seed_user(&store, Role::Customer);
    let address = seed_address(&store, user.user_id, true);
    let p = seed_product(&store, product(100, 0, 5));
    put_in_cart(&store, user.user_id, p.id, 1);
    let mut s = submission(address.id);
    s.payment.agree_to_terms = false;

    let err = run(&store, Some(&user), s).await.unwrap_err();
    assert_eq!(err.to_string(), "payment.agree_to_terms: must agree to terms");
    assert!(store.data().orders.is_empty());
}

#[tokio::test]
async fn checkout_with_empty_cart_is_rejected() {
    let store = MemoryStore::new();
    let user = seed_user(&store, Role::Customer);
    let address = seed_address(&store, user.user_id, true);

    let err = run(&store, Some(&user), submission(address.id)).await.unwrap_err();
    assert!(err.field_issues("cart").is_some());
}

#[tokio::test]
async fn checkout_with_foreign_address_is_not_found() {
    let store = MemoryStore::new();
    let user = seed_user(&store, Role::Customer);
    let other = seed_user(&store, Role::Customer);
    let theirs = seed_address(&store, other.user_id, true);
    let p = seed_product(&store, product(100, 0, 5));
    put_in_cart(&store, user.user_id, p.id, 1);

    let err = run(&store, Some(&user), submission(theirs.id)).await.unwrap_err();
    assert!(matches!(err, EcommerceError::NotFound { entity: "address" }));
}

#[tokio::test]
async fn checkout_rejects_when_stock_is_short() {
    let store = MemoryStore::new();
    let user = seed_user(&store, Role::Customer);
    let address = seed_address(&store, user.user_id, true);
    let p = seed_product(&store, product(100, 0, 1));
    put_in_cart(&store, user.user_id, p.id, 2);

    let err = run(&store, Some(&user), submission(address.id)).await.unwrap_err();
    assert!(err.field_issues("cart").is_some());
    assert_eq!(store.product(p.id).unwrap().stock, 1);
}

#[tokio::test]
async fn successful_checkout_runs_every_step() {
    let store = MemoryStore::new();
    let user = seed_user(&store, Role::Customer);
    let address = seed_address(&store, user.user_id, true);
    let a = seed_product(&store, product(100, 10, 5));
    let b = seed_product(&store, product(50, 0, 1));
    put_in_cart(&store, user.user_id, a.id, 2);
    put_in_cart(&store, user.user_id, b.id, 1);
    seed_coupon(&store, "SAVE30", DiscountType::Fixed, 30);

    let mut s = submission(address.id);
    s.coupon_code = Some(" save30 ".into());
    s.payment.account = Some("01712345678".into());
    s.payment.save = true;
    let receipt = run(&store, Some(&user), s).await.unwrap();

    let order = &receipt.order;
    assert_eq!(order.subtotal, Decimal::new(250, 0));
    assert_eq!(order.discount, Decimal::new(50, 0));
    assert_eq!(order.total, Decimal::new(200, 0));
    assert_eq!(order.coupon_code.as_deref(), Some("SAVE30"));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::CollectOnDelivery);
    assert_eq!(order.billing_address_id, address.id);
    assert_eq!(order.status_history.len(), 1);
    assert_eq!(order.items[0].snapshot.effective_price, Decimal::new(90, 0));
    assert!(receipt.all_ok(), "{:?}", receipt.steps);
    assert!(receipt.step("create_order").is_some());
    assert!(receipt.step("send_confirmation").is_some());

    assert_eq!(store.product(a.id).unwrap().stock, 3);
    assert_eq!(store.product(b.id).unwrap().stock, 0);
    let data = store.data();
    assert!(data.carts.get(&user.user_id).is_none());
    assert_eq!(data.order_history, vec![(user.user_id, order.id)]);
    assert_eq!(data.coupons[0].used_count, 1);
    assert_eq!(data.payment_methods.len(), 1);
    assert_eq!(data.payment_methods[0].label, "•••• 5678");
    assert_eq!(data.orders.len(), 1);
}

#[tokio::test]
async fn exhausted_coupon_is_rejected_before_any_write() {
    let store = MemoryStore::new();
    let user = seed_user(&store, Role::Customer);
    let address = seed_address(&store, user.user_id, true);
    let p = seed_product(&store, product(100, 0, 5));
    put_in_cart(&store, user.user_id, p.id, 2);
    seed_coupon(&store, "ONCE", DiscountType::Percentage, 10);
    store.data().coupons[0].usage_limit = Some(1);

    let mut s = submission(address.id);
    s.coupon_code = Some("ONCE".into());
    let first = run(&store, Some(&user), s).await.unwrap();
    assert_eq!(first.order.total, Decimal::new(180, 0));
    assert!(first.step("redeem_coupon").is_some_and(|s| s.ok));

    put_in_cart(&store, user.user_id, p.id, 1);
    let mut s = submission(address.id);
    s.coupon_code = Some("once".into());
    let err = run(&store, Some(&user), s).await.unwrap_err();
    assert_eq!(err.field_issues("coupon_code"), Some(&["coupon usage limit reached".to_string()][..]));
    assert_eq!(store.data().orders.len(), 1);
    assert_eq!(store.product(p.id).unwrap().stock, 3);
}

#[tokio::test]
async fn inline_shipping_address_is_saved_first() {
    let store = MemoryStore::new();
    let user = seed_user(&store, Role::Customer);
    let p = seed_product(&store, product(100, 0, 2));
    put_in_cart(&store, user.user_id, p.id, 1);

    let mut s = submission(Uuid::nil());
    s.shipping = ShippingSection { id: None, address: Some(address_input("Karim Ahmed")) };
    s.payment.method = Some("bkash".into());
    let receipt = run(&store, Some(&user), s).await.unwrap();

    let saved = store.addresses_of(user.user_id);
    assert_eq!(saved.len(), 1);
    assert!(saved[0].is_default);
    assert_eq!(receipt.order.shipping_address_id, saved[0].id);
    assert_eq!(receipt.order.payment_status, PaymentStatus::Pending);
    assert!(receipt.step("save_shipping_address").is_some_and(|s| s.ok));
}

#[tokio::test]
async fn declined_payment_cancels_the_order() {
    let store = MemoryStore::new();
    let user = seed_user(&store, Role::Customer);
    let address = seed_address(&store, user.user_id, true);
    let p = seed_product(&store, product(100, 0, 5));
    put_in_cart(&store, user.user_id, p.id, 2);

    let err = run_with(&store, &DecliningGateway, Some(&user), submission(address.id)).await.unwrap_err();
    assert!(matches!(err, EcommerceError::Unexpected(_)), "{err:?}");

    let data = store.data();
    assert_eq!(data.orders.len(), 1);
    let order = &data.orders[0];
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.payment_status, PaymentStatus::Failed);
    assert_eq!(order.status_history.len(), 2);
    assert_eq!(order.status_history[1].status, OrderStatus::Cancelled);
    assert_eq!(order.status_history[1].notes.as_deref(), Some("payment initiation failed"));
    assert_eq!(data.products[0].stock, 5, "stock is only taken after payment starts");
    assert_eq!(data.carts[&user.user_id].len(), 1);
    assert!(data.order_history.is_empty());
}

#[tokio::test]
async fn failed_follow_up_steps_do_not_undo_the_order() {
    let store = MemoryStore::new();
    let user = seed_user(&store, Role::Customer);
    let address = seed_address(&store, user.user_id, true);
    let p = seed_product(&store, product(100, 0, 5));
    put_in_cart(&store, user.user_id, p.id, 1);
    store.fail_on("find_user");
    store.fail_on("append_order_history");

    let receipt = run(&store, Some(&user), submission(address.id)).await.unwrap();

    let confirmation = receipt.step("send_confirmation").unwrap();
    assert!(!confirmation.ok);
    assert_eq!(confirmation.detail.as_deref(), Some("unexpected error: find_user: connection reset"));
    assert!(!receipt.step("append_order_history").unwrap().ok);
    assert!(!receipt.all_ok());
    assert!(receipt.step("clear_cart").unwrap().ok);

    let stored = store.order(receipt.order.id).unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(stored.payment_status, PaymentStatus::CollectOnDelivery);
    assert_eq!(store.product(p.id).unwrap().stock, 4);
}

#[tokio::test]
async fn failed_order_write_stops_checkout() {
    let store = MemoryStore::new();
    let user = seed_user(&store, Role::Customer);
    let address = seed_address(&store, user.user_id, true);
    let p = seed_product(&store, product(100, 0, 5));
    put_in_cart(&store, user.user_id, p.id, 1);
    store.fail_on("insert_order");

    assert!(run(&store, Some(&user), submission(address.id)).await.is_err());
    assert!(store.data().orders.is_empty());
    assert_eq!(store.product(p.id).unwrap().stock, 5);
}
