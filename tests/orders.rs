mod common;

use uuid::Uuid;

use common::*;
use storefront::domain::aggregates::{
    price_cart, CartLine, DeliveryMethod, Order, OrderStatus, OrderUpdate, PaymentMethod, Role,
};
use storefront::domain::value_objects::Quantity;
use storefront::error::EcommerceError;
use storefront::notify::Notifier;
use storefront::services::orders::{self, OrderQuery};
use storefront::services::Caller;
use storefront::store::OrderRepository;

async fn seed_order(store: &MemoryStore, user: &Caller) -> Order {
    let address = seed_address(store, user.user_id, true);
    let p = seed_product(store, product(120, 25, 10));
    let lines = [CartLine { product_id: p.id, quantity: Quantity::new(2).unwrap() }];
    let priced = price_cart(&lines, &[p]);
    let order = Order::place(
        user.user_id,
        &priced,
        (address.id, address.id),
        PaymentMethod::Card,
        DeliveryMethod::Standard,
        None,
    );
    store.insert_order(&order).await.unwrap();
    order
}

fn status(s: &str) -> OrderUpdate {
    OrderUpdate { status: Some(s.into()), ..OrderUpdate::default() }
}

#[tokio::test]
async fn status_update_appends_exactly_one_entry() {
    let store = MemoryStore::new();
    let admin = seed_user(&store, Role::Admin);
    let customer = seed_user(&store, Role::Customer);
    let order = seed_order(&store, &customer).await;
    let notifier = Notifier::disabled();

    let mut update = status("confirmed");
    update.admin_notes = Some("payment verified".into());
    let detail = orders::update(&store, &notifier, Some(&admin), order.id, update).await.unwrap();

    assert_eq!(detail.order.status, OrderStatus::Confirmed);
    assert_eq!(detail.order.status_history.len(), 2);
    let entry = detail.order.status_history.last().unwrap();
    assert_eq!(entry.status, OrderStatus::Confirmed);
    assert_eq!(entry.actor, admin.user_id);
    assert_eq!(entry.notes.as_deref(), Some("payment verified"));
    assert_eq!(detail.customer.as_ref().map(|c| c.id), Some(customer.user_id));
    assert!(detail.shipping_address.is_some());
}

#[tokio::test]
async fn updates_without_status_leave_history_alone() {
    let store = MemoryStore::new();
    let admin = seed_user(&store, Role::Admin);
    let customer = seed_user(&store, Role::Customer);
    let order = seed_order(&store, &customer).await;
    let notifier = Notifier::disabled();

    let tracking = OrderUpdate { tracking_number: Some("TRK-1".into()), ..OrderUpdate::default() };
    let detail = orders::update(&store, &notifier, Some(&admin), order.id, tracking).await.unwrap();
    assert_eq!(detail.order.status_history.len(), 1);
    assert_eq!(detail.order.tracking_number.as_deref(), Some("TRK-1"));

    let notes = OrderUpdate { admin_notes: Some("fragile".into()), ..OrderUpdate::default() };
    let detail = orders::update(&store, &notifier, Some(&admin), order.id, notes).await.unwrap();
    assert_eq!(detail.order.status_history.len(), 1);
    assert_eq!(detail.order.tracking_number.as_deref(), Some("TRK-1"), "omitted fields are untouched");
    assert_eq!(detail.order.admin_notes.as_deref(), Some("fragile"));
}

#[tokio::test]
async fn history_grows_monotonically_through_the_lifecycle() {
    let store = MemoryStore::new();
    let admin = seed_user(&store, Role::Admin);
    let customer = seed_user(&store, Role::Customer);
    let order = seed_order(&store, &customer).await;
    let notifier = Notifier::disabled();

    let mut previous = 1;
    for next in ["confirmed", "confirmed", "shipped", "delivered"] {
        let detail = orders::update(&store, &notifier, Some(&admin), order.id, status(next)).await.unwrap();
        assert_eq!(detail.order.status_history.len(), previous + 1);
        previous = detail.order.status_history.len();
    }
    assert_eq!(store.order(order.id).unwrap().status, OrderStatus::Delivered);
}

#[tokio::test]
async fn illegal_transition_is_a_conflict() {
    let store = MemoryStore::new();
    let admin = seed_user(&store, Role::Admin);
    let customer = seed_user(&store, Role::Customer);
    let order = seed_order(&store, &customer).await;
    let notifier = Notifier::disabled();

    let err = orders::update(&store, &notifier, Some(&admin), order.id, status("delivered")).await.unwrap_err();
    assert!(matches!(err, EcommerceError::Conflict(_)));
    assert_eq!(store.order(order.id).unwrap().status_history.len(), 1);

    let err = orders::update(&store, &notifier, Some(&admin), order.id, status("lost")).await.unwrap_err();
    assert!(err.field_issues("status").is_some());
}

#[tokio::test]
async fn only_admins_may_update() {
    let store = MemoryStore::new();
    let customer = seed_user(&store, Role::Customer);
    let order = seed_order(&store, &customer).await;
    let notifier = Notifier::disabled();

    let err = orders::update(&store, &notifier, Some(&customer), order.id, status("confirmed")).await.unwrap_err();
    assert!(matches!(err, EcommerceError::Unauthorized(_)));
    let err = orders::update(&store, &notifier, None, order.id, status("confirmed")).await.unwrap_err();
    assert!(matches!(err, EcommerceError::Unauthorized(_)));
}

#[tokio::test]
async fn missing_order_is_not_found() {
    let store = MemoryStore::new();
    let admin = seed_user(&store, Role::Admin);
    let err = orders::update(&store, &Notifier::disabled(), Some(&admin), Uuid::new_v4(), status("confirmed"))
        .await
        .unwrap_err();
    assert!(matches!(err, EcommerceError::NotFound { entity: "order" }));
}

#[tokio::test]
async fn listing_is_scoped_to_the_owner() {
    let store = MemoryStore::new();
    let admin = seed_user(&store, Role::Admin);
    let alice = seed_user(&store, Role::Customer);
    let bob = seed_user(&store, Role::Customer);
    let alices = seed_order(&store, &alice).await;
    let bobs = seed_order(&store, &bob).await;

    let page = orders::list(&store, &alice, OrderQuery::default()).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, alices.id);

    let page = orders::list(&store, &admin, OrderQuery::default()).await.unwrap();
    assert_eq!(page.total, 2);

    let query = OrderQuery { status: Some("cancelled".into()), ..OrderQuery::default() };
    assert_eq!(orders::list(&store, &admin, query).await.unwrap().total, 0);

    let err = orders::get(&store, &alice, bobs.id).await.unwrap_err();
    assert!(matches!(err, EcommerceError::NotFound { .. }));
    assert!(orders::get(&store, &admin, bobs.id).await.is_ok());
}

#[tokio::test]
async fn customer_can_cancel_only_pending_orders() {
    let store = MemoryStore::new();
    let admin = seed_user(&store, Role::Admin);
    let customer = seed_user(&store, Role::Customer);
    let notifier = Notifier::disabled();
    let pending = seed_order(&store, &customer).await;
    let confirmed = seed_order(&store, &customer).await;
    orders::update(&store, &notifier, Some(&admin), confirmed.id, status("confirmed")).await.unwrap();

    let cancelled = orders::cancel(&store, &notifier, Some(&customer), pending.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.status_history.len(), 2);
    assert_eq!(cancelled.status_history[1].actor, customer.user_id);

    let err = orders::cancel(&store, &notifier, Some(&customer), confirmed.id).await.unwrap_err();
    assert!(matches!(err, EcommerceError::Conflict(_)));
    let err = orders::cancel(&store, &notifier, Some(&customer), pending.id).await.unwrap_err();
    match err {
        EcommerceError::Conflict(message) => assert_eq!(message, "a cancelled order can no longer be cancelled"),
        other => panic!("expected conflict, got {other:?}"),
    }
    assert_eq!(store.order(pending.id).unwrap().status_history.len(), 2);

    let stranger = seed_user(&store, Role::Customer);
    let err = orders::cancel(&store, &notifier, Some(&stranger), confirmed.id).await.unwrap_err();
    assert!(matches!(err, EcommerceError::NotFound { .. }));
}
