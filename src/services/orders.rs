//! Order queries and the status lifecycle.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{admin, authenticated, Caller};
use crate::domain::aggregates::{Address, CustomerSummary, Order, OrderChanges, OrderStatus, OrderUpdate};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::error::{EcommerceError, Result};
use crate::notify::{Notification, Notifier};
use crate::store::{AccountRepository, AddressRepository, OrderFilter, OrderRepository, Page, PageRequest};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
}

impl OrderQuery {
    fn page_request(&self) -> PageRequest {
        let defaults = PageRequest::default();
        PageRequest::new(self.page.unwrap_or(defaults.page), self.limit.unwrap_or(defaults.limit))
    }
}

/// An order joined with its customer and addresses for display.
#[derive(Clone, Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub customer: Option<CustomerSummary>,
    pub shipping_address: Option<Address>,
    pub billing_address: Option<Address>,
}

fn parse_status(raw: &str) -> Result<OrderStatus> {
    raw.trim()
        .parse::<OrderStatus>()
        .map_err(|e| EcommerceError::invalid("status", e.to_string()))
}

/// Customers see their own orders, admins see all of them.
pub async fn list<S>(store: &S, caller: &Caller, query: OrderQuery) -> Result<Page<Order>>
where
    S: OrderRepository,
{
    let status = query.status.as_deref().filter(|s| !s.trim().is_empty()).map(parse_status).transpose()?;
    let filter = OrderFilter { user_id: (!caller.is_admin()).then_some(caller.user_id), status };
    store.list_orders(filter, query.page_request()).await
}

/// Fetches an order visible to the caller. Orders of other users are reported as missing.
pub async fn get<S>(store: &S, caller: &Caller, id: Uuid) -> Result<OrderDetail>
where
    S: OrderRepository + AccountRepository + AddressRepository,
{
    let order = store
        .find_order(id)
        .await?
        .filter(|o| caller.can_access(o.user_id))
        .ok_or_else(|| EcommerceError::not_found("order"))?;
    detail(store, order).await
}

pub async fn detail<S>(store: &S, order: Order) -> Result<OrderDetail>
where
    S: AccountRepository + AddressRepository,
{
    let (user, shipping_address, billing_address) = tokio::try_join!(
        store.find_user(order.user_id),
        store.find_address(order.shipping_address_id),
        store.find_address(order.billing_address_id),
    )?;
    Ok(OrderDetail { customer: user.as_ref().map(CustomerSummary::from), order, shipping_address, billing_address })
}

/// Admin update. Only supplied fields change; a supplied status must be a
/// legal transition and appends exactly one history entry.
pub async fn update<S>(
    store: &S,
    notifier: &Notifier,
    caller: Option<&Caller>,
    id: Uuid,
    input: OrderUpdate,
) -> Result<OrderDetail>
where
    S: OrderRepository + AccountRepository + AddressRepository,
{
    let actor = admin(caller)?.user_id;
    input.validate()?;
    let next = input.status.as_deref().map(parse_status).transpose()?;

    let current = store.find_order(id).await?.ok_or_else(|| EcommerceError::not_found("order"))?;
    let mut changes = match next {
        Some(status) => {
            ensure_transition(current.status, status)?;
            OrderChanges::transition(status, actor, input.admin_notes.clone())
        }
        None => OrderChanges::default(),
    };
    changes.tracking_number = input.tracking_number;
    changes.admin_notes = input.admin_notes;

    let updated = store
        .apply_order_changes(id, &changes)
        .await?
        .ok_or_else(|| EcommerceError::not_found("order"))?;
    tracing::info!(order = %updated.order_number, from = %current.status, to = %updated.status, %actor, "order updated");

    if next.is_some() {
        announce(store, notifier, &current, &updated, actor).await;
    }
    detail(store, updated).await
}

/// Customer cancellation of their own pending order.
pub async fn cancel<S>(store: &S, notifier: &Notifier, caller: Option<&Caller>, id: Uuid) -> Result<Order>
where
    S: OrderRepository + AccountRepository,
{
    let caller = authenticated(caller)?;
    let current = store
        .find_order(id)
        .await?
        .filter(|o| o.user_id == caller.user_id)
        .ok_or_else(|| EcommerceError::not_found("order"))?;
    if current.status != OrderStatus::Pending {
        return Err(EcommerceError::Conflict(format!("a {} order can no longer be cancelled", current.status)));
    }

    let changes = OrderChanges::transition(OrderStatus::Cancelled, caller.user_id, Some("cancelled by customer".to_string()));
    let updated = store
        .apply_order_changes(id, &changes)
        .await?
        .ok_or_else(|| EcommerceError::not_found("order"))?;
    tracing::info!(order = %updated.order_number, user = %caller.user_id, "order cancelled by customer");
    announce(store, notifier, &current, &updated, caller.user_id).await;
    Ok(updated)
}

fn ensure_transition(from: OrderStatus, to: OrderStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(EcommerceError::Conflict(format!("cannot change order status from {from} to {to}")))
    }
}

/// Best-effort event and customer notification for a status write.
async fn announce<S>(store: &S, notifier: &Notifier, before: &Order, after: &Order, actor: Uuid)
where
    S: AccountRepository,
{
    let event = DomainEvent::Order(OrderEvent::StatusChanged { order_id: after.id, from: before.status, to: after.status, actor });
    notifier.publish_quietly(&event).await;

    if before.status == after.status {
        return;
    }
    let user = match store.find_user(after.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => return,
        Err(error) => {
            tracing::warn!(order = %after.order_number, %error, "could not load customer for status e-mail");
            return;
        }
    };
    let message = Notification::OrderStatusUpdate {
        to: user.email,
        order_number: after.order_number.clone(),
        status: after.status.to_string(),
        tracking_number: after.tracking_number.clone(),
    };
    if let Err(error) = notifier.send(&message).await {
        tracing::warn!(order = %after.order_number, %error, "status e-mail not sent");
    }
}
