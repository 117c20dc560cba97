//! Repository traits for data access.
//!
//! All operations are async. Services are generic over these traits so the
//! Postgres store can be swapped for another implementation in tests.

pub mod postgres;

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::{
    Address, AuthRecord, CartLine, Category, Coupon, Order, OrderChanges, OrderStatus, Product,
    ProductFilter, SavedPaymentMethod, Session, User,
};
use crate::error::Result;

pub use postgres::PgStore;

/// Page/limit pagination as accepted on query strings.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 { 1 }
fn default_limit() -> u32 { 20 }

impl Default for PageRequest {
    fn default() -> Self { Self { page: default_page(), limit: default_limit() } }
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self { Self { page, limit } }

    /// Page clamped to >= 1, limit clamped to 1..=100.
    pub fn normalized(self) -> Self {
        Self { page: self.page.max(1), limit: self.limit.clamp(1, 100) }
    }

    pub fn offset(&self) -> i64 {
        let n = self.normalized();
        i64::from(n.page - 1) * i64::from(n.limit)
    }

    pub fn limit(&self) -> i64 { i64::from(self.normalized().limit) }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        let request = request.normalized();
        Self { items, total, page: request.page, limit: request.limit }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page { items: self.items.into_iter().map(f).collect(), total: self.total, page: self.page, limit: self.limit }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrderFilter {
    pub user_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub trait CategoryRepository: Send + Sync {
    fn find_category(&self, id: Uuid) -> impl Future<Output = Result<Option<Category>>> + Send;
    fn find_category_by_slug(&self, slug: &str) -> impl Future<Output = Result<Option<Category>>> + Send;
    fn list_categories(&self) -> impl Future<Output = Result<Vec<Category>>> + Send;
    fn insert_category(&self, category: &Category) -> impl Future<Output = Result<()>> + Send;
    fn update_category(&self, category: &Category) -> impl Future<Output = Result<()>> + Send;
    fn delete_category(&self, id: Uuid) -> impl Future<Output = Result<bool>> + Send;
    /// Number of products that reference the category.
    fn count_products_in_category(&self, id: Uuid) -> impl Future<Output = Result<i64>> + Send;
}

pub trait ProductRepository: Send + Sync {
    fn find_product(&self, id: Uuid) -> impl Future<Output = Result<Option<Product>>> + Send;
    fn find_product_by_slug(&self, slug: &str) -> impl Future<Output = Result<Option<Product>>> + Send;
    /// Products with the given ids, in no particular order. Unknown ids are skipped.
    fn find_products(&self, ids: &[Uuid]) -> impl Future<Output = Result<Vec<Product>>> + Send;
    fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> impl Future<Output = Result<Page<Product>>> + Send;
    fn insert_product(&self, product: &Product) -> impl Future<Output = Result<()>> + Send;
    fn update_product(&self, product: &Product) -> impl Future<Output = Result<()>> + Send;
    fn delete_product(&self, id: Uuid) -> impl Future<Output = Result<bool>> + Send;
    /// Atomically takes `quantity` from stock. Returns the remaining stock, or
    /// `None` when the product is missing or has too little stock.
    fn decrement_stock(&self, id: Uuid, quantity: i32) -> impl Future<Output = Result<Option<i32>>> + Send;
}

// ---------------------------------------------------------------------------
// Cart & orders
// ---------------------------------------------------------------------------

pub trait CartRepository: Send + Sync {
    /// Cart lines in insertion order; an absent cart is empty.
    fn load_cart(&self, user_id: Uuid) -> impl Future<Output = Result<Vec<CartLine>>> + Send;
    /// Inserts the line or replaces its quantity, keeping its position.
    fn put_cart_line(&self, user_id: Uuid, line: &CartLine) -> impl Future<Output = Result<()>> + Send;
    fn remove_cart_line(&self, user_id: Uuid, product_id: Uuid) -> impl Future<Output = Result<bool>> + Send;
    fn clear_cart(&self, user_id: Uuid) -> impl Future<Output = Result<()>> + Send;
}

pub trait OrderRepository: Send + Sync {
    fn insert_order(&self, order: &Order) -> impl Future<Output = Result<()>> + Send;
    fn find_order(&self, id: Uuid) -> impl Future<Output = Result<Option<Order>>> + Send;
    fn list_orders(&self, filter: OrderFilter, page: PageRequest) -> impl Future<Output = Result<Page<Order>>> + Send;
    /// Merges the given fields and appends the history entry, if any, in one write.
    /// Returns the updated order, or `None` when it does not exist.
    fn apply_order_changes(&self, id: Uuid, changes: &OrderChanges) -> impl Future<Output = Result<Option<Order>>> + Send;
}

// ---------------------------------------------------------------------------
// Addresses, coupons, accounts
// ---------------------------------------------------------------------------

pub trait AddressRepository: Send + Sync {
    /// Newest first.
    fn list_addresses(&self, user_id: Uuid) -> impl Future<Output = Result<Vec<Address>>> + Send;
    fn find_address(&self, id: Uuid) -> impl Future<Output = Result<Option<Address>>> + Send;
    fn insert_address(&self, address: &Address) -> impl Future<Output = Result<()>> + Send;
    fn update_address(&self, address: &Address) -> impl Future<Output = Result<()>> + Send;
    fn delete_address(&self, user_id: Uuid, id: Uuid) -> impl Future<Output = Result<bool>> + Send;
    /// Makes `id` the only default address of `user_id` in a single write.
    fn set_default_address(&self, user_id: Uuid, id: Uuid) -> impl Future<Output = Result<bool>> + Send;
}

pub trait CouponRepository: Send + Sync {
    /// Looks up an already-normalised code.
    fn find_coupon(&self, code: &str) -> impl Future<Output = Result<Option<Coupon>>> + Send;
    /// Counts one use if the limit allows it. Returns whether a use was counted.
    fn redeem_coupon(&self, code: &str) -> impl Future<Output = Result<bool>> + Send;
}

pub trait AccountRepository: Send + Sync {
    fn find_user(&self, id: Uuid) -> impl Future<Output = Result<Option<User>>> + Send;
    fn find_user_by_email(&self, email: &str) -> impl Future<Output = Result<Option<(User, AuthRecord)>>> + Send;
    fn find_auth_by_token(&self, token: &str) -> impl Future<Output = Result<Option<AuthRecord>>> + Send;
    fn insert_user(&self, user: &User, auth: &AuthRecord) -> impl Future<Output = Result<()>> + Send;
    fn update_auth(&self, auth: &AuthRecord) -> impl Future<Output = Result<()>> + Send;
    fn insert_session(&self, session: &Session) -> impl Future<Output = Result<()>> + Send;
    fn find_session(&self, token_hash: &str) -> impl Future<Output = Result<Option<Session>>> + Send;
    fn append_order_history(&self, user_id: Uuid, order_id: Uuid) -> impl Future<Output = Result<()>> + Send;
    fn insert_payment_method(&self, method: &SavedPaymentMethod) -> impl Future<Output = Result<()>> + Send;
}

pub trait HealthCheck: Send + Sync {
    /// Succeeds when the backing storage answers.
    fn health_check(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Everything the HTTP layer needs from storage.
pub trait Store:
    HealthCheck
    + CategoryRepository
    + ProductRepository
    + CartRepository
    + OrderRepository
    + AddressRepository
    + CouponRepository
    + AccountRepository
    + Clone
    + 'static
{
}

impl<T> Store for T where
    T: HealthCheck
        + CategoryRepository
        + ProductRepository
        + CartRepository
        + OrderRepository
        + AddressRepository
        + CouponRepository
        + AccountRepository
        + Clone
        + 'static
{
}
