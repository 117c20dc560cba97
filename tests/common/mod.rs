#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use storefront::api::{build_app, AppState};
use storefront::assets::AssetStore;
use storefront::domain::aggregates::{
    Address, AddressInput, AuthRecord, CartLine, Category, Coupon, DiscountType, Order, OrderChanges, Product,
    PaymentStatus, ProductFilter, ProductImage, Role, SavedPaymentMethod, Session, User,
};
use storefront::domain::value_objects::{Percent, Quantity, Slug};
use storefront::error::{EcommerceError, Result};
use storefront::notify::Notifier;
use storefront::payment::PaymentGateway;
use storefront::services::accounts::hash_token;
use storefront::services::Caller;
use storefront::store::{
    AccountRepository, AddressRepository, CartRepository, CategoryRepository, CouponRepository, HealthCheck,
    OrderFilter, OrderRepository, Page, PageRequest, ProductRepository,
};

#[derive(Default)]
pub struct Data {
    pub categories: Vec<Category>,
    pub products: Vec<Product>,
    pub carts: HashMap<Uuid, Vec<CartLine>>,
    pub orders: Vec<Order>,
    pub addresses: Vec<Address>,
    pub coupons: Vec<Coupon>,
    pub users: Vec<User>,
    pub auth: HashMap<Uuid, AuthRecord>,
    pub sessions: Vec<Session>,
    pub order_history: Vec<(Uuid, Uuid)>,
    pub payment_methods: Vec<SavedPaymentMethod>,
    /// Repository operations that fail with `Unexpected` until cleared.
    pub failing: HashSet<&'static str>,
}

/// In-memory repository with the same observable behaviour as the Postgres store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<Data>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn data(&self) -> MutexGuard<'_, Data> { self.data.lock().expect("store lock") }

    pub fn fail_on(&self, operation: &'static str) { self.data().failing.insert(operation); }

    fn check(&self, operation: &'static str) -> Result<()> {
        if self.data().failing.contains(operation) {
            return Err(EcommerceError::Unexpected(format!("{operation}: connection reset")));
        }
        Ok(())
    }

    pub fn order(&self, id: Uuid) -> Option<Order> { self.data().orders.iter().find(|o| o.id == id).cloned() }

    pub fn product(&self, id: Uuid) -> Option<Product> { self.data().products.iter().find(|p| p.id == id).cloned() }

    pub fn auth_for(&self, user_id: Uuid) -> Option<AuthRecord> { self.data().auth.get(&user_id).cloned() }

    pub fn addresses_of(&self, user_id: Uuid) -> Vec<Address> {
        self.data().addresses.iter().filter(|a| a.user_id == user_id).cloned().collect()
    }
}

impl HealthCheck for MemoryStore {
    async fn health_check(&self) -> Result<()> { Ok(()) }
}

impl CategoryRepository for MemoryStore {
    async fn find_category(&self, id: Uuid) -> Result<Option<Category>> {
        Ok(self.data().categories.iter().find(|c| c.id == id).cloned())
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        Ok(self.data().categories.iter().find(|c| c.slug.as_str() == slug).cloned())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let mut categories = self.data().categories.clone();
        categories.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
        Ok(categories)
    }

    async fn insert_category(&self, category: &Category) -> Result<()> {
        let mut data = self.data();
        if data.categories.iter().any(|c| c.slug == category.slug) {
            return Err(EcommerceError::Conflict("categories_slug_key".into()));
        }
        data.categories.push(category.clone());
        Ok(())
    }

    async fn update_category(&self, category: &Category) -> Result<()> {
        let mut data = self.data();
        if let Some(existing) = data.categories.iter_mut().find(|c| c.id == category.id) {
            *existing = category.clone();
        }
        Ok(())
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool> {
        let mut data = self.data();
        if data.products.iter().any(|p| p.category_id == Some(id)) {
            return Err(EcommerceError::Conflict("record is still referenced".into()));
        }
        let before = data.categories.len();
        data.categories.retain(|c| c.id != id);
        for child in data.categories.iter_mut().filter(|c| c.parent_id == Some(id)) {
            child.parent_id = None;
        }
        Ok(data.categories.len() < before)
    }

    async fn count_products_in_category(&self, id: Uuid) -> Result<i64> {
        Ok(self.data().products.iter().filter(|p| p.category_id == Some(id)).count() as i64)
    }
}

impl ProductRepository for MemoryStore {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> { Ok(self.product(id)) }

    async fn find_product_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        Ok(self.data().products.iter().find(|p| p.slug.as_str() == slug).cloned())
    }

    async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        Ok(self.data().products.iter().filter(|p| ids.contains(&p.id)).cloned().collect())
    }

    async fn list_products(&self, filter: &ProductFilter, page: PageRequest) -> Result<Page<Product>> {
        let search = filter.search.as_deref().map(str::to_lowercase);
        let matching: Vec<Product> = self
            .data()
            .products
            .iter()
            .rev()
            .filter(|p| filter.include_inactive || p.is_active)
            .filter(|p| filter.category_id.map_or(true, |c| p.category_id == Some(c)))
            .filter(|p| search.as_deref().map_or(true, |s| p.name.to_lowercase().contains(s)))
            .cloned()
            .collect();
        let total = matching.len() as i64;
        let items = matching.into_iter().skip(page.offset() as usize).take(page.limit() as usize).collect();
        Ok(Page::new(items, total, page))
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut data = self.data();
        if data.products.iter().any(|p| p.slug == product.slug) {
            return Err(EcommerceError::Conflict("products_slug_key".into()));
        }
        data.products.push(product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        let mut data = self.data();
        if let Some(existing) = data.products.iter_mut().find(|p| p.id == product.id) {
            *existing = product.clone();
        }
        Ok(())
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool> {
        let mut data = self.data();
        let before = data.products.len();
        data.products.retain(|p| p.id != id);
        Ok(data.products.len() < before)
    }

    async fn decrement_stock(&self, id: Uuid, quantity: i32) -> Result<Option<i32>> {
        let mut data = self.data();
        Ok(data.products.iter_mut().find(|p| p.id == id && p.stock >= quantity).map(|p| {
            p.stock -= quantity;
            p.stock
        }))
    }
}

impl CartRepository for MemoryStore {
    async fn load_cart(&self, user_id: Uuid) -> Result<Vec<CartLine>> {
        Ok(self.data().carts.get(&user_id).cloned().unwrap_or_default())
    }

    async fn put_cart_line(&self, user_id: Uuid, line: &CartLine) -> Result<()> {
        let mut data = self.data();
        let lines = data.carts.entry(user_id).or_default();
        match lines.iter_mut().find(|l| l.product_id == line.product_id) {
            Some(existing) => existing.quantity = line.quantity,
            None => lines.push(line.clone()),
        }
        Ok(())
    }

    async fn remove_cart_line(&self, user_id: Uuid, product_id: Uuid) -> Result<bool> {
        let mut data = self.data();
        let Some(lines) = data.carts.get_mut(&user_id) else { return Ok(false) };
        let before = lines.len();
        lines.retain(|l| l.product_id != product_id);
        Ok(lines.len() < before)
    }

    async fn clear_cart(&self, user_id: Uuid) -> Result<()> {
        self.check("clear_cart")?;
        self.data().carts.remove(&user_id);
        Ok(())
    }
}

impl OrderRepository for MemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        self.check("insert_order")?;
        self.data().orders.push(order.clone());
        Ok(())
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> { Ok(self.order(id)) }

    async fn list_orders(&self, filter: OrderFilter, page: PageRequest) -> Result<Page<Order>> {
        let matching: Vec<Order> = self
            .data()
            .orders
            .iter()
            .rev()
            .filter(|o| filter.user_id.map_or(true, |u| o.user_id == u))
            .filter(|o| filter.status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        let total = matching.len() as i64;
        let items = matching.into_iter().skip(page.offset() as usize).take(page.limit() as usize).collect();
        Ok(Page::new(items, total, page))
    }

    async fn apply_order_changes(&self, id: Uuid, changes: &OrderChanges) -> Result<Option<Order>> {
        let mut data = self.data();
        Ok(data.orders.iter_mut().find(|o| o.id == id).map(|order| {
            order.apply(changes);
            order.clone()
        }))
    }
}

impl AddressRepository for MemoryStore {
    async fn list_addresses(&self, user_id: Uuid) -> Result<Vec<Address>> {
        Ok(self.data().addresses.iter().rev().filter(|a| a.user_id == user_id).cloned().collect())
    }

    async fn find_address(&self, id: Uuid) -> Result<Option<Address>> {
        Ok(self.data().addresses.iter().find(|a| a.id == id).cloned())
    }

    async fn insert_address(&self, address: &Address) -> Result<()> {
        let mut data = self.data();
        if address.is_default {
            for other in data.addresses.iter_mut().filter(|a| a.user_id == address.user_id) {
                other.is_default = false;
            }
        }
        data.addresses.push(address.clone());
        Ok(())
    }

    async fn update_address(&self, address: &Address) -> Result<()> {
        let mut data = self.data();
        for existing in data.addresses.iter_mut().filter(|a| a.user_id == address.user_id) {
            if existing.id == address.id {
                *existing = address.clone();
            } else if address.is_default {
                existing.is_default = false;
            }
        }
        Ok(())
    }

    async fn delete_address(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let mut data = self.data();
        let before = data.addresses.len();
        data.addresses.retain(|a| !(a.user_id == user_id && a.id == id));
        Ok(data.addresses.len() < before)
    }

    async fn set_default_address(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let mut data = self.data();
        if !data.addresses.iter().any(|a| a.user_id == user_id && a.id == id) {
            return Ok(false);
        }
        for address in data.addresses.iter_mut().filter(|a| a.user_id == user_id) {
            address.is_default = address.id == id;
        }
        Ok(true)
    }
}

impl CouponRepository for MemoryStore {
    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>> {
        Ok(self.data().coupons.iter().find(|c| c.code == code).cloned())
    }

    async fn redeem_coupon(&self, code: &str) -> Result<bool> {
        let mut data = self.data();
        let Some(coupon) = data.coupons.iter_mut().find(|c| c.code == code) else { return Ok(false) };
        if coupon.usage_limit.is_some_and(|limit| coupon.used_count >= limit) {
            return Ok(false);
        }
        coupon.used_count += 1;
        Ok(true)
    }
}

impl AccountRepository for MemoryStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        self.check("find_user")?;
        Ok(self.data().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<(User, AuthRecord)>> {
        let data = self.data();
        let Some(user) = data.users.iter().find(|u| u.email.eq_ignore_ascii_case(email)) else { return Ok(None) };
        Ok(data.auth.get(&user.id).map(|auth| (user.clone(), auth.clone())))
    }

    async fn find_auth_by_token(&self, token: &str) -> Result<Option<AuthRecord>> {
        Ok(self.data().auth.values().find(|a| a.verification_token.as_deref() == Some(token)).cloned())
    }

    async fn insert_user(&self, user: &User, auth: &AuthRecord) -> Result<()> {
        let mut data = self.data();
        if data.users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(EcommerceError::Conflict("users_email_key".into()));
        }
        data.users.push(user.clone());
        data.auth.insert(user.id, auth.clone());
        Ok(())
    }

    async fn update_auth(&self, auth: &AuthRecord) -> Result<()> {
        self.data().auth.insert(auth.user_id, auth.clone());
        Ok(())
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        self.data().sessions.push(session.clone());
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>> {
        Ok(self.data().sessions.iter().find(|s| s.token_hash == token_hash).cloned())
    }

    async fn append_order_history(&self, user_id: Uuid, order_id: Uuid) -> Result<()> {
        self.check("append_order_history")?;
        self.data().order_history.push((user_id, order_id));
        Ok(())
    }

    async fn insert_payment_method(&self, method: &SavedPaymentMethod) -> Result<()> {
        self.data().payment_methods.push(method.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

pub fn seed_user(store: &MemoryStore, role: Role) -> Caller {
    let user = User {
        id: Uuid::now_v7(),
        name: "Test User".into(),
        email: format!("{}@example.com", Uuid::new_v4().simple()),
        role,
        created_at: Utc::now(),
    };
    let auth = AuthRecord {
        user_id: user.id,
        password_hash: String::new(),
        email_verified: true,
        verification_token: None,
        verification_expires_at: None,
        verification_attempts: 1,
    };
    let caller = Caller { user_id: user.id, role };
    let mut data = store.data();
    data.users.push(user);
    data.auth.insert(caller.user_id, auth);
    caller
}

/// Issues a bearer token for `caller`.
pub fn session_for(store: &MemoryStore, caller: &Caller) -> String {
    let token = format!("token-{}", Uuid::new_v4().simple());
    store.data().sessions.push(Session {
        token_hash: hash_token(&token),
        user_id: caller.user_id,
        expires_at: Utc::now() + Duration::hours(1),
    });
    token
}

pub fn seed_category(store: &MemoryStore, slug: &str) -> Category {
    let now = Utc::now();
    let category = Category {
        id: Uuid::now_v7(),
        name: slug.replace('-', " "),
        slug: Slug::new(slug).expect("valid slug"),
        parent_id: None,
        description: None,
        image: None,
        sort_order: 0,
        created_at: now,
        updated_at: now,
    };
    store.data().categories.push(category.clone());
    category
}

pub fn product(price: i64, discount: i64, stock: i32) -> Product {
    let now = Utc::now();
    let id = Uuid::now_v7();
    Product {
        id,
        name: format!("Product {}", &id.simple().to_string()[..8]),
        slug: Slug::new(format!("product-{}", id.simple())).expect("valid slug"),
        price: Decimal::new(price, 0),
        discount_percent: Percent::new(Decimal::new(discount, 0)).expect("valid percent"),
        category_id: None,
        stock,
        is_active: true,
        images: Vec::new(),
        short_description: None,
        description: None,
        tags: Vec::new(),
        specifications: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

pub fn seed_product(store: &MemoryStore, product: Product) -> Product {
    store.data().products.push(product.clone());
    product
}

pub fn put_in_cart(store: &MemoryStore, user_id: Uuid, product_id: Uuid, quantity: i32) {
    let line = CartLine { product_id, quantity: Quantity::new(quantity).expect("positive quantity") };
    store.data().carts.entry(user_id).or_default().push(line);
}

pub fn image(url: &str) -> ProductImage {
    ProductImage { url: url.into(), alt: None, is_primary: false }
}

pub fn address_input(full_name: &str) -> AddressInput {
    AddressInput {
        full_name: full_name.into(),
        phone: "01712345678".into(),
        address_line1: "House 12, Road 5, Dhanmondi".into(),
        address_line2: None,
        city: "Dhaka".into(),
        district: "Dhaka".into(),
        postal_code: "1209".into(),
        country: "Bangladesh".into(),
        is_default: false,
    }
}

pub fn seed_address(store: &MemoryStore, user_id: Uuid, is_default: bool) -> Address {
    let mut address = Address::new(user_id, address_input("Rahim Uddin"));
    address.is_default = is_default;
    store.data().addresses.push(address.clone());
    address
}

pub fn seed_coupon(store: &MemoryStore, code: &str, kind: DiscountType, value: i64) -> Coupon {
    let now = Utc::now();
    let coupon = Coupon {
        id: Uuid::now_v7(),
        code: code.into(),
        discount_type: kind,
        discount_value: Decimal::new(value, 0),
        min_order_amount: None,
        valid_from: now - Duration::days(1),
        valid_until: now + Duration::days(1),
        usage_limit: Some(10),
        used_count: 0,
        is_active: true,
    };
    store.data().coupons.push(coupon.clone());
    coupon
}

pub fn app_state(store: &MemoryStore, asset_root: &std::path::Path) -> AppState<MemoryStore> {
    AppState::new(store.clone(), AssetStore::new(asset_root, "/uploads"), Notifier::disabled())
}

pub fn app(store: &MemoryStore, asset_root: &std::path::Path) -> axum::Router {
    build_app(app_state(store, asset_root))
}

/// Payment provider that refuses every order.
pub struct DecliningGateway;

impl PaymentGateway for DecliningGateway {
    async fn initiate(&self, order: &Order) -> Result<PaymentStatus> {
        Err(EcommerceError::Unexpected(format!("provider declined {}", order.order_number)))
    }
}
