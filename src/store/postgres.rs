//! Postgres implementation of the repository traits.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    AccountRepository, AddressRepository, CartRepository, CategoryRepository, CouponRepository,
    HealthCheck, OrderFilter, OrderRepository, Page, PageRequest, ProductRepository,
};
use crate::config::AppConfig;
use crate::domain::aggregates::{
    Address, AuthRecord, CartLine, Category, Coupon, Order, OrderChanges, OrderItem, Product,
    ProductFilter, ProductImage, SavedPaymentMethod, Session, Specification, StatusEntry, User,
};
use crate::domain::value_objects::{Percent, Quantity, Slug};
use crate::error::{EcommerceError, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Opens the connection pool. Schema migrations are a separate step, see [`run_migrations`].
pub async fn connect_pool(config: &AppConfig) -> std::result::Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
        .connect(&config.database_url)
        .await
}

/// Applies pending schema migrations.
pub async fn run_migrations(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Sends a `SELECT 1` to verify the pool has a live connection.
pub async fn ping(pool: &PgPool) -> std::result::Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await?;
    Ok(())
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub fn pool(&self) -> &PgPool { &self.pool }
}

fn corrupt(what: &str, detail: impl std::fmt::Display) -> EcommerceError {
    EcommerceError::Unexpected(format!("stored {what} is invalid: {detail}"))
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

const CATEGORY_COLUMNS: &str =
    "id, name, slug, parent_id, description, image, sort_order, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    slug: String,
    parent_id: Option<Uuid>,
    description: Option<String>,
    image: Option<String>,
    sort_order: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CategoryRow> for Category {
    type Error = EcommerceError;
    fn try_from(row: CategoryRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            slug: Slug::new(row.slug).map_err(|e| corrupt("category slug", e))?,
            parent_id: row.parent_id,
            description: row.description,
            image: row.image,
            sort_order: row.sort_order,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const PRODUCT_COLUMNS: &str = "id, name, slug, price, discount_percent, category_id, stock, is_active, images, \
     short_description, description, tags, specifications, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    slug: String,
    price: Decimal,
    discount_percent: Decimal,
    category_id: Option<Uuid>,
    stock: i32,
    is_active: bool,
    images: Json<Vec<ProductImage>>,
    short_description: Option<String>,
    description: Option<String>,
    tags: Vec<String>,
    specifications: Json<Vec<Specification>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = EcommerceError;
    fn try_from(row: ProductRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            slug: Slug::new(row.slug).map_err(|e| corrupt("product slug", e))?,
            price: row.price,
            discount_percent: Percent::new(row.discount_percent).map_err(|e| corrupt("product discount", e))?,
            category_id: row.category_id,
            stock: row.stock,
            is_active: row.is_active,
            images: row.images.0,
            short_description: row.short_description,
            description: row.description,
            tags: row.tags,
            specifications: row.specifications.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, order_number, user_id, items, shipping_address_id, billing_address_id, status, \
     status_history, tracking_number, admin_notes, payment_method, payment_status, delivery_method, coupon_code, \
     subtotal, discount, total, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    user_id: Uuid,
    items: Json<Vec<OrderItem>>,
    shipping_address_id: Uuid,
    billing_address_id: Uuid,
    status: String,
    status_history: Json<Vec<StatusEntry>>,
    tracking_number: Option<String>,
    admin_notes: Option<String>,
    payment_method: String,
    payment_status: String,
    delivery_method: String,
    coupon_code: Option<String>,
    subtotal: Decimal,
    discount: Decimal,
    total: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = EcommerceError;
    fn try_from(row: OrderRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            items: row.items.0,
            shipping_address_id: row.shipping_address_id,
            billing_address_id: row.billing_address_id,
            status: row.status.parse().map_err(|e| corrupt("order status", e))?,
            status_history: row.status_history.0,
            tracking_number: row.tracking_number,
            admin_notes: row.admin_notes,
            payment_method: row.payment_method.parse().map_err(|e| corrupt("payment method", e))?,
            payment_status: row.payment_status.parse().map_err(|e| corrupt("payment status", e))?,
            delivery_method: row.delivery_method.parse().map_err(|e| corrupt("delivery method", e))?,
            coupon_code: row.coupon_code,
            subtotal: row.subtotal,
            discount: row.discount,
            total: row.total,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ADDRESS_COLUMNS: &str = "id, user_id, full_name, phone, address_line1, address_line2, city, district, \
     postal_code, country, is_default, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: Uuid,
    user_id: Uuid,
    full_name: String,
    phone: String,
    address_line1: String,
    address_line2: Option<String>,
    city: String,
    district: String,
    postal_code: String,
    country: String,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            full_name: row.full_name,
            phone: row.phone,
            address_line1: row.address_line1,
            address_line2: row.address_line2,
            city: row.city,
            district: row.district,
            postal_code: row.postal_code,
            country: row.country,
            is_default: row.is_default,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: Uuid,
    code: String,
    discount_type: String,
    discount_value: Decimal,
    min_order_amount: Option<Decimal>,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    usage_limit: Option<i32>,
    used_count: i32,
    is_active: bool,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = EcommerceError;
    fn try_from(row: CouponRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            code: row.code,
            discount_type: row.discount_type.parse().map_err(|e| corrupt("discount type", e))?,
            discount_value: row.discount_value,
            min_order_amount: row.min_order_amount,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            usage_limit: row.usage_limit,
            used_count: row.used_count,
            is_active: row.is_active,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = EcommerceError;
    fn try_from(row: UserRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role.parse().map_err(|e| corrupt("user role", e))?,
            created_at: row.created_at,
        })
    }
}

const AUTH_COLUMNS: &str =
    "user_id, password_hash, email_verified, verification_token, verification_expires_at, verification_attempts";

#[derive(sqlx::FromRow)]
struct AuthRow {
    user_id: Uuid,
    password_hash: String,
    email_verified: bool,
    verification_token: Option<String>,
    verification_expires_at: Option<DateTime<Utc>>,
    verification_attempts: i32,
}

impl From<AuthRow> for AuthRecord {
    fn from(row: AuthRow) -> Self {
        Self {
            user_id: row.user_id,
            password_hash: row.password_hash,
            email_verified: row.email_verified,
            verification_token: row.verification_token,
            verification_expires_at: row.verification_expires_at,
            verification_attempts: row.verification_attempts,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    token_hash: String,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
}

impl HealthCheck for PgStore {
    async fn health_check(&self) -> Result<()> {
        ping(&self.pool).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

impl CategoryRepository for PgStore {
    async fn find_category(&self, id: Uuid) -> Result<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        let row = sqlx::query_as::<_, CategoryRow>(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(Category::try_from).transpose()
    }

    async fn find_category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = $1");
        let row = sqlx::query_as::<_, CategoryRow>(&sql).bind(slug).fetch_optional(&self.pool).await?;
        row.map(Category::try_from).transpose()
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY sort_order, name");
        let rows = sqlx::query_as::<_, CategoryRow>(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(Category::try_from).collect()
    }

    async fn insert_category(&self, category: &Category) -> Result<()> {
        sqlx::query(
            "INSERT INTO categories (id, name, slug, parent_id, description, image, sort_order, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(category.slug.as_str())
        .bind(category.parent_id)
        .bind(&category.description)
        .bind(&category.image)
        .bind(category.sort_order)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_category(&self, category: &Category) -> Result<()> {
        sqlx::query(
            "UPDATE categories SET name = $2, slug = $3, parent_id = $4, description = $5, image = $6, \
             sort_order = $7, updated_at = $8 WHERE id = $1",
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(category.slug.as_str())
        .bind(category.parent_id)
        .bind(&category.description)
        .bind(&category.image)
        .bind(category.sort_order)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_products_in_category(&self, id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products WHERE category_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

impl ProductRepository for PgStore {
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(Product::try_from).transpose()
    }

    async fn find_product_by_slug(&self, slug: &str) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql).bind(slug).fetch_optional(&self.pool).await?;
        row.map(Product::try_from).transpose()
    }

    async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)");
        let rows = sqlx::query_as::<_, ProductRow>(&sql).bind(ids).fetch_all(&self.pool).await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    async fn list_products(&self, filter: &ProductFilter, page: PageRequest) -> Result<Page<Product>> {
        const WHERE: &str = "WHERE ($1::uuid IS NULL OR category_id = $1) \
             AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%' OR $2 = ANY(tags)) \
             AND ($3 OR is_active)";
        let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let data_sql = format!("SELECT {PRODUCT_COLUMNS} FROM products {WHERE} ORDER BY created_at DESC LIMIT $4 OFFSET $5");
        let count_sql = format!("SELECT COUNT(*) FROM products {WHERE}");

        let rows = sqlx::query_as::<_, ProductRow>(&data_sql)
            .bind(filter.category_id)
            .bind(search)
            .bind(filter.include_inactive)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool);
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(filter.category_id)
            .bind(search)
            .bind(filter.include_inactive)
            .fetch_one(&self.pool);
        let (rows, total) = tokio::try_join!(rows, total)?;

        let items = rows.into_iter().map(Product::try_from).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            "INSERT INTO products (id, name, slug, price, discount_percent, category_id, stock, is_active, images, \
             short_description, description, tags, specifications, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(product.slug.as_str())
        .bind(product.price)
        .bind(product.discount_percent.value())
        .bind(product.category_id)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(Json(&product.images))
        .bind(&product.short_description)
        .bind(&product.description)
        .bind(&product.tags)
        .bind(Json(&product.specifications))
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            "UPDATE products SET name = $2, slug = $3, price = $4, discount_percent = $5, category_id = $6, \
             stock = $7, is_active = $8, images = $9, short_description = $10, description = $11, tags = $12, \
             specifications = $13, updated_at = $14 WHERE id = $1",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(product.slug.as_str())
        .bind(product.price)
        .bind(product.discount_percent.value())
        .bind(product.category_id)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(Json(&product.images))
        .bind(&product.short_description)
        .bind(&product.description)
        .bind(&product.tags)
        .bind(Json(&product.specifications))
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn decrement_stock(&self, id: Uuid, quantity: i32) -> Result<Option<i32>> {
        let remaining = sqlx::query_scalar::<_, i32>(
            "UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2 RETURNING stock",
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;
        Ok(remaining)
    }
}

// ---------------------------------------------------------------------------
// Cart & orders
// ---------------------------------------------------------------------------

impl CartRepository for PgStore {
    async fn load_cart(&self, user_id: Uuid) -> Result<Vec<CartLine>> {
        let rows = sqlx::query_as::<_, (Uuid, i32)>(
            "SELECT product_id, quantity FROM cart_items WHERE user_id = $1 ORDER BY position",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|(product_id, quantity)| {
                let quantity = Quantity::new(quantity).map_err(|e| corrupt("cart quantity", e))?;
                Ok(CartLine { product_id, quantity })
            })
            .collect()
    }

    async fn put_cart_line(&self, user_id: Uuid, line: &CartLine) -> Result<()> {
        sqlx::query(
            "INSERT INTO cart_items (user_id, product_id, quantity) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity",
        )
        .bind(user_id)
        .bind(line.product_id)
        .bind(line.quantity.value())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_cart_line(&self, user_id: Uuid, product_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1").bind(user_id).execute(&self.pool).await?;
        Ok(())
    }
}

impl OrderRepository for PgStore {
    async fn insert_order(&self, order: &Order) -> Result<()> {
        sqlx::query(
            "INSERT INTO orders (id, order_number, user_id, items, shipping_address_id, billing_address_id, status, \
             status_history, tracking_number, admin_notes, payment_method, payment_status, delivery_method, \
             coupon_code, subtotal, discount, total, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)",
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.user_id)
        .bind(Json(&order.items))
        .bind(order.shipping_address_id)
        .bind(order.billing_address_id)
        .bind(order.status.as_str())
        .bind(Json(&order.status_history))
        .bind(&order.tracking_number)
        .bind(&order.admin_notes)
        .bind(order.payment_method.as_str())
        .bind(order.payment_status.as_str())
        .bind(order.delivery_method.as_str())
        .bind(&order.coupon_code)
        .bind(order.subtotal)
        .bind(order.discount)
        .bind(order.total)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query_as::<_, OrderRow>(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(Order::try_from).transpose()
    }

    async fn list_orders(&self, filter: OrderFilter, page: PageRequest) -> Result<Page<Order>> {
        const WHERE: &str = "WHERE ($1::uuid IS NULL OR user_id = $1) AND ($2::text IS NULL OR status = $2)";
        let status = filter.status.map(|s| s.as_str());
        let data_sql = format!("SELECT {ORDER_COLUMNS} FROM orders {WHERE} ORDER BY created_at DESC LIMIT $3 OFFSET $4");
        let count_sql = format!("SELECT COUNT(*) FROM orders {WHERE}");

        let rows = sqlx::query_as::<_, OrderRow>(&data_sql)
            .bind(filter.user_id)
            .bind(status)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool);
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(filter.user_id)
            .bind(status)
            .fetch_one(&self.pool);
        let (rows, total) = tokio::try_join!(rows, total)?;

        let items = rows.into_iter().map(Order::try_from).collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }

    async fn apply_order_changes(&self, id: Uuid, changes: &OrderChanges) -> Result<Option<Order>> {
        // History is only ever appended to with `||`, never rewritten.
        let sql = format!(
            "UPDATE orders SET \
                status = COALESCE($2, status), \
                payment_status = COALESCE($3, payment_status), \
                tracking_number = COALESCE($4, tracking_number), \
                admin_notes = COALESCE($5, admin_notes), \
                status_history = CASE WHEN $6::jsonb IS NULL THEN status_history \
                                      ELSE status_history || jsonb_build_array($6::jsonb) END, \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .bind(changes.status.map(|s| s.as_str()))
            .bind(changes.payment_status.map(|s| s.as_str()))
            .bind(&changes.tracking_number)
            .bind(&changes.admin_notes)
            .bind(changes.history_entry.as_ref().map(Json))
            .fetch_optional(&self.pool)
            .await?;
        row.map(Order::try_from).transpose()
    }
}

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

impl AddressRepository for PgStore {
    async fn list_addresses(&self, user_id: Uuid) -> Result<Vec<Address>> {
        let sql = format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, AddressRow>(&sql).bind(user_id).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Address::from).collect())
    }

    async fn find_address(&self, id: Uuid) -> Result<Option<Address>> {
        let sql = format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1");
        let row = sqlx::query_as::<_, AddressRow>(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(Address::from))
    }

    async fn insert_address(&self, address: &Address) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        if address.is_default {
            sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1 AND is_default")
                .bind(address.user_id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query(
            "INSERT INTO addresses (id, user_id, full_name, phone, address_line1, address_line2, city, district, \
             postal_code, country, is_default, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(address.id)
        .bind(address.user_id)
        .bind(&address.full_name)
        .bind(&address.phone)
        .bind(&address.address_line1)
        .bind(&address.address_line2)
        .bind(&address.city)
        .bind(&address.district)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(address.is_default)
        .bind(address.created_at)
        .bind(address.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_address(&self, address: &Address) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        if address.is_default {
            sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1 AND id <> $2 AND is_default")
                .bind(address.user_id)
                .bind(address.id)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query(
            "UPDATE addresses SET full_name = $3, phone = $4, address_line1 = $5, address_line2 = $6, city = $7, \
             district = $8, postal_code = $9, country = $10, is_default = $11, updated_at = $12 \
             WHERE id = $1 AND user_id = $2",
        )
        .bind(address.id)
        .bind(address.user_id)
        .bind(&address.full_name)
        .bind(&address.phone)
        .bind(&address.address_line1)
        .bind(&address.address_line2)
        .bind(&address.city)
        .bind(&address.district)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(address.is_default)
        .bind(address.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_address(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM addresses WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_default_address(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE addresses SET is_default = FALSE, updated_at = NOW() WHERE user_id = $1 AND id <> $2 AND is_default")
            .bind(user_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("UPDATE addresses SET is_default = TRUE, updated_at = NOW() WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        tx.commit().await?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Coupons
// ---------------------------------------------------------------------------

impl CouponRepository for PgStore {
    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(
            "SELECT id, code, discount_type, discount_value, min_order_amount, valid_from, valid_until, \
             usage_limit, used_count, is_active FROM coupons WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Coupon::try_from).transpose()
    }

    async fn redeem_coupon(&self, code: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE coupons SET used_count = used_count + 1 \
             WHERE code = $1 AND (usage_limit IS NULL OR used_count < usage_limit)",
        )
        .bind(code)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

impl AccountRepository for PgStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, name, email, role, created_at FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<(User, AuthRecord)>> {
        let user = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, role, created_at FROM users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        let Some(user) = user else { return Ok(None) };
        let user = User::try_from(user)?;

        let sql = format!("SELECT {AUTH_COLUMNS} FROM auth_records WHERE user_id = $1");
        let auth = sqlx::query_as::<_, AuthRow>(&sql).bind(user.id).fetch_optional(&self.pool).await?;
        Ok(auth.map(|auth| (user, AuthRecord::from(auth))))
    }

    async fn find_auth_by_token(&self, token: &str) -> Result<Option<AuthRecord>> {
        let sql = format!("SELECT {AUTH_COLUMNS} FROM auth_records WHERE verification_token = $1");
        let row = sqlx::query_as::<_, AuthRow>(&sql).bind(token).fetch_optional(&self.pool).await?;
        Ok(row.map(AuthRecord::from))
    }

    async fn insert_user(&self, user: &User, auth: &AuthRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO users (id, name, email, role, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(user.role.as_str())
            .bind(user.created_at)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO auth_records (user_id, password_hash, email_verified, verification_token, \
             verification_expires_at, verification_attempts) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(auth.user_id)
        .bind(&auth.password_hash)
        .bind(auth.email_verified)
        .bind(&auth.verification_token)
        .bind(auth.verification_expires_at)
        .bind(auth.verification_attempts)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_auth(&self, auth: &AuthRecord) -> Result<()> {
        sqlx::query(
            "UPDATE auth_records SET password_hash = $2, email_verified = $3, verification_token = $4, \
             verification_expires_at = $5, verification_attempts = $6 WHERE user_id = $1",
        )
        .bind(auth.user_id)
        .bind(&auth.password_hash)
        .bind(auth.email_verified)
        .bind(&auth.verification_token)
        .bind(auth.verification_expires_at)
        .bind(auth.verification_attempts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_session(&self, session: &Session) -> Result<()> {
        sqlx::query("INSERT INTO sessions (token_hash, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.token_hash)
            .bind(session.user_id)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_session(&self, token_hash: &str) -> Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT token_hash, user_id, expires_at FROM sessions WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Session { token_hash: r.token_hash, user_id: r.user_id, expires_at: r.expires_at }))
    }

    async fn append_order_history(&self, user_id: Uuid, order_id: Uuid) -> Result<()> {
        sqlx::query("INSERT INTO user_order_history (user_id, order_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .bind(order_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_payment_method(&self, method: &SavedPaymentMethod) -> Result<()> {
        sqlx::query("INSERT INTO payment_methods (id, user_id, method, label, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(method.id)
            .bind(method.user_id)
            .bind(method.method.as_str())
            .bind(&method.label)
            .bind(method.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
