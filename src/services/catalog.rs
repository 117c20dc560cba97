//! Category and product administration plus public catalog reads.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use super::{admin, Caller};
use crate::assets::{log_cleanup, AssetOutcome, AssetStore, CleanupSummary};
use crate::domain::aggregates::{
    orphaned_images, Category, CategoryInput, ParentRef, Product, ProductFilter, ProductInput,
};
use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::value_objects::{Percent, Slug};
use crate::error::{EcommerceError, Result};
use crate::notify::Notifier;
use crate::store::{CategoryRepository, Page, PageRequest, ProductRepository};

fn resolve_slug(explicit: Option<&str>, name: &str) -> Result<Slug> {
    match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Slug::new(raw),
        None => Slug::from_name(name),
    }
    .map_err(|e| EcommerceError::invalid("slug", e.to_string()))
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

pub async fn list_categories<S>(store: &S) -> Result<Vec<Category>>
where
    S: CategoryRepository,
{
    store.list_categories().await
}

pub async fn get_category<S>(store: &S, id: Uuid) -> Result<Category>
where
    S: CategoryRepository,
{
    store.find_category(id).await?.ok_or_else(|| EcommerceError::not_found("category"))
}

/// Rejects a slug owned by a category other than `this`.
async fn ensure_category_slug_free<S>(store: &S, slug: &Slug, this: Option<Uuid>) -> Result<()>
where
    S: CategoryRepository,
{
    match store.find_category_by_slug(slug.as_str()).await? {
        Some(other) if Some(other.id) != this => {
            Err(EcommerceError::Conflict(format!("a category with slug '{slug}' already exists")))
        }
        _ => Ok(()),
    }
}

/// Blank parents mean none; anything else must name another existing category.
async fn resolve_parent<S>(store: &S, parent: ParentRef, this: Option<Uuid>) -> Result<Option<Uuid>>
where
    S: CategoryRepository,
{
    match parent {
        ParentRef::None => Ok(None),
        ParentRef::Invalid => Err(EcommerceError::invalid("parent", "parent must be a category id")),
        ParentRef::Id(id) if Some(id) == this => {
            Err(EcommerceError::invalid("parent", "a category cannot be its own parent"))
        }
        ParentRef::Id(id) => match store.find_category(id).await? {
            Some(_) => Ok(Some(id)),
            None => Err(EcommerceError::invalid("parent", "parent category does not exist")),
        },
    }
}

pub async fn create_category<S>(store: &S, caller: Option<&Caller>, input: CategoryInput) -> Result<Category>
where
    S: CategoryRepository,
{
    admin(caller)?;
    input.validate()?;
    let slug = resolve_slug(input.slug.as_deref(), &input.name)?;
    ensure_category_slug_free(store, &slug, None).await?;
    let parent_id = resolve_parent(store, input.parent_ref(), None).await?;

    let now = Utc::now();
    let category = Category {
        id: Uuid::now_v7(),
        name: input.name.trim().to_string(),
        slug,
        parent_id,
        description: input.description,
        image: input.image,
        sort_order: input.sort_order,
        created_at: now,
        updated_at: now,
    };
    store.insert_category(&category).await?;
    tracing::info!(category = %category.id, slug = %category.slug, "category created");
    Ok(category)
}

pub async fn update_category<S>(store: &S, caller: Option<&Caller>, id: Uuid, input: CategoryInput) -> Result<Category>
where
    S: CategoryRepository,
{
    admin(caller)?;
    input.validate()?;
    let mut category = get_category(store, id).await?;
    let slug = resolve_slug(input.slug.as_deref(), &input.name)?;
    ensure_category_slug_free(store, &slug, Some(id)).await?;
    let parent_id = resolve_parent(store, input.parent_ref(), Some(id)).await?;

    category.name = input.name.trim().to_string();
    category.slug = slug;
    category.parent_id = parent_id;
    category.description = input.description;
    category.image = input.image;
    category.sort_order = input.sort_order;
    category.updated_at = Utc::now();
    store.update_category(&category).await?;
    Ok(category)
}

/// Deletes a category that no product references.
pub async fn delete_category<S>(store: &S, caller: Option<&Caller>, id: Uuid) -> Result<()>
where
    S: CategoryRepository,
{
    admin(caller)?;
    let category = get_category(store, id).await?;
    let in_use = store.count_products_in_category(id).await?;
    if in_use > 0 {
        let noun = if in_use == 1 { "product" } else { "products" };
        return Err(EcommerceError::Conflict(format!(
            "category '{}' is used by {in_use} {noun} and cannot be deleted",
            category.name
        )));
    }
    if !store.delete_category(id).await? {
        return Err(EcommerceError::not_found("category"));
    }
    tracing::info!(category = %id, "category deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// Product write result with the outcome of each image deletion it caused.
#[derive(Debug, Clone)]
pub struct ProductChange {
    pub product: Product,
    pub cleanup: Vec<AssetOutcome>,
}

impl ProductChange {
    pub fn summary(&self) -> CleanupSummary { CleanupSummary::of(&self.cleanup) }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub effective_price: rust_decimal::Decimal,
}

impl From<Product> for ProductView {
    fn from(product: Product) -> Self {
        Self { effective_price: product.effective_price(), product }
    }
}

/// Active products for everyone; admins may ask for inactive ones too.
pub async fn list_products<S>(
    store: &S,
    caller: Option<&Caller>,
    mut filter: ProductFilter,
    page: PageRequest,
) -> Result<Page<ProductView>>
where
    S: ProductRepository,
{
    filter.include_inactive &= caller.is_some_and(Caller::is_admin);
    filter.search = filter.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    Ok(store.list_products(&filter, page).await?.map(ProductView::from))
}

pub async fn get_product<S>(store: &S, caller: Option<&Caller>, id: Uuid) -> Result<ProductView>
where
    S: ProductRepository,
{
    let is_admin = caller.is_some_and(Caller::is_admin);
    store
        .find_product(id)
        .await?
        .filter(|p| p.is_active || is_admin)
        .map(ProductView::from)
        .ok_or_else(|| EcommerceError::not_found("product"))
}

async fn prepare_product<S>(store: &S, input: &ProductInput, this: Option<Uuid>) -> Result<(Slug, Percent)>
where
    S: CategoryRepository + ProductRepository,
{
    input.validate()?;
    let slug = resolve_slug(input.slug.as_deref(), &input.name)?;
    if let Some(other) = store.find_product_by_slug(slug.as_str()).await? {
        if Some(other.id) != this {
            return Err(EcommerceError::Conflict(format!("a product with slug '{slug}' already exists")));
        }
    }
    if let Some(category_id) = input.category_id {
        if store.find_category(category_id).await?.is_none() {
            return Err(EcommerceError::invalid("category_id", "category does not exist"));
        }
    }
    let discount = Percent::new(input.discount_percent)
        .map_err(|e| EcommerceError::invalid("discount_percent", e.to_string()))?;
    Ok((slug, discount))
}

pub async fn create_product<S>(store: &S, caller: Option<&Caller>, input: ProductInput) -> Result<Product>
where
    S: CategoryRepository + ProductRepository,
{
    admin(caller)?;
    let (slug, discount) = prepare_product(store, &input, None).await?;
    let product = Product::new(input, slug, discount);
    store.insert_product(&product).await?;
    tracing::info!(product = %product.id, slug = %product.slug, "product created");
    Ok(product)
}

/// Replaces a product and deletes the stored images it no longer uses.
/// Image deletion never fails the update.
pub async fn update_product<S>(
    store: &S,
    assets: &AssetStore,
    caller: Option<&Caller>,
    id: Uuid,
    input: ProductInput,
) -> Result<ProductChange>
where
    S: CategoryRepository + ProductRepository,
{
    admin(caller)?;
    let mut product = store.find_product(id).await?.ok_or_else(|| EcommerceError::not_found("product"))?;
    let (slug, discount) = prepare_product(store, &input, Some(id)).await?;

    let previous = product.images.clone();
    product.apply(input, slug, discount);
    store.update_product(&product).await?;

    let orphaned: Vec<String> = orphaned_images(&previous, &product.images).into_iter().map(String::from).collect();
    let cleanup = assets.delete_many(orphaned).await;
    log_cleanup("product update", &cleanup);
    tracing::info!(product = %product.id, removed_images = cleanup.len(), "product updated");
    Ok(ProductChange { product, cleanup })
}

/// Deletes every gallery image, then the product itself.
pub async fn delete_product<S>(
    store: &S,
    assets: &AssetStore,
    notifier: &Notifier,
    caller: Option<&Caller>,
    id: Uuid,
) -> Result<Vec<AssetOutcome>>
where
    S: ProductRepository,
{
    admin(caller)?;
    let product = store.find_product(id).await?.ok_or_else(|| EcommerceError::not_found("product"))?;

    let cleanup = assets.delete_many(product.image_urls().map(String::from).collect::<Vec<_>>()).await;
    log_cleanup("product delete", &cleanup);

    if !store.delete_product(id).await? {
        return Err(EcommerceError::not_found("product"));
    }
    tracing::info!(product = %id, "product deleted");
    notifier.publish_quietly(&DomainEvent::Product(ProductEvent::Deleted { product_id: id })).await;
    Ok(cleanup)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_falls_back_to_name() {
        assert_eq!(resolve_slug(None, "Summer Tees").unwrap().as_str(), "summer-tees");
        assert_eq!(resolve_slug(Some("  "), "Summer Tees").unwrap().as_str(), "summer-tees");
        assert_eq!(resolve_slug(Some("tees-2024"), "ignored").unwrap().as_str(), "tees-2024");
        assert!(resolve_slug(Some("Bad Slug"), "x").unwrap_err().field_issues("slug").is_some());
    }
}
