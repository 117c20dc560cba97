//! Product Aggregate

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::domain::value_objects::{round_money, Percent, Slug};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: Slug,
    pub price: Decimal,
    pub discount_percent: Percent,
    pub category_id: Option<Uuid>,
    pub stock: i32,
    pub is_active: bool,
    pub images: Vec<ProductImage>,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub specifications: Vec<Specification>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Specification {
    #[validate(length(min = 1, max = 100))]
    pub key: String,
    #[validate(length(max = 500))]
    pub value: String,
}

impl Product {
    /// Price after the percentage discount, rounded to cents.
    pub fn effective_price(&self) -> Decimal {
        round_money(self.price - self.discount_percent.of(self.price))
    }

    pub fn primary_image(&self) -> Option<&ProductImage> {
        self.images.iter().find(|i| i.is_primary).or_else(|| self.images.first())
    }

    pub fn image_urls(&self) -> impl Iterator<Item = &str> {
        self.images.iter().map(|i| i.url.as_str())
    }

    pub fn has_stock(&self, qty: i32) -> bool { self.stock >= qty }

    pub fn new(input: ProductInput, slug: Slug, discount: Percent) -> Self {
        let now = Utc::now();
        let mut product = Self {
            id: Uuid::now_v7(),
            name: String::new(),
            slug: slug.clone(),
            price: Decimal::ZERO,
            discount_percent: Percent::ZERO,
            category_id: None,
            stock: 0,
            is_active: true,
            images: Vec::new(),
            short_description: None,
            description: None,
            tags: Vec::new(),
            specifications: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        product.apply(input, slug, discount);
        product
    }

    /// Replaces the editable fields with `input`, keeping identity and creation time.
    pub fn apply(&mut self, input: ProductInput, slug: Slug, discount: Percent) {
        self.name = input.name.trim().to_string();
        self.slug = slug;
        self.price = input.price;
        self.discount_percent = discount;
        self.category_id = input.category_id;
        self.stock = input.stock;
        self.is_active = input.is_active;
        self.images = input.images;
        self.short_description = input.short_description;
        self.description = input.description;
        self.tags = input.tags;
        self.specifications = input.specifications;
        self.updated_at = Utc::now();
    }
}

/// Admin-submitted product fields.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct ProductInput {
    #[validate(length(min = 2, max = 200, message = "name must be between 2 and 200 characters"))]
    pub name: String,
    pub slug: Option<String>,
    #[validate(custom = "non_negative")]
    pub price: Decimal,
    #[serde(default)]
    #[validate(custom = "percent_range")]
    pub discount_percent: Decimal,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    #[validate(range(min = 0, message = "stock cannot be negative"))]
    pub stock: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    #[validate(custom = "valid_gallery")]
    pub images: Vec<ProductImage>,
    #[validate(length(max = 500))]
    pub short_description: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    #[validate]
    pub specifications: Vec<Specification>,
}

fn default_active() -> bool { true }

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        let mut err = ValidationError::new("min");
        err.message = Some("must not be negative".into());
        return Err(err);
    }
    Ok(())
}

fn percent_range(value: &Decimal) -> Result<(), ValidationError> {
    Percent::new(*value).map(|_| ()).map_err(|e| {
        let mut err = ValidationError::new("range");
        err.message = Some(e.to_string().into());
        err
    })
}

fn valid_gallery(images: &Vec<ProductImage>) -> Result<(), ValidationError> {
    if images.iter().any(|i| i.url.trim().is_empty()) {
        let mut err = ValidationError::new("url");
        err.message = Some("image url is required".into());
        return Err(err);
    }
    if images.iter().filter(|i| i.is_primary).count() > 1 {
        let mut err = ValidationError::new("primary");
        err.message = Some("only one image may be marked primary".into());
        return Err(err);
    }
    Ok(())
}

/// Image URLs present in `old` but absent from `new`, in `old` gallery order.
pub fn orphaned_images<'a>(old: &'a [ProductImage], new: &[ProductImage]) -> Vec<&'a str> {
    let keep: HashSet<&str> = new.iter().map(|i| i.url.as_str()).collect();
    let mut seen = HashSet::new();
    old.iter()
        .map(|i| i.url.as_str())
        .filter(|url| !keep.contains(url) && seen.insert(*url))
        .collect()
}

/// Query parameters accepted by product listings.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub category_id: Option<Uuid>,
    pub search: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}
