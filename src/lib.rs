//! Storefront and admin back-office
//!
//! ## Features
//! - Cart pricing against the live catalog
//! - Checkout with per-step outcome reporting
//! - Order status lifecycle with an append-only history
//! - Category and product administration with integrity guards
//! - Product image cleanup
//! - Address book with a single default address per user
//! - Coupons and account e-mail verification

pub mod api;
pub mod assets;
pub mod config;
pub mod domain;
pub mod error;
pub mod middleware;
pub mod notify;
pub mod payment;
pub mod services;
pub mod store;

pub use error::{EcommerceError, Result};
