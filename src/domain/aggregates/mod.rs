//! Aggregates module
pub mod account;
pub mod address;
pub mod cart;
pub mod category;
pub mod coupon;
pub mod order;
pub mod product;

pub use account::{
    mask_account, AuthRecord, CustomerSummary, LoginInput, RegisterInput, Role, SavedPaymentMethod,
    Session, User, MAX_VERIFICATION_ATTEMPTS,
};
pub use address::{Address, AddressInput};
pub use cart::{price_cart, Cart, CartLine, PricedCart, PricedLine};
pub use category::{Category, CategoryInput, ParentRef};
pub use coupon::{normalize_code, Coupon, CouponRejection, DiscountType};
pub use order::{
    DeliveryMethod, Order, OrderChanges, OrderItem, OrderStatus, OrderUpdate, PaymentMethod,
    PaymentStatus, ProductSnapshot, StatusEntry,
};
pub use product::{orphaned_images, Product, ProductFilter, ProductImage, ProductInput, Specification};
