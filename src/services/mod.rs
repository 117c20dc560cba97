//! Business operations. Each function is generic over the repository traits
//! it needs and receives its collaborators explicitly.

pub mod accounts;
pub mod addresses;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod coupons;
pub mod orders;

use uuid::Uuid;

use crate::domain::aggregates::Role;
use crate::error::{EcommerceError, Result};

/// The authenticated user a request acts for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool { self.role == Role::Admin }

    pub fn require_admin(&self) -> Result<()> {
        if self.is_admin() { Ok(()) } else { Err(EcommerceError::forbidden()) }
    }

    /// Whether the caller may see data owned by `owner`.
    pub fn can_access(&self, owner: Uuid) -> bool { self.is_admin() || self.user_id == owner }
}

/// Unwraps an optional caller or fails with `Unauthorized`.
pub fn authenticated(caller: Option<&Caller>) -> Result<&Caller> {
    caller.ok_or_else(EcommerceError::unauthorized)
}

/// Admin-only operations accept an optional caller so that a missing session
/// and a missing privilege are both reported as `Unauthorized`.
pub fn admin(caller: Option<&Caller>) -> Result<&Caller> {
    let caller = authenticated(caller)?;
    caller.require_admin()?;
    Ok(caller)
}
