//! Address book. Every operation is scoped to the owning user.

use uuid::Uuid;
use validator::Validate;

use crate::domain::aggregates::{Address, AddressInput};
use crate::error::{EcommerceError, Result};
use crate::store::AddressRepository;

pub async fn list<S>(store: &S, user_id: Uuid) -> Result<Vec<Address>>
where
    S: AddressRepository,
{
    store.list_addresses(user_id).await
}

/// Loads an address owned by `user_id`. Someone else's address is reported as missing.
pub async fn owned<S>(store: &S, user_id: Uuid, id: Uuid) -> Result<Address>
where
    S: AddressRepository,
{
    store
        .find_address(id)
        .await?
        .filter(|a| a.user_id == user_id)
        .ok_or_else(|| EcommerceError::not_found("address"))
}

/// Saves a new address. A user's first address becomes the default.
pub async fn create<S>(store: &S, user_id: Uuid, input: AddressInput) -> Result<Address>
where
    S: AddressRepository,
{
    input.validate()?;
    let first = store.list_addresses(user_id).await?.is_empty();
    let mut address = Address::new(user_id, input);
    address.is_default = address.is_default || first;
    store.insert_address(&address).await?;
    tracing::info!(user = %user_id, address = %address.id, is_default = address.is_default, "address created");
    Ok(address)
}

pub async fn update<S>(store: &S, user_id: Uuid, id: Uuid, input: AddressInput) -> Result<Address>
where
    S: AddressRepository,
{
    input.validate()?;
    let mut address = owned(store, user_id, id).await?;
    let make_default = input.is_default;
    address.apply(input);
    address.is_default |= make_default;
    store.update_address(&address).await?;
    Ok(address)
}

/// Deletes an address. When it was the default, the most recently created
/// remaining address is promoted.
pub async fn delete<S>(store: &S, user_id: Uuid, id: Uuid) -> Result<Option<Address>>
where
    S: AddressRepository,
{
    let address = owned(store, user_id, id).await?;
    if !store.delete_address(user_id, id).await? {
        return Err(EcommerceError::not_found("address"));
    }
    if !address.is_default {
        return Ok(None);
    }

    let Some(mut next) = store.list_addresses(user_id).await?.into_iter().next() else {
        return Ok(None);
    };
    store.set_default_address(user_id, next.id).await?;
    next.is_default = true;
    tracing::info!(user = %user_id, address = %next.id, "default address promoted");
    Ok(Some(next))
}

pub async fn set_default<S>(store: &S, user_id: Uuid, id: Uuid) -> Result<Address>
where
    S: AddressRepository,
{
    let mut address = owned(store, user_id, id).await?;
    if !store.set_default_address(user_id, id).await? {
        return Err(EcommerceError::not_found("address"));
    }
    address.is_default = true;
    Ok(address)
}
