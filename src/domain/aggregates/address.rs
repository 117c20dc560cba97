//! Address Aggregate

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Bangladeshi mobile numbers, with or without the country prefix.
pub static BD_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\+?880|0)1[3-9]\d{8}$").expect("valid phone regex"));

/// Four digit Bangladeshi postal codes.
pub static BD_POSTAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}$").expect("valid postal code regex"));

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub district: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AddressInput {
    #[validate(length(min = 2, max = 100, message = "full name must be between 2 and 100 characters"))]
    pub full_name: String,
    #[validate(regex(path = "BD_PHONE", message = "enter a valid Bangladeshi mobile number"))]
    pub phone: String,
    #[validate(length(min = 5, max = 200, message = "address must be between 5 and 200 characters"))]
    pub address_line1: String,
    #[validate(length(max = 200))]
    pub address_line2: Option<String>,
    #[validate(length(min = 2, max = 60, message = "city is required"))]
    pub city: String,
    #[validate(length(min = 2, max = 60, message = "district is required"))]
    pub district: String,
    #[validate(regex(path = "BD_POSTAL_CODE", message = "postal code must be 4 digits"))]
    pub postal_code: String,
    #[serde(default = "default_country")]
    #[validate(length(min = 2, max = 60))]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

fn default_country() -> String { "Bangladesh".to_string() }

impl Address {
    pub fn new(user_id: Uuid, input: AddressInput) -> Self {
        let now = Utc::now();
        let mut address = Self {
            id: Uuid::now_v7(),
            user_id,
            full_name: String::new(),
            phone: String::new(),
            address_line1: String::new(),
            address_line2: None,
            city: String::new(),
            district: String::new(),
            postal_code: String::new(),
            country: String::new(),
            is_default: input.is_default,
            created_at: now,
            updated_at: now,
        };
        address.apply(input);
        address
    }

    /// Copies the editable fields. The default flag is managed separately.
    pub fn apply(&mut self, input: AddressInput) {
        self.full_name = input.full_name.trim().to_string();
        self.phone = input.phone.trim().to_string();
        self.address_line1 = input.address_line1.trim().to_string();
        self.address_line2 = input.address_line2.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());
        self.city = input.city.trim().to_string();
        self.district = input.district.trim().to_string();
        self.postal_code = input.postal_code.trim().to_string();
        self.country = input.country.trim().to_string();
        self.updated_at = Utc::now();
    }
}
