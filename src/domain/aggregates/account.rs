//! User and credential records

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Verification e-mails allowed per account, including the first one.
pub const MAX_VERIFICATION_ATTEMPTS: i32 = 5;
/// Lifetime of an e-mail verification token.
pub const VERIFICATION_TTL_HOURS: i64 = 24;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role { #[default] Customer, Admin }

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Customer => "customer", Self::Admin => "admin" }
    }
}

impl std::str::FromStr for Role {
    type Err = super::order::UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            other => Err(super::order::UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Credential record, one per user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthRecord {
    pub user_id: Uuid,
    pub password_hash: String,
    pub email_verified: bool,
    pub verification_token: Option<String>,
    pub verification_expires_at: Option<DateTime<Utc>>,
    pub verification_attempts: i32,
}

impl AuthRecord {
    pub fn attempts_exhausted(&self) -> bool {
        self.verification_attempts >= MAX_VERIFICATION_ATTEMPTS
    }

    /// Stores a fresh token and counts the send.
    pub fn issue_token(&mut self, token: String, now: DateTime<Utc>) {
        self.verification_token = Some(token);
        self.verification_expires_at = Some(now + Duration::hours(VERIFICATION_TTL_HOURS));
        self.verification_attempts += 1;
    }

    pub fn token_expired(&self, now: DateTime<Utc>) -> bool {
        self.verification_expires_at.map_or(true, |at| now > at)
    }

    /// Marks the e-mail verified and burns the token.
    pub fn mark_verified(&mut self) {
        self.email_verified = true;
        self.verification_token = None;
        self.verification_expires_at = None;
    }
}

/// Bearer session. Only the SHA-256 of the token is persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&User> for CustomerSummary {
    fn from(user: &User) -> Self {
        Self { id: user.id, name: user.name.clone(), email: user.email.clone() }
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 2, max = 100, message = "name must be between 2 and 100 characters"))]
    pub name: String,
    #[validate(email(message = "enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(email(message = "enter a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Saved payment instrument. Only a masked label is ever stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPaymentMethod {
    pub id: Uuid,
    pub user_id: Uuid,
    pub method: super::order::PaymentMethod,
    pub label: String,
    pub created_at: DateTime<Utc>,
}

/// Keeps the last four characters of an account or card number.
pub fn mask_account(account: &str) -> String {
    let digits: Vec<char> = account.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    let tail: String = digits.iter().rev().take(4).rev().collect();
    format!("•••• {tail}")
}
