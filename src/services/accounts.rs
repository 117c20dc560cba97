//! Registration, sessions and e-mail verification.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use validator::Validate;

use super::Caller;
use crate::domain::aggregates::{AuthRecord, CustomerSummary, LoginInput, RegisterInput, Role, Session, User};
use crate::error::{EcommerceError, Result};
use crate::notify::{Notification, Notifier};
use crate::store::AccountRepository;

const TOKEN_LEN: usize = 48;

#[derive(Clone, Debug, Deserialize)]
pub struct VerifyInput {
    pub token: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ResendInput {
    pub email: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct LoginResult {
    pub token: String,
    pub expires_at: chrono::DateTime<Utc>,
    pub user: CustomerSummary,
    pub role: Role,
    pub email_verified: bool,
}

fn random_token() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(TOKEN_LEN).map(char::from).collect()
}

/// Hex SHA-256 of a session token; only this is stored.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| EcommerceError::Unexpected(format!("failed to hash password: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }

pub async fn register<S>(store: &S, notifier: &Notifier, input: RegisterInput) -> Result<CustomerSummary>
where
    S: AccountRepository,
{
    input.validate()?;
    let email = normalize_email(&input.email);
    if store.find_user_by_email(&email).await?.is_some() {
        return Err(EcommerceError::Conflict("an account with this email already exists".to_string()));
    }

    let password = input.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| EcommerceError::Unexpected(e.to_string()))??;

    let now = Utc::now();
    let user = User { id: Uuid::now_v7(), name: input.name.trim().to_string(), email, role: Role::Customer, created_at: now };
    let mut auth = AuthRecord {
        user_id: user.id,
        password_hash,
        email_verified: false,
        verification_token: None,
        verification_expires_at: None,
        verification_attempts: 0,
    };
    let token = random_token();
    auth.issue_token(token.clone(), now);
    store.insert_user(&user, &auth).await?;
    tracing::info!(user = %user.id, "account registered");

    send_verification(notifier, &user, token).await;
    Ok(CustomerSummary::from(&user))
}

async fn send_verification(notifier: &Notifier, user: &User, token: String) {
    let message = Notification::EmailVerification { to: user.email.clone(), name: user.name.clone(), token };
    if let Err(error) = notifier.send(&message).await {
        tracing::warn!(user = %user.id, %error, "verification e-mail not sent");
    }
}

pub async fn login<S>(store: &S, input: LoginInput, session_ttl_hours: i64) -> Result<LoginResult>
where
    S: AccountRepository,
{
    input.validate()?;
    let rejected = || EcommerceError::Unauthorized("invalid email or password".to_string());
    let (user, auth) = store.find_user_by_email(&normalize_email(&input.email)).await?.ok_or_else(rejected)?;

    let password = input.password;
    let hash = auth.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| EcommerceError::Unexpected(e.to_string()))?;
    if !matches {
        tracing::info!(user = %user.id, "login rejected");
        return Err(rejected());
    }

    let token = random_token();
    let session = Session {
        token_hash: hash_token(&token),
        user_id: user.id,
        expires_at: Utc::now() + Duration::hours(session_ttl_hours),
    };
    store.insert_session(&session).await?;
    Ok(LoginResult {
        token,
        expires_at: session.expires_at,
        user: CustomerSummary::from(&user),
        role: user.role,
        email_verified: auth.email_verified,
    })
}

/// Resolves a bearer token to the caller it was issued to.
pub async fn authenticate<S>(store: &S, token: &str) -> Result<Option<Caller>>
where
    S: AccountRepository,
{
    let Some(session) = store.find_session(&hash_token(token)).await? else { return Ok(None) };
    if session.expires_at < Utc::now() {
        return Ok(None);
    }
    Ok(store.find_user(session.user_id).await?.map(|user| Caller { user_id: user.id, role: user.role }))
}

/// Consumes a verification token.
pub async fn verify_email<S>(store: &S, input: VerifyInput) -> Result<()>
where
    S: AccountRepository,
{
    let token = input.token.trim();
    if token.is_empty() {
        return Err(EcommerceError::invalid("token", "verification token is required"));
    }
    let mut auth = store
        .find_auth_by_token(token)
        .await?
        .ok_or_else(|| EcommerceError::invalid("token", "invalid or already used verification link"))?;
    if auth.token_expired(Utc::now()) {
        return Err(EcommerceError::invalid("token", "verification link has expired"));
    }
    auth.mark_verified();
    store.update_auth(&auth).await?;
    tracing::info!(user = %auth.user_id, "email verified");
    Ok(())
}

/// Issues a fresh verification token. The send cap is checked before anything else.
pub async fn resend_verification<S>(store: &S, notifier: &Notifier, input: ResendInput) -> Result<()>
where
    S: AccountRepository,
{
    let (user, mut auth) = store
        .find_user_by_email(&normalize_email(&input.email))
        .await?
        .ok_or_else(|| EcommerceError::not_found("account"))?;
    if auth.attempts_exhausted() {
        tracing::warn!(user = %user.id, attempts = auth.verification_attempts, "verification resend refused");
        return Err(EcommerceError::invalid("email", "too many attempts"));
    }
    if auth.email_verified {
        return Err(EcommerceError::Conflict("email is already verified".to_string()));
    }

    let token = random_token();
    auth.issue_token(token.clone(), Utc::now());
    store.update_auth(&auth).await?;
    send_verification(notifier, &user, token).await;
    Ok(())
}
