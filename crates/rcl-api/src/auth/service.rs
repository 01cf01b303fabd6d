use rcl_db::{models::UserProfile, repositories::user as user_repo};
use sqlx::PgPool;

use super::validation::{normalize_email, validate_email, validate_password, validate_username};
use crate::{error::ApiError, metrics};

/// Create an account with an email and password.
pub async fn register_user(
    pool: &PgPool,
    username: &str,
    email: &str,
    password: &str,
    bcrypt_cost: u32,
) -> Result<UserProfile, ApiError> {
    let username = username.trim();
    let email = normalize_email(email);

    validate_username(username)?;
    validate_email(&email)?;
    validate_password(password)?;

    let password_hash = hash_password(password.to_string(), bcrypt_cost).await?;

    let user = user_repo::create_user(pool, username, &email, &password_hash)
        .await
        .map_err(map_duplicate_user)?;

    tracing::info!(user_id = %user.id, "User registered");
    metrics::record_auth_event("register", "password", true);

    Ok(user)
}

/// Check an email/password pair.
///
/// Unknown emails and wrong passwords produce the same error.
pub async fn authenticate(pool: &PgPool, email: &str, password: &str) -> Result<UserProfile, ApiError> {
    let email = normalize_email(email);
    let invalid = || ApiError::Auth("Invalid email or password".to_string());

    let Some(credentials) = user_repo::find_credentials_by_email(pool, &email).await? else {
        metrics::record_auth_event("login", "password", false);
        return Err(invalid());
    };

    if !verify_password(password.to_string(), credentials.password_hash.clone()).await? {
        tracing::debug!(user_id = %credentials.id, "Login rejected: wrong password");
        metrics::record_auth_event("login", "password", false);
        return Err(invalid());
    }

    metrics::record_auth_event("login", "password", true);

    user_repo::find_profile_by_id(pool, credentials.id)
        .await?
        .ok_or_else(invalid)
}

/// Turn unique violations on `users` into a readable conflict.
pub fn map_duplicate_user(error: sqlx::Error) -> ApiError {
    let constraint = error
        .as_database_error()
        .and_then(|e| e.constraint())
        .map(str::to_owned);

    match constraint.as_deref() {
        Some("users_username_key") => ApiError::Conflict("Username is already taken".to_string()),
        Some("users_email_key") => ApiError::Conflict("Email is already registered".to_string()),
        _ => ApiError::Database(error),
    }
}

/// bcrypt is CPU bound, so hashing runs on the blocking pool
pub async fn hash_password(password: String, cost: u32) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ApiError::Internal(format!("Password hashing task failed: {e}")))?
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {e}")))
}

async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ApiError::Internal(format!("Password verification task failed: {e}")))?
        .map_err(|e| ApiError::Internal(format!("Failed to verify password: {e}")))
}
