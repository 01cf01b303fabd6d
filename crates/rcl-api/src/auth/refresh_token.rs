use base64::Engine;
use chrono::{Duration, Utc};
use rand::RngCore;
use rcl_db::{models::Session, repositories::session as session_repo};
use sha2::{Digest, Sha256};
use sqlx::{PgPool, types::Uuid};

use crate::error::ApiError;

/// Where and by whom a session was opened
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub device_info: Option<String>,
    pub ip_address: Option<String>,
}

/// Generate a random refresh token.
///
/// Returns the token (sent to the client) and its SHA-256 hash (stored in the database).
pub fn generate_refresh_token() -> (String, String) {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);

    let token = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes);
    let hash = hash_refresh_token(&token);
    (token, hash)
}

/// Hex-encoded SHA-256 of a refresh token
pub fn hash_refresh_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Open a session for `user_id` and return its plain refresh token
pub async fn issue_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    client: ClientInfo,
    expiry_days: i64,
) -> Result<String, ApiError> {
    let (token, hash) = generate_refresh_token();
    let session = Session {
        user_id,
        expires_at: Utc::now() + Duration::days(expiry_days),
        device_info: client.device_info,
        ip_address: client.ip_address,
    };

    session_repo::insert_session(pool, &hash, &session).await?;
    Ok(token)
}

/// Exchange a refresh token for a new one.
///
/// The old token is consumed whether or not it has expired. Returns the owning
/// user and the replacement token, which keeps the client info of the original
/// session.
pub async fn rotate_refresh_token(
    pool: &PgPool,
    token: &str,
    expiry_days: i64,
) -> Result<(Uuid, String), ApiError> {
    let mut tx = pool.begin().await?;

    let Some(session) = session_repo::take_session(&mut *tx, &hash_refresh_token(token)).await?
    else {
        return Err(ApiError::Auth("Invalid refresh token".to_string()));
    };

    let now = Utc::now();
    if session.expires_at <= now {
        tx.commit().await?;
        return Err(ApiError::Auth("Refresh token expired".to_string()));
    }

    let (new_token, new_hash) = generate_refresh_token();
    let renewed = Session {
        expires_at: now + Duration::days(expiry_days),
        ..session
    };
    session_repo::insert_session(&mut *tx, &new_hash, &renewed).await?;

    tx.commit().await?;
    Ok((renewed.user_id, new_token))
}

/// End the session behind a refresh token. Unknown tokens are ignored.
pub async fn revoke_refresh_token(pool: &PgPool, token: &str) -> Result<bool, ApiError> {
    let session = session_repo::take_session(pool, &hash_refresh_token(token)).await?;
    Ok(session.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_refresh_token() {
        let (token, hash) = generate_refresh_token();

        // 32 bytes base64url without padding
        assert_eq!(token.len(), 43);
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_refresh_token(&token));
    }

    #[test]
    fn test_tokens_are_unique() {
        let (a, _) = generate_refresh_token();
        let (b, _) = generate_refresh_token();
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(
            hash_refresh_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
