//! HS256 access tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

use crate::error::ApiError;

/// Access token payload. `sub` is the user id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    fn new(user_id: Uuid, email: String, lifetime: Duration) -> Self {
        let issued = Utc::now();
        Self {
            sub: user_id.to_string(),
            email,
            iat: issued.timestamp() as usize,
            exp: (issued + lifetime).timestamp() as usize,
        }
    }
}

/// Sign an access token for `user_id` that expires after `expiry_hours`.
pub fn generate_jwt_token(
    user_id: Uuid,
    email: String,
    jwt_secret: &str,
    expiry_hours: i64,
) -> Result<String, ApiError> {
    let claims = Claims::new(user_id, email, Duration::hours(expiry_hours));
    let key = EncodingKey::from_secret(jwt_secret.as_bytes());

    Ok(jsonwebtoken::encode(&Header::default(), &claims, &key)?)
}

/// Check the signature and expiry of an access token.
///
/// Every failure maps to the same 401 so callers learn nothing about why.
pub fn verify_jwt_token(token: &str, jwt_secret: &str) -> Result<Claims, ApiError> {
    let key = DecodingKey::from_secret(jwt_secret.as_bytes());

    jsonwebtoken::decode::<Claims>(token, &key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "Access token rejected");
            ApiError::Auth("Invalid or expired token".to_string())
        })
}
