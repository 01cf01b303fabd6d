use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use sqlx::types::Uuid;

use super::{
    cookies::AUTH_COOKIE,
    jwt::{Claims, verify_jwt_token},
};
use crate::{error::ApiError, state::AuthConfig};

/// Caller identity, taken from the access token in the encrypted `auth_token`
/// cookie.
///
/// Adding this extractor to a handler is what makes the route require a
/// session. Missing, undecryptable, expired or forged tokens all reject the
/// request with 401.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
}

impl TryFrom<Claims> for AuthUser {
    type Error = ApiError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = claims
            .sub
            .parse()
            .map_err(|_| ApiError::Auth("Malformed session token".to_string()))?;

        Ok(Self {
            user_id,
            email: claims.email,
        })
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    AuthConfig: FromRef<S>,
    Key: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Infallible: cookies that fail to decrypt are simply absent from the jar
        let Ok(jar) = PrivateCookieJar::<Key>::from_request_parts(parts, state).await;

        let Some(cookie) = jar.get(AUTH_COOKIE) else {
            return Err(ApiError::Auth("Not authenticated".to_string()));
        };

        let secret = AuthConfig::from_ref(state).jwt_secret;
        verify_jwt_token(cookie.value(), &secret)?.try_into()
    }
}
