use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    middleware,
    routing::{get, post},
};
use axum_extra::extract::PrivateCookieJar;
use rcl_db::{models::UserProfile, repositories::user as user_repo};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    cookies::{
        AUTH_COOKIE, REFRESH_COOKIE, create_auth_cookie, create_refresh_token_cookie,
        removal_cookie,
    },
    jwt,
    middleware::AuthUser,
    refresh_token::{self as rt, ClientInfo},
    service,
};
use crate::{ApiState, error::ApiError, metrics, middleware::rate_limit};

/// Longest `User-Agent` stored alongside a refresh token
const MAX_DEVICE_INFO_LEN: usize = 255;

pub fn routes() -> Router<ApiState> {
    use crate::make_rate_limit_layer;

    // Credential endpoints: strict limit and constant extra latency
    let credential_routes = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .layer(middleware::from_fn(rate_limit::timing_safe_middleware))
        .layer(make_rate_limit_layer!(
            rate_limit::AUTH_REPLENISH_MS,
            rate_limit::AUTH_BURST_SIZE
        ));

    let session_routes = Router::new()
        .route("/auth/me", get(auth_me))
        .route("/auth/refresh", post(refresh_token))
        .route("/auth/logout", post(logout))
        .layer(make_rate_limit_layer!(
            rate_limit::GENERAL_REPLENISH_MS,
            rate_limit::GENERAL_BURST_SIZE
        ));

    Router::new().merge(credential_routes).merge(session_routes)
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserProfile,
}

async fn register(
    State(state): State<ApiState>,
    jar: PrivateCookieJar,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, PrivateCookieJar, Json<AuthResponse>), ApiError> {
    let user = service::register_user(
        &state.pool,
        &payload.username,
        &payload.email,
        &payload.password,
        state.bcrypt_cost,
    )
    .await?;

    let jar = start_session(&state, jar, &headers, &user).await?;

    Ok((StatusCode::CREATED, jar, Json(AuthResponse { user })))
}

async fn login(
    State(state): State<ApiState>,
    jar: PrivateCookieJar,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<(PrivateCookieJar, Json<AuthResponse>), ApiError> {
    let user = service::authenticate(&state.pool, &payload.email, &payload.password).await?;

    let jar = start_session(&state, jar, &headers, &user).await?;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok((jar, Json(AuthResponse { user })))
}

/// Issue an access token and a refresh token and add both cookies to the jar.
async fn start_session(
    state: &ApiState,
    jar: PrivateCookieJar,
    headers: &HeaderMap,
    user: &UserProfile,
) -> Result<PrivateCookieJar, ApiError> {
    let access_token = jwt::generate_jwt_token(
        user.id,
        user.email.clone(),
        &state.jwt_secret,
        state.jwt_expiry_hours,
    )?;

    let refresh_token = rt::issue_refresh_token(
        &state.pool,
        user.id,
        client_info(headers),
        state.refresh_token_expiry_days,
    )
    .await?;

    let cookie_config = state.cookie_config();
    Ok(jar
        .add(create_auth_cookie(access_token, &cookie_config))
        .add(create_refresh_token_cookie(refresh_token, &cookie_config)))
}

fn client_info(headers: &HeaderMap) -> ClientInfo {
    let device_info = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|ua| ua.chars().take(MAX_DEVICE_INFO_LEN).collect());

    ClientInfo {
        device_info,
        ip_address: client_ip(headers),
    }
}

/// First address of `X-Forwarded-For`, if any
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(String::from)
}

async fn auth_me(
    auth_user: AuthUser,
    State(state): State<ApiState>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = user_repo::find_profile_by_id(&state.pool, auth_user.user_id)
        .await?
        .ok_or_else(|| ApiError::Auth("User not found".to_string()))?;

    Ok(Json(user))
}

async fn refresh_token(
    State(state): State<ApiState>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Json<serde_json::Value>), ApiError> {
    let old_refresh_token = jar
        .get(REFRESH_COOKIE)
        .ok_or_else(|| ApiError::Auth("No refresh token found".to_string()))?
        .value()
        .to_owned();

    let (user_id, new_refresh_token) = rt::rotate_refresh_token(
        &state.pool,
        &old_refresh_token,
        state.refresh_token_expiry_days,
    )
    .await
    .inspect_err(|_| metrics::record_auth_event("refresh", "refresh_token", false))?;

    let email = user_repo::find_email(&state.pool, user_id)
        .await?
        .ok_or_else(|| ApiError::Auth("User not found".to_string()))?;

    let new_access_token =
        jwt::generate_jwt_token(user_id, email, &state.jwt_secret, state.jwt_expiry_hours)?;

    metrics::record_auth_event("refresh", "refresh_token", true);

    let cookie_config = state.cookie_config();
    let jar = jar
        .add(create_auth_cookie(new_access_token, &cookie_config))
        .add(create_refresh_token_cookie(new_refresh_token, &cookie_config));

    Ok((
        jar,
        Json(json!({ "message": "Token refreshed successfully" })),
    ))
}

async fn logout(
    State(state): State<ApiState>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Json<serde_json::Value>), ApiError> {
    if let Some(refresh_cookie) = jar.get(REFRESH_COOKIE) {
        rt::revoke_refresh_token(&state.pool, refresh_cookie.value()).await?;
    }

    let cookie_config = state.cookie_config();
    let jar = jar
        .remove(removal_cookie(AUTH_COOKIE, &cookie_config))
        .remove(removal_cookie(REFRESH_COOKIE, &cookie_config));

    Ok((
        jar,
        Json(json!({ "message": "Logged out successfully" })),
    ))
}
