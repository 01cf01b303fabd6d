use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use axum_extra::extract::PrivateCookieJar;
use rcl_db::{
    models::{UserProfile, UserStats},
    repositories::user as user_repo,
};
use serde::Deserialize;

use crate::{
    ApiState,
    auth::{
        AuthUser,
        cookies::{AUTH_COOKIE, REFRESH_COOKIE, removal_cookie},
        service::map_duplicate_user,
        validation::validate_username,
    },
    error::ApiError,
    middleware::rate_limit,
};

/// Create the profile routes
pub fn routes() -> Router<ApiState> {
    use crate::make_rate_limit_layer;

    Router::new()
        .route(
            "/users/me",
            get(get_profile).patch(update_profile).delete(delete_account),
        )
        .route("/users/me/stats", get(get_stats))
        .layer(make_rate_limit_layer!(
            rate_limit::GENERAL_REPLENISH_MS,
            rate_limit::GENERAL_BURST_SIZE
        ))
}

#[derive(Debug, Deserialize)]
struct UpdateProfileRequest {
    username: String,
}

async fn get_profile(
    auth_user: AuthUser,
    State(state): State<ApiState>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = user_repo::find_profile_by_id(&state.pool, auth_user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

async fn update_profile(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let username = payload.username.trim();
    validate_username(username)?;

    let user = user_repo::update_username(&state.pool, auth_user.user_id, username)
        .await
        .map_err(map_duplicate_user)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(user_id = %user.id, "Username updated");

    Ok(Json(user))
}

/// Delete the account. Categories, decks, cards, quizzes and refresh tokens go
/// with it through cascading foreign keys.
async fn delete_account(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    jar: PrivateCookieJar,
) -> Result<(StatusCode, PrivateCookieJar), ApiError> {
    let deleted = user_repo::delete_user(&state.pool, auth_user.user_id).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = %auth_user.user_id, "Account deleted");

    let cookie_config = state.cookie_config();
    let jar = jar
        .remove(removal_cookie(AUTH_COOKIE, &cookie_config))
        .remove(removal_cookie(REFRESH_COOKIE, &cookie_config));

    Ok((StatusCode::NO_CONTENT, jar))
}

async fn get_stats(
    auth_user: AuthUser,
    State(state): State<ApiState>,
) -> Result<Json<UserStats>, ApiError> {
    let stats = user_repo::get_user_stats(&state.pool, auth_user.user_id).await?;
    Ok(Json(stats))
}
