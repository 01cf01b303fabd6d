use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use rcl_db::{
    models::Deck,
    repositories::{category as category_repo, deck as deck_repo},
};
use serde::Deserialize;
use sqlx::{PgPool, types::Uuid};

use crate::{
    ApiState,
    auth::AuthUser,
    error::ApiError,
    middleware::rate_limit,
    validation::{self, nullable},
};

/// Create the deck routes
pub fn routes() -> Router<ApiState> {
    use crate::make_rate_limit_layer;

    Router::new()
        .route("/decks", get(list_decks).post(create_deck))
        .route(
            "/decks/{id}",
            get(get_deck).patch(update_deck).delete(delete_deck),
        )
        .layer(make_rate_limit_layer!(
            rate_limit::GENERAL_REPLENISH_MS,
            rate_limit::GENERAL_BURST_SIZE
        ))
}

#[derive(Debug, Deserialize)]
struct ListDecksQuery {
    category_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct CreateDeckRequest {
    name: String,
    description: Option<String>,
    category_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct UpdateDeckRequest {
    name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    description: Option<Option<String>>,
    /// `null` moves the deck out of its category
    #[serde(default, deserialize_with = "nullable")]
    category_id: Option<Option<Uuid>>,
}

fn deck_not_found() -> ApiError {
    ApiError::NotFound("Deck not found".to_string())
}

/// Decks may only be filed under the caller's own categories
async fn ensure_category_owned(
    pool: &PgPool,
    user_id: Uuid,
    category_id: Option<Uuid>,
) -> Result<(), ApiError> {
    if let Some(category_id) = category_id
        && !category_repo::category_exists(pool, user_id, category_id).await?
    {
        return Err(ApiError::NotFound("Category not found".to_string()));
    }
    Ok(())
}

async fn list_decks(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Query(query): Query<ListDecksQuery>,
) -> Result<Json<Vec<Deck>>, ApiError> {
    let decks = deck_repo::list_decks(&state.pool, auth_user.user_id, query.category_id).await?;
    Ok(Json(decks))
}

async fn create_deck(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Json(payload): Json<CreateDeckRequest>,
) -> Result<(StatusCode, Json<Deck>), ApiError> {
    let name = validation::validate_name("Deck", &payload.name)?;
    let description = validation::validate_description(payload.description.as_deref())?;
    ensure_category_owned(&state.pool, auth_user.user_id, payload.category_id).await?;

    let deck = deck_repo::create_deck(
        &state.pool,
        auth_user.user_id,
        &name,
        description.as_deref(),
        payload.category_id,
    )
    .await?;

    tracing::debug!(deck_id = %deck.id, "Deck created");

    Ok((StatusCode::CREATED, Json(deck)))
}

async fn get_deck(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Deck>, ApiError> {
    let deck = deck_repo::find_deck(&state.pool, auth_user.user_id, id)
        .await?
        .ok_or_else(deck_not_found)?;

    Ok(Json(deck))
}

async fn update_deck(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDeckRequest>,
) -> Result<Json<Deck>, ApiError> {
    let name = payload
        .name
        .as_deref()
        .map(|name| validation::validate_name("Deck", name))
        .transpose()?;

    let set_description = payload.description.is_some();
    let description = validation::validate_description(payload.description.flatten().as_deref())?;

    let set_category = payload.category_id.is_some();
    let category_id = payload.category_id.flatten();
    ensure_category_owned(&state.pool, auth_user.user_id, category_id).await?;

    let deck = deck_repo::update_deck(
        &state.pool,
        auth_user.user_id,
        id,
        name.as_deref(),
        set_description,
        description.as_deref(),
        set_category,
        category_id,
    )
    .await?
    .ok_or_else(deck_not_found)?;

    Ok(Json(deck))
}

/// Delete a deck with all of its cards
async fn delete_deck(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = deck_repo::delete_deck(&state.pool, auth_user.user_id, id).await?;
    if deleted == 0 {
        return Err(deck_not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}
