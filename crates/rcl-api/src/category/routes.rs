use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use rcl_db::{
    models::{Category, Deck},
    repositories::{category as category_repo, deck as deck_repo},
};
use serde::Deserialize;
use sqlx::types::Uuid;

use crate::{
    ApiState,
    auth::AuthUser,
    error::ApiError,
    middleware::rate_limit,
    validation::{self, nullable},
};

/// Create the category routes
pub fn routes() -> Router<ApiState> {
    use crate::make_rate_limit_layer;

    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            get(get_category)
                .patch(update_category)
                .delete(delete_category),
        )
        .route("/categories/{id}/decks", get(list_category_decks))
        .layer(make_rate_limit_layer!(
            rate_limit::GENERAL_REPLENISH_MS,
            rate_limit::GENERAL_BURST_SIZE
        ))
}

#[derive(Debug, Deserialize)]
struct CreateCategoryRequest {
    name: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateCategoryRequest {
    name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    description: Option<Option<String>>,
}

fn map_duplicate_category(error: sqlx::Error) -> ApiError {
    let is_duplicate = error
        .as_database_error()
        .and_then(|e| e.constraint())
        .is_some_and(|c| c == "categories_user_name_key");

    if is_duplicate {
        ApiError::Conflict("Category name already exists".to_string())
    } else {
        ApiError::Database(error)
    }
}

fn category_not_found() -> ApiError {
    ApiError::NotFound("Category not found".to_string())
}

async fn list_categories(
    auth_user: AuthUser,
    State(state): State<ApiState>,
) -> Result<Json<Vec<Category>>, ApiError> {
    let categories = category_repo::list_categories(&state.pool, auth_user.user_id).await?;
    Ok(Json(categories))
}

async fn create_category(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let name = validation::validate_name("Category", &payload.name)?;
    let description = validation::validate_description(payload.description.as_deref())?;

    let category = category_repo::create_category(
        &state.pool,
        auth_user.user_id,
        &name,
        description.as_deref(),
    )
    .await
    .map_err(map_duplicate_category)?;

    tracing::debug!(category_id = %category.id, "Category created");

    Ok((StatusCode::CREATED, Json(category)))
}

async fn get_category(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, ApiError> {
    let category = category_repo::find_category(&state.pool, auth_user.user_id, id)
        .await?
        .ok_or_else(category_not_found)?;

    Ok(Json(category))
}

async fn update_category(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, ApiError> {
    let name = payload
        .name
        .as_deref()
        .map(|name| validation::validate_name("Category", name))
        .transpose()?;

    let set_description = payload.description.is_some();
    let description = validation::validate_description(payload.description.flatten().as_deref())?;

    let category = category_repo::update_category(
        &state.pool,
        auth_user.user_id,
        id,
        name.as_deref(),
        set_description,
        description.as_deref(),
    )
    .await
    .map_err(map_duplicate_category)?
    .ok_or_else(category_not_found)?;

    Ok(Json(category))
}

/// Delete a category. Its decks stay, without a category.
async fn delete_category(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = category_repo::delete_category(&state.pool, auth_user.user_id, id).await?;
    if deleted == 0 {
        return Err(category_not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn list_category_decks(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Deck>>, ApiError> {
    if !category_repo::category_exists(&state.pool, auth_user.user_id, id).await? {
        return Err(category_not_found());
    }

    let decks = deck_repo::list_decks(&state.pool, auth_user.user_id, Some(id)).await?;
    Ok(Json(decks))
}
