use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::Utc;
use rcl_db::{
    models::Card,
    repositories::{card as card_repo, deck as deck_repo},
};
use rcl_review::{Rating, apply_rating, review_queue};
use serde::Deserialize;
use sqlx::types::Uuid;

use crate::{ApiState, auth::AuthUser, error::ApiError, metrics, middleware::rate_limit, validation};

pub const DEFAULT_REVIEW_LIMIT: u32 = 20;
pub const MAX_REVIEW_LIMIT: u32 = 200;

/// Create the review routes
pub fn routes() -> Router<ApiState> {
    use crate::make_rate_limit_layer;

    Router::new()
        .route("/review", get(get_review_queue))
        .route("/cards/{id}/review", post(review_card))
        .layer(make_rate_limit_layer!(
            rate_limit::GENERAL_REPLENISH_MS,
            rate_limit::GENERAL_BURST_SIZE
        ))
}

#[derive(Debug, Deserialize)]
struct ReviewQueueQuery {
    deck_id: Option<Uuid>,
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ReviewRequest {
    rating: Rating,
}

/// Cards to review next, highest priority first
async fn get_review_queue(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Query(query): Query<ReviewQueueQuery>,
) -> Result<Json<Vec<Card>>, ApiError> {
    let limit = validation::validate_count(
        "limit",
        query.limit,
        DEFAULT_REVIEW_LIMIT,
        MAX_REVIEW_LIMIT,
    )?;

    if let Some(deck_id) = query.deck_id
        && !deck_repo::deck_belongs_to_user(&state.pool, auth_user.user_id, deck_id).await?
    {
        return Err(ApiError::NotFound("Deck not found".to_string()));
    }

    let candidates =
        card_repo::review_candidates(&state.pool, auth_user.user_id, query.deck_id).await?;
    let queue = review_queue(candidates, Utc::now(), limit as usize);

    Ok(Json(queue))
}

async fn review_card(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Json<Card>, ApiError> {
    let not_found = || ApiError::NotFound("Card not found".to_string());

    // The lock serializes concurrent ratings of one card
    let mut tx = state.pool.begin().await?;
    let card = card_repo::lock_card(&mut tx, auth_user.user_id, id)
        .await?
        .ok_or_else(not_found)?;

    let ease_factor = apply_rating(card.ease_factor, payload.rating);
    let card = card_repo::record_review(&mut *tx, auth_user.user_id, id, ease_factor)
        .await?
        .ok_or_else(not_found)?;
    tx.commit().await?;

    metrics::record_card_review(payload.rating.as_str());
    tracing::debug!(card_id = %id, rating = payload.rating.as_str(), ease_factor, "Card reviewed");

    Ok(Json(card))
}
