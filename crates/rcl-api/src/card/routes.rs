use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use rcl_db::{
    models::{Card, NewCard},
    repositories::{card as card_repo, deck as deck_repo},
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, types::Uuid};

use crate::{
    ApiState,
    auth::AuthUser,
    error::ApiError,
    llm::{LlmError, complete_json, prompts},
    markdown::render_markdown,
    middleware::rate_limit,
    validation,
};

pub const DEFAULT_GENERATED_CARDS: u32 = 10;
pub const MAX_GENERATED_CARDS: u32 = 20;
/// Longest accepted generation topic, in characters
pub const MAX_TOPIC_LEN: usize = 500;

/// Create the card routes
pub fn routes() -> Router<ApiState> {
    use crate::make_rate_limit_layer;

    let generate_routes = Router::new()
        .route("/decks/{id}/cards/generate", post(generate_cards))
        .layer(make_rate_limit_layer!(
            rate_limit::LLM_REPLENISH_MS,
            rate_limit::LLM_BURST_SIZE
        ));

    let card_routes = Router::new()
        .route("/decks/{id}/cards", get(list_cards).post(create_card))
        .route(
            "/cards/{id}",
            get(get_card).patch(update_card).delete(delete_card),
        )
        .route("/cards/{id}/html", get(get_card_html))
        .layer(make_rate_limit_layer!(
            rate_limit::GENERAL_REPLENISH_MS,
            rate_limit::GENERAL_BURST_SIZE
        ));

    Router::new().merge(generate_routes).merge(card_routes)
}

#[derive(Debug, Deserialize)]
struct CreateCardRequest {
    front: String,
    back: String,
}

#[derive(Debug, Deserialize)]
struct UpdateCardRequest {
    front: Option<String>,
    back: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateCardsRequest {
    topic: String,
    count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeneratedCards {
    #[serde(default)]
    cards: Vec<NewCard>,
}

#[derive(Debug, Serialize)]
pub struct CardHtml {
    pub id: Uuid,
    pub front_html: String,
    pub back_html: String,
}

fn card_not_found() -> ApiError {
    ApiError::NotFound("Card not found".to_string())
}

async fn ensure_deck_owned(pool: &PgPool, user_id: Uuid, deck_id: Uuid) -> Result<(), ApiError> {
    if deck_repo::deck_belongs_to_user(pool, user_id, deck_id).await? {
        Ok(())
    } else {
        Err(ApiError::NotFound("Deck not found".to_string()))
    }
}

async fn list_cards(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(deck_id): Path<Uuid>,
) -> Result<Json<Vec<Card>>, ApiError> {
    ensure_deck_owned(&state.pool, auth_user.user_id, deck_id).await?;

    let cards = card_repo::list_cards_in_deck(&state.pool, auth_user.user_id, deck_id).await?;
    Ok(Json(cards))
}

async fn create_card(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(deck_id): Path<Uuid>,
    Json(payload): Json<CreateCardRequest>,
) -> Result<(StatusCode, Json<Card>), ApiError> {
    validation::validate_card_text("front", &payload.front)?;
    validation::validate_card_text("back", &payload.back)?;
    ensure_deck_owned(&state.pool, auth_user.user_id, deck_id).await?;

    let card = card_repo::create_card(&state.pool, deck_id, &payload.front, &payload.back).await?;

    Ok((StatusCode::CREATED, Json(card)))
}

/// Have the language model write cards about a topic and add them to the deck.
///
/// All generated cards are inserted in one transaction.
async fn generate_cards(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(deck_id): Path<Uuid>,
    Json(payload): Json<GenerateCardsRequest>,
) -> Result<(StatusCode, Json<Vec<Card>>), ApiError> {
    let topic = payload.topic.trim();
    if topic.is_empty() {
        return Err(ApiError::Validation("Topic cannot be empty".to_string()));
    }
    if topic.chars().count() > MAX_TOPIC_LEN {
        return Err(ApiError::Validation(format!(
            "Topic must be at most {MAX_TOPIC_LEN} characters long"
        )));
    }
    let count = validation::validate_count(
        "count",
        payload.count,
        DEFAULT_GENERATED_CARDS,
        MAX_GENERATED_CARDS,
    )?;
    let model = state.llm()?;

    ensure_deck_owned(&state.pool, auth_user.user_id, deck_id).await?;

    let reply: GeneratedCards = complete_json(model, prompts::card_generation(topic, count)).await?;
    let new_cards = usable_cards(reply.cards, count)?;

    let mut tx = state.pool.begin().await?;
    let cards = card_repo::create_cards(&mut tx, deck_id, &new_cards).await?;
    tx.commit().await?;

    tracing::info!(deck_id = %deck_id, count = cards.len(), "Generated cards added to deck");

    Ok((StatusCode::CREATED, Json(cards)))
}

/// Keep at most `count` generated cards that pass the same checks as
/// hand-written ones.
fn usable_cards(generated: Vec<NewCard>, count: u32) -> Result<Vec<NewCard>, LlmError> {
    let cards: Vec<NewCard> = generated
        .into_iter()
        .map(|card| NewCard {
            front: card.front.trim().to_string(),
            back: card.back.trim().to_string(),
        })
        .filter(|card| {
            validation::validate_card_text("front", &card.front).is_ok()
                && validation::validate_card_text("back", &card.back).is_ok()
        })
        .take(count as usize)
        .collect();

    if cards.is_empty() {
        return Err(LlmError::InvalidResponse(
            "Model returned no usable cards".to_string(),
        ));
    }

    Ok(cards)
}

async fn get_card(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Card>, ApiError> {
    let card = card_repo::find_card(&state.pool, auth_user.user_id, id)
        .await?
        .ok_or_else(card_not_found)?;

    Ok(Json(card))
}

async fn update_card(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCardRequest>,
) -> Result<Json<Card>, ApiError> {
    if let Some(front) = &payload.front {
        validation::validate_card_text("front", front)?;
    }
    if let Some(back) = &payload.back {
        validation::validate_card_text("back", back)?;
    }

    let card = card_repo::update_card(
        &state.pool,
        auth_user.user_id,
        id,
        payload.front.as_deref(),
        payload.back.as_deref(),
    )
    .await?
    .ok_or_else(card_not_found)?;

    Ok(Json(card))
}

async fn delete_card(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = card_repo::delete_card(&state.pool, auth_user.user_id, id).await?;
    if deleted == 0 {
        return Err(card_not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn get_card_html(
    auth_user: AuthUser,
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CardHtml>, ApiError> {
    let card = card_repo::find_card(&state.pool, auth_user.user_id, id)
        .await?
        .ok_or_else(card_not_found)?;

    Ok(Json(CardHtml {
        id: card.id,
        front_html: render_markdown(&card.front),
        back_html: render_markdown(&card.back),
    }))
}
