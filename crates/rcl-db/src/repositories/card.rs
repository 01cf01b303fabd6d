use sqlx::{Executor, Postgres, Transaction};
use uuid::Uuid;

use crate::models::{Card, NewCard};

pub async fn list_cards_in_deck<'e, E>(
    executor: E,
    user_id: Uuid,
    deck_id: Uuid,
) -> Result<Vec<Card>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT c.id, c.deck_id, c.front, c.back, c.ease_factor,
                   c.last_reviewed_at, c.review_count, c.created_at, c.updated_at
            FROM cards c
            JOIN decks d ON d.id = c.deck_id
            WHERE c.deck_id = $1 AND d.user_id = $2
            ORDER BY c.created_at, c.id
        "#,
    )
    .bind(deck_id)
    .bind(user_id)
    .fetch_all(executor)
    .await
}

pub async fn find_card<'e, E>(
    executor: E,
    user_id: Uuid,
    card_id: Uuid,
) -> Result<Option<Card>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT c.id, c.deck_id, c.front, c.back, c.ease_factor,
                   c.last_reviewed_at, c.review_count, c.created_at, c.updated_at
            FROM cards c
            JOIN decks d ON d.id = c.deck_id
            WHERE c.id = $1 AND d.user_id = $2
        "#,
    )
    .bind(card_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

/// Like [`find_card`], but holds a row lock on the card until `tx` ends.
pub async fn lock_card(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    card_id: Uuid,
) -> Result<Option<Card>, sqlx::Error> {
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT c.id, c.deck_id, c.front, c.back, c.ease_factor,
                   c.last_reviewed_at, c.review_count, c.created_at, c.updated_at
            FROM cards c
            JOIN decks d ON d.id = c.deck_id
            WHERE c.id = $1 AND d.user_id = $2
            FOR UPDATE OF c
        "#,
    )
    .bind(card_id)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await
}

/// Insert a card. The caller is responsible for checking deck ownership.
pub async fn create_card<'e, E>(
    executor: E,
    deck_id: Uuid,
    front: &str,
    back: &str,
) -> Result<Card, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            INSERT INTO cards (deck_id, front, back)
            VALUES ($1, $2, $3)
            RETURNING id, deck_id, front, back, ease_factor,
                      last_reviewed_at, review_count, created_at, updated_at
        "#,
    )
    .bind(deck_id)
    .bind(front)
    .bind(back)
    .fetch_one(executor)
    .await
}

/// Insert a batch of cards inside the given transaction, preserving input order.
pub async fn create_cards(
    tx: &mut Transaction<'_, Postgres>,
    deck_id: Uuid,
    cards: &[NewCard],
) -> Result<Vec<Card>, sqlx::Error> {
    let mut created = Vec::with_capacity(cards.len());
    for card in cards {
        created.push(create_card(&mut **tx, deck_id, &card.front, &card.back).await?);
    }
    Ok(created)
}

/// Update the content of a card. `None` keeps the stored value.
pub async fn update_card<'e, E>(
    executor: E,
    user_id: Uuid,
    card_id: Uuid,
    front: Option<&str>,
    back: Option<&str>,
) -> Result<Option<Card>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            UPDATE cards c
            SET front = COALESCE($3, c.front),
                back = COALESCE($4, c.back),
                updated_at = NOW()
            FROM decks d
            WHERE c.id = $1 AND d.id = c.deck_id AND d.user_id = $2
            RETURNING c.id, c.deck_id, c.front, c.back, c.ease_factor,
                      c.last_reviewed_at, c.review_count, c.created_at, c.updated_at
        "#,
    )
    .bind(card_id)
    .bind(user_id)
    .bind(front)
    .bind(back)
    .fetch_optional(executor)
    .await
}

pub async fn delete_card<'e, E>(executor: E, user_id: Uuid, card_id: Uuid) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            DELETE FROM cards c
            USING decks d
            WHERE c.id = $1 AND d.id = c.deck_id AND d.user_id = $2
        "#,
    )
    .bind(card_id)
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// All cards the user could review, optionally restricted to one deck.
pub async fn review_candidates<'e, E>(
    executor: E,
    user_id: Uuid,
    deck_id: Option<Uuid>,
) -> Result<Vec<Card>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT c.id, c.deck_id, c.front, c.back, c.ease_factor,
                   c.last_reviewed_at, c.review_count, c.created_at, c.updated_at
            FROM cards c
            JOIN decks d ON d.id = c.deck_id
            WHERE d.user_id = $1
                AND ($2::uuid IS NULL OR c.deck_id = $2)
            ORDER BY c.created_at, c.id
        "#,
    )
    .bind(user_id)
    .bind(deck_id)
    .fetch_all(executor)
    .await
}

/// Store the outcome of a review: new ease, bumped counter, timestamp set to now.
pub async fn record_review<'e, E>(
    executor: E,
    user_id: Uuid,
    card_id: Uuid,
    ease_factor: f64,
) -> Result<Option<Card>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            UPDATE cards c
            SET ease_factor = $3,
                last_reviewed_at = NOW(),
                review_count = c.review_count + 1
            FROM decks d
            WHERE c.id = $1 AND d.id = c.deck_id AND d.user_id = $2
            RETURNING c.id, c.deck_id, c.front, c.back, c.ease_factor,
                      c.last_reviewed_at, c.review_count, c.created_at, c.updated_at
        "#,
    )
    .bind(card_id)
    .bind(user_id)
    .bind(ease_factor)
    .fetch_optional(executor)
    .await
}

/// Cards from the given decks, restricted to decks owned by the user.
pub async fn cards_for_decks<'e, E>(
    executor: E,
    user_id: Uuid,
    deck_ids: &[Uuid],
) -> Result<Vec<Card>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT c.id, c.deck_id, c.front, c.back, c.ease_factor,
                   c.last_reviewed_at, c.review_count, c.created_at, c.updated_at
            FROM cards c
            JOIN decks d ON d.id = c.deck_id
            WHERE d.user_id = $1 AND c.deck_id = ANY($2)
            ORDER BY c.deck_id, c.created_at, c.id
        "#,
    )
    .bind(user_id)
    .bind(deck_ids)
    .fetch_all(executor)
    .await
}
