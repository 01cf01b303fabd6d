use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::Deck;

/// List the user's decks, newest first, optionally restricted to one category.
pub async fn list_decks<'e, E>(
    executor: E,
    user_id: Uuid,
    category_id: Option<Uuid>,
) -> Result<Vec<Deck>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT
                d.id,
                d.category_id,
                d.name,
                d.description,
                (SELECT COUNT(*) FROM cards c WHERE c.deck_id = d.id) AS card_count,
                d.created_at,
                d.updated_at
            FROM decks d
            WHERE d.user_id = $1
                AND ($2::uuid IS NULL OR d.category_id = $2)
            ORDER BY d.created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(category_id)
    .fetch_all(executor)
    .await
}

pub async fn find_deck<'e, E>(
    executor: E,
    user_id: Uuid,
    deck_id: Uuid,
) -> Result<Option<Deck>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT
                d.id,
                d.category_id,
                d.name,
                d.description,
                (SELECT COUNT(*) FROM cards c WHERE c.deck_id = d.id) AS card_count,
                d.created_at,
                d.updated_at
            FROM decks d
            WHERE d.id = $1 AND d.user_id = $2
        "#,
    )
    .bind(deck_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

pub async fn deck_belongs_to_user<'e, E>(
    executor: E,
    user_id: Uuid,
    deck_id: Uuid,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        // language=PostgreSQL
        r#"
            SELECT EXISTS(
                SELECT 1 FROM decks
                WHERE id = $1 AND user_id = $2
            )
        "#,
    )
    .bind(deck_id)
    .bind(user_id)
    .fetch_one(executor)
    .await
}

/// Count how many of `deck_ids` belong to the user.
pub async fn count_owned_decks<'e, E>(
    executor: E,
    user_id: Uuid,
    deck_ids: &[Uuid],
) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        // language=PostgreSQL
        r#"
            SELECT COUNT(*)
            FROM decks
            WHERE user_id = $1 AND id = ANY($2)
        "#,
    )
    .bind(user_id)
    .bind(deck_ids)
    .fetch_one(executor)
    .await
}

pub async fn create_deck<'e, E>(
    executor: E,
    user_id: Uuid,
    name: &str,
    description: Option<&str>,
    category_id: Option<Uuid>,
) -> Result<Deck, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            INSERT INTO decks (user_id, name, description, category_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, category_id, name, description, 0::bigint AS card_count, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(description)
    .bind(category_id)
    .fetch_one(executor)
    .await
}

/// Update a deck.
///
/// A `None` name keeps the stored one. Description and category are only touched
/// when their `set_*` flag is true, in which case the value is written as-is (so
/// `None` clears it).
pub async fn update_deck<'e, E>(
    executor: E,
    user_id: Uuid,
    deck_id: Uuid,
    name: Option<&str>,
    set_description: bool,
    description: Option<&str>,
    set_category: bool,
    category_id: Option<Uuid>,
) -> Result<Option<Deck>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            UPDATE decks d
            SET name = COALESCE($3, d.name),
                description = CASE WHEN $4 THEN $5 ELSE d.description END,
                category_id = CASE WHEN $6 THEN $7 ELSE d.category_id END,
                updated_at = NOW()
            WHERE d.id = $1 AND d.user_id = $2
            RETURNING
                d.id,
                d.category_id,
                d.name,
                d.description,
                (SELECT COUNT(*) FROM cards c WHERE c.deck_id = d.id) AS card_count,
                d.created_at,
                d.updated_at
        "#,
    )
    .bind(deck_id)
    .bind(user_id)
    .bind(name)
    .bind(set_description)
    .bind(description)
    .bind(set_category)
    .bind(category_id)
    .fetch_optional(executor)
    .await
}

pub async fn delete_deck<'e, E>(executor: E, user_id: Uuid, deck_id: Uuid) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            DELETE FROM decks WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(deck_id)
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
