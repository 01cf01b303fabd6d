use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::Category;

pub async fn list_categories<'e, E>(executor: E, user_id: Uuid) -> Result<Vec<Category>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT
                c.id,
                c.name,
                c.description,
                (SELECT COUNT(*) FROM decks d WHERE d.category_id = c.id) AS deck_count,
                c.created_at,
                c.updated_at
            FROM categories c
            WHERE c.user_id = $1
            ORDER BY c.name
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
}

pub async fn find_category<'e, E>(
    executor: E,
    user_id: Uuid,
    category_id: Uuid,
) -> Result<Option<Category>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT
                c.id,
                c.name,
                c.description,
                (SELECT COUNT(*) FROM decks d WHERE d.category_id = c.id) AS deck_count,
                c.created_at,
                c.updated_at
            FROM categories c
            WHERE c.id = $1 AND c.user_id = $2
        "#,
    )
    .bind(category_id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

pub async fn category_exists<'e, E>(
    executor: E,
    user_id: Uuid,
    category_id: Uuid,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        // language=PostgreSQL
        r#"
            SELECT EXISTS(
                SELECT 1 FROM categories
                WHERE id = $1 AND user_id = $2
            )
        "#,
    )
    .bind(category_id)
    .bind(user_id)
    .fetch_one(executor)
    .await
}

pub async fn create_category<'e, E>(
    executor: E,
    user_id: Uuid,
    name: &str,
    description: Option<&str>,
) -> Result<Category, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            INSERT INTO categories (user_id, name, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, 0::bigint AS deck_count, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(description)
    .fetch_one(executor)
    .await
}

/// Update a category. A `None` name keeps the stored one; the description is
/// only written when `set_description` is true, so it can be cleared.
pub async fn update_category<'e, E>(
    executor: E,
    user_id: Uuid,
    category_id: Uuid,
    name: Option<&str>,
    set_description: bool,
    description: Option<&str>,
) -> Result<Option<Category>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            UPDATE categories c
            SET name = COALESCE($3, c.name),
                description = CASE WHEN $4 THEN $5 ELSE c.description END,
                updated_at = NOW()
            WHERE c.id = $1 AND c.user_id = $2
            RETURNING
                c.id,
                c.name,
                c.description,
                (SELECT COUNT(*) FROM decks d WHERE d.category_id = c.id) AS deck_count,
                c.created_at,
                c.updated_at
        "#,
    )
    .bind(category_id)
    .bind(user_id)
    .bind(name)
    .bind(set_description)
    .bind(description)
    .fetch_optional(executor)
    .await
}

pub async fn delete_category<'e, E>(
    executor: E,
    user_id: Uuid,
    category_id: Uuid,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            DELETE FROM categories WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(category_id)
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}
