use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::{UserCredentials, UserProfile, UserStats};

pub async fn create_user<'e, E>(
    executor: E,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<UserProfile, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, created_at
        "#,
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .fetch_one(executor)
    .await
}

pub async fn find_profile_by_id<'e, E>(
    executor: E,
    user_id: Uuid,
) -> Result<Option<UserProfile>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, username, email, created_at
            FROM users
            WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

pub async fn find_credentials_by_email<'e, E>(
    executor: E,
    email: &str,
) -> Result<Option<UserCredentials>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT id, username, email, password_hash
            FROM users
            WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(executor)
    .await
}

pub async fn find_email<'e, E>(executor: E, user_id: Uuid) -> Result<Option<String>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar(
        // language=PostgreSQL
        r#"
            SELECT email FROM users WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

pub async fn update_username<'e, E>(
    executor: E,
    user_id: Uuid,
    username: &str,
) -> Result<Option<UserProfile>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            UPDATE users
            SET username = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING id, username, email, created_at
        "#,
    )
    .bind(username)
    .bind(user_id)
    .fetch_optional(executor)
    .await
}

pub async fn delete_user<'e, E>(executor: E, user_id: Uuid) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        // language=PostgreSQL
        r#"
            DELETE FROM users WHERE id = $1
        "#,
    )
    .bind(user_id)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

pub async fn get_user_stats<'e, E>(executor: E, user_id: Uuid) -> Result<UserStats, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        // language=PostgreSQL
        r#"
            SELECT
                (SELECT COUNT(*) FROM categories WHERE user_id = $1) AS category_count,
                (SELECT COUNT(*) FROM decks WHERE user_id = $1) AS deck_count,
                COUNT(c.id) AS card_count,
                COUNT(c.id) FILTER (WHERE c.last_reviewed_at IS NULL) AS unreviewed_cards,
                COALESCE(SUM(c.review_count), 0)::bigint AS total_reviews,
                (SELECT COUNT(*) FROM quizzes WHERE user_id = $1 AND status = 'graded') AS quizzes_graded,
                (SELECT AVG(score) FROM quizzes WHERE user_id = $1 AND status = 'graded') AS average_quiz_score
            FROM decks d
            LEFT JOIN cards c ON c.deck_id = d.id
            WHERE d.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(executor)
    .await
}
